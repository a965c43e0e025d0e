use std::{sync::Arc, time::Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use lossy_link::{
    Channel, ChannelConfig, ChannelStats, Frame, Scenario, TracingObserver,
    sweep::{loss_grid, sweep},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Unreliable channel simulator.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Push frames through one channel and summarize their fate.
    Run(RunArgs),
    /// Compare observed and configured rates over a grid of loss probabilities.
    Sweep(SweepArgs),
}

#[derive(Args)]
struct ChannelArgs {
    /// Preset: perfect, noisy, unstable (or 1, 2, 3). Defaults to CHANNEL_* env vars.
    #[arg(long)]
    scenario: Option<Scenario>,
    /// Loss probability override.
    #[arg(long)]
    loss: Option<f64>,
    /// Error probability override.
    #[arg(long)]
    error: Option<f64>,
    /// Maximum delay override, in time units.
    #[arg(long)]
    max_delay: Option<u32>,
    /// Seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

impl ChannelArgs {
    fn config(&self) -> anyhow::Result<ChannelConfig> {
        let mut config = match self.scenario {
            Some(scenario) => scenario.config(),
            None => ChannelConfig::from_env().context("loading CHANNEL_* variables")?,
        };

        if let Some(loss) = self.loss {
            config.loss_probability = loss;
        }
        if let Some(error) = self.error {
            config.error_probability = error;
        }
        if let Some(max_delay) = self.max_delay {
            config.max_delay = max_delay;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    channel: ChannelArgs,
    /// Number of frames to send.
    #[arg(long, default_value_t = 100)]
    frames: u64,
    /// Payload prefix; the sequence number is appended.
    #[arg(long, default_value = "Frame ")]
    payload: String,
}

#[derive(Args)]
struct SweepArgs {
    #[command(flatten)]
    channel: ChannelArgs,
    /// Largest loss probability in the grid.
    #[arg(long, default_value_t = 0.5)]
    max_loss: f64,
    /// Number of grid points.
    #[arg(long, default_value_t = 11)]
    steps: usize,
    /// Frames per grid point.
    #[arg(long, default_value_t = 10_000)]
    frames: u64,
    /// Payload length of each frame, in bytes.
    #[arg(long, default_value_t = 100)]
    payload_len: usize,
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {elapsed_precise}") {
        bar.set_style(style);
    }
    bar
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.channel.config()?;
    info!(?config, frames = args.frames, "Starting run");

    let stats = Arc::new(ChannelStats::new());
    let channel = Arc::new(Channel::new(config)?.with_observer((TracingObserver, stats.clone())));

    tokio::spawn({
        let channel = channel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                channel.shutdown();
            }
        }
    });

    let bar = progress_bar(args.frames);
    let started = Instant::now();

    let handles: Vec<_> = (0..args.frames)
        .map(|seq| {
            let channel = channel.clone();
            let bar = bar.clone();
            let frame = Frame::data(seq, format!("{}{seq}", args.payload));
            tokio::spawn(async move {
                let outcome = channel.transmit(frame).await;
                bar.inc(1);
                outcome
            })
        })
        .collect();

    for handle in handles {
        handle.await?;
    }
    bar.finish_and_clear();

    println!("{}", stats.snapshot());
    println!("Elapsed         : {:.3} s", started.elapsed().as_secs_f64());
    Ok(())
}

fn run_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let base = args.channel.config()?;
    let losses = loss_grid(args.max_loss, args.steps);

    let bar = progress_bar(losses.len() as u64);
    let points = sweep(&base, &losses, args.frames, args.payload_len, &bar)?;
    bar.finish_and_clear();

    println!("loss_p  error_p  observed_loss  observed_error  mean_delay");
    for point in points {
        println!(
            "{:<6.3}  {:<7.3}  {:<13.4}  {:<14.4}  {:.1}",
            point.loss_probability,
            point.error_probability,
            point.stats.loss_rate(),
            point.stats.corruption_rate(),
            point.stats.mean_delay().unwrap_or(0.0),
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Run(args) => run(args).await,
        Command::Sweep(args) => tokio::task::spawn_blocking(move || run_sweep(args)).await?,
    }
}
