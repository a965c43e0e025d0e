//! Measures observed loss and corruption rates over a grid of loss
//! probabilities, one seeded model per grid point.

use indicatif::ProgressBar;
use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use tracing::trace;

use crate::{
    config::{ChannelConfig, ConfigError},
    frame::Frame,
    impairment::{Impairment, ImpairmentModel},
    observer::{EventKind, StatsSnapshot},
};

/// Outcome tally for one loss probability.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepPoint {
    /// Configured loss probability.
    pub loss_probability: f64,
    /// Configured error probability.
    pub error_probability: f64,
    /// Observed outcomes.
    pub stats: StatsSnapshot,
}

impl SweepPoint {
    /// Observed loss rate minus configured loss probability.
    pub fn loss_error(&self) -> f64 {
        self.stats.loss_rate() - self.loss_probability
    }

    /// Corruption probability the coupled bands actually allow.
    pub fn effective_error_probability(&self) -> f64 {
        self.error_probability.min(1.0 - self.loss_probability)
    }
}

/// `steps` evenly spaced loss probabilities from `0` to `max`, inclusive.
pub fn loss_grid(max: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..steps)
            .map(|i| max * i as f64 / (steps - 1) as f64)
            .collect(),
    }
}

/// Runs `frames` impairment decisions for every loss probability in `losses`.
///
/// Grid points run in parallel. Point `i` seeds its model with
/// `base.seed + i`, so a seeded sweep is reproducible. `progress` advances
/// once per finished point.
pub fn sweep(
    base: &ChannelConfig,
    losses: &[f64],
    frames: u64,
    payload_len: usize,
    progress: &ProgressBar,
) -> Result<Vec<SweepPoint>, ConfigError> {
    let seed = base.seed.unwrap_or_else(rand::random);

    losses
        .par_iter()
        .enumerate()
        .map(|(i, &loss)| {
            let config = ChannelConfig {
                loss_probability: loss,
                ..base.clone()
            };
            let rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let point = run_point(config, rng, frames, payload_len)?;

            progress.inc(1);
            Ok(point)
        })
        .collect()
}

fn run_point(
    config: ChannelConfig,
    rng: StdRng,
    frames: u64,
    payload_len: usize,
) -> Result<SweepPoint, ConfigError> {
    let mut model = ImpairmentModel::new(config.clone(), rng)?;
    let mut stats = StatsSnapshot::default();

    for seq in 0..frames {
        let mut frame = Frame::data(seq, vec![0u8; payload_len]);

        match model.impair(&mut frame) {
            Impairment::Lost => stats.record(EventKind::Lost, None),
            Impairment::Pass {
                delay,
                corrupted_at: Some(_),
            } => stats.record(EventKind::Corrupted, Some(delay)),
            Impairment::Pass { delay, .. } => stats.record(EventKind::Delivered, Some(delay)),
        }
    }

    trace!(
        loss = config.loss_probability,
        lost = stats.lost,
        corrupted = stats.corrupted,
        "Sweep point done"
    );

    Ok(SweepPoint {
        loss_probability: config.loss_probability,
        error_probability: config.error_probability,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_loss_grid() {
        assert!(loss_grid(0.5, 0).is_empty());
        assert_eq!(loss_grid(0.5, 1), vec![0.0]);
        assert_eq!(loss_grid(0.5, 3), vec![0.0, 0.25, 0.5]);
    }

    #[test_log::test]
    fn test_sweep_tracks_configured_loss() {
        let base = ChannelConfig::new(0.0, 0.05, 100).with_seed(11);
        let losses = loss_grid(0.5, 6);
        let progress = ProgressBar::hidden();

        let points = sweep(&base, &losses, 10_000, 16, &progress).unwrap();

        assert_eq!(points.len(), 6);
        assert_eq!(progress.position(), 6);
        for (point, &loss) in points.iter().zip(&losses) {
            assert_eq!(point.loss_probability, loss);
            assert_eq!(point.stats.total(), 10_000);
            assert!(point.loss_error().abs() < 0.02, "{point:?}");
            assert!((point.stats.corruption_rate() - 0.05).abs() < 0.02, "{point:?}");
            assert!(point.stats.mean_delay().unwrap() <= 100.0);
        }
    }

    #[test_log::test]
    fn test_sweep_is_reproducible() {
        let base = ChannelConfig::new(0.0, 0.2, 10).with_seed(3);
        let losses = loss_grid(0.4, 5);

        let a = sweep(&base, &losses, 2_000, 4, &ProgressBar::hidden()).unwrap();
        let b = sweep(&base, &losses, 2_000, 4, &ProgressBar::hidden()).unwrap();
        assert_eq!(a, b);
    }

    #[test_log::test]
    fn test_empty_payload_never_counts_as_corrupted() {
        let base = ChannelConfig::new(0.0, 1.0, 0).with_seed(5);
        let points = sweep(&base, &[0.0], 1_000, 0, &ProgressBar::hidden()).unwrap();

        assert_eq!(points[0].stats.corrupted, 0);
        assert_eq!(points[0].stats.delivered, 1_000);
    }

    #[test_log::test]
    fn test_clipped_band_reports_effective_error() {
        let base = ChannelConfig::new(0.0, 0.9, 0).with_seed(8);
        let points = sweep(&base, &[0.6], 20_000, 8, &ProgressBar::hidden()).unwrap();

        let point = &points[0];
        assert!((point.effective_error_probability() - 0.4).abs() < 1e-9);
        assert!((point.stats.corruption_rate() - 0.4).abs() < 0.02, "{point:?}");
    }

    #[test_log::test]
    fn test_invalid_loss_rejected() {
        let base = ChannelConfig::default().with_seed(0);
        assert!(sweep(&base, &[0.2, 1.5], 10, 1, &ProgressBar::hidden()).is_err());
    }
}
