use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{trace, warn};

use crate::{
    config::{ChannelConfig, ConfigError},
    frame::Frame,
};

/// Fate of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Impairment {
    /// The frame never reaches the receiver.
    Lost,
    /// The frame is delivered after `delay` time units.
    Pass {
        /// Realized delay, in `[0, max_delay]`.
        delay: u32,
        /// Payload index altered by corruption, if any.
        corrupted_at: Option<usize>,
    },
}

/// Loss/corruption/delay decision procedure.
///
/// Each call to [`impair`](Self::impair) draws, in order: one threshold value
/// in `[0, 1)`, a payload position when corrupting a non-empty payload, and a
/// delay when the frame was not lost. A fixed seed therefore reproduces the
/// same outcomes for the same sequence of frames.
pub struct ImpairmentModel<R = StdRng> {
    config: ChannelConfig,
    rng: R,
}

impl ImpairmentModel<StdRng> {
    /// Creates a model seeded from `config.seed`, or from OS entropy.
    pub fn seeded(config: ChannelConfig) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self::new(config, rng)
    }
}

impl<R: Rng> ImpairmentModel<R> {
    /// Creates a model drawing from `rng`.
    pub fn new(config: ChannelConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;

        if config.corruption_band_clipped() {
            warn!(
                loss = config.loss_probability,
                error = config.error_probability,
                effective_error = 1.0 - config.loss_probability,
                "Corruption band clipped at 1.0"
            );
        }

        Ok(Self { config, rng })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Decides the fate of `frame`, corrupting its payload in place if drawn.
    pub fn impair(&mut self, frame: &mut Frame) -> Impairment {
        let r: f64 = self.rng.random();

        if r < self.config.loss_probability {
            trace!(r, seq = frame.sequence_number(), "Lost");
            return Impairment::Lost;
        }

        let corrupted_at = if r < self.config.loss_probability + self.config.error_probability {
            let position = corrupt(frame, &mut self.rng);
            if position.is_none() {
                trace!(seq = frame.sequence_number(), "Corruption skipped on empty payload");
            }
            position
        } else {
            None
        };

        let delay = self.rng.random_range(0..=self.config.max_delay);
        trace!(r, delay, ?corrupted_at, seq = frame.sequence_number(), "Pass");

        Impairment::Pass { delay, corrupted_at }
    }
}

/// Increments one uniformly chosen payload byte, wrapping `0xFF` to `0x00`.
///
/// Returns the altered index, or `None` for an empty payload.
pub fn corrupt<R: Rng>(frame: &mut Frame, rng: &mut R) -> Option<usize> {
    let payload = frame.payload_mut();
    if payload.is_empty() {
        return None;
    }

    let position = rng.random_range(0..payload.len());
    payload[position] = payload[position].wrapping_add(1);
    Some(position)
}
