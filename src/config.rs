use std::{fmt, str::FromStr, time::Duration};

use thiserror::Error;

/// Default loss probability.
pub static DEFAULT_LOSS_PROBABILITY: f64 = 0.10;

/// Default corruption probability.
pub static DEFAULT_ERROR_PROBABILITY: f64 = 0.05;

/// Default maximum delay, in time units.
pub static DEFAULT_MAX_DELAY: u32 = 200;

/// Default length of one time unit.
pub static DEFAULT_TIME_UNIT: Duration = Duration::from_millis(1);

const LOSS_VAR: &str = "CHANNEL_LOSS_PROBABILITY";
const ERROR_VAR: &str = "CHANNEL_ERROR_PROBABILITY";
const MAX_DELAY_VAR: &str = "CHANNEL_MAX_DELAY";
const TIME_UNIT_VAR: &str = "CHANNEL_TIME_UNIT_MS";
const SEED_VAR: &str = "CHANNEL_SEED";

/// Rejected channel configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A probability outside `[0, 1]`, or NaN.
    #[error("{name} must lie in [0, 1], got {value}")]
    ProbabilityOutOfRange {
        /// Offending option.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// A negative maximum delay.
    #[error("max delay must be non-negative, got {0}")]
    NegativeMaxDelay(i64),
    /// A value that could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw text.
        value: String,
    },
}

/// Impairment parameters of one simulated link.
///
/// Loss and corruption share a single uniform draw: a frame is lost when the
/// draw falls below `loss_probability`, and corrupted when it falls in
/// `[loss_probability, loss_probability + error_probability)`. When the two
/// probabilities sum above one the corruption band is clipped at `1.0`, so the
/// effective corruption probability is `1 - loss_probability`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    /// Probability a frame is dropped.
    pub loss_probability: f64,
    /// Width of the corruption band above the loss band.
    pub error_probability: f64,
    /// Inclusive upper bound of the delivery delay, in time units.
    pub max_delay: u32,
    /// Wall-clock length of one time unit.
    pub time_unit: Duration,
    /// Seed for the randomness source. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            loss_probability: DEFAULT_LOSS_PROBABILITY,
            error_probability: DEFAULT_ERROR_PROBABILITY,
            max_delay: DEFAULT_MAX_DELAY,
            time_unit: DEFAULT_TIME_UNIT,
            seed: None,
        }
    }
}

impl ChannelConfig {
    /// Creates a config with the given probabilities and delay bound.
    pub fn new(loss_probability: f64, error_probability: f64, max_delay: u32) -> Self {
        Self {
            loss_probability,
            error_probability,
            max_delay,
            ..Default::default()
        }
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the time unit.
    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Checks both probabilities lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("loss probability", self.loss_probability)?;
        check_probability("error probability", self.error_probability)
    }

    /// Whether the corruption band extends past `1.0` and gets clipped.
    pub fn corruption_band_clipped(&self) -> bool {
        self.loss_probability + self.error_probability > 1.0
    }

    /// Wall-clock duration of `units` time units.
    pub fn delay_duration(&self, units: u32) -> Duration {
        self.time_unit.saturating_mul(units)
    }

    /// Loads a config from `CHANNEL_*` environment variables.
    ///
    /// Unset variables keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads a config from any key lookup, using the `CHANNEL_*` names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOSS_VAR) {
            config.loss_probability = parse(LOSS_VAR, &raw)?;
        }
        if let Some(raw) = lookup(ERROR_VAR) {
            config.error_probability = parse(ERROR_VAR, &raw)?;
        }
        if let Some(raw) = lookup(MAX_DELAY_VAR) {
            let max_delay: i64 = parse(MAX_DELAY_VAR, &raw)?;
            if max_delay < 0 {
                return Err(ConfigError::NegativeMaxDelay(max_delay));
            }
            config.max_delay = u32::try_from(max_delay).map_err(|_| ConfigError::InvalidValue {
                var: MAX_DELAY_VAR,
                value: raw,
            })?;
        }
        if let Some(raw) = lookup(TIME_UNIT_VAR) {
            config.time_unit = Duration::from_millis(parse(TIME_UNIT_VAR, &raw)?);
        }
        if let Some(raw) = lookup(SEED_VAR) {
            config.seed = Some(parse(SEED_VAR, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { name, value })
    }
}

fn parse<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_owned(),
    })
}

/// Preset link conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// No loss, no corruption, no delay.
    Perfect,
    /// The default noisy link.
    Noisy,
    /// Heavier loss and corruption with longer delays.
    Unstable,
}

impl Scenario {
    /// Channel configuration for this preset.
    pub fn config(self) -> ChannelConfig {
        match self {
            Self::Perfect => ChannelConfig::new(0.0, 0.0, 0),
            Self::Noisy => ChannelConfig::new(0.10, 0.05, 200),
            Self::Unstable => ChannelConfig::new(0.15, 0.10, 300),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Perfect => "perfect",
            Self::Noisy => "noisy",
            Self::Unstable => "unstable",
        })
    }
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "perfect" => Ok(Self::Perfect),
            "2" | "noisy" => Ok(Self::Noisy),
            "3" | "unstable" => Ok(Self::Unstable),
            _ => Err(ConfigError::InvalidValue {
                var: "scenario",
                value: s.to_owned(),
            }),
        }
    }
}
