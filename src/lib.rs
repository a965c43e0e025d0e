//! Unreliable point-to-point channel for exercising data-link protocols.

#![forbid(unsafe_code, unused_must_use)]
#![warn(clippy::all, missing_docs)]

/// Cancellation tokens.
pub mod cancel;

/// Async channel front-end.
pub mod channel;

/// Channel configuration and presets.
pub mod config;

/// Frame record.
pub mod frame;

/// Loss, corruption and delay decisions.
pub mod impairment;

/// Structured outcome events.
pub mod observer;

/// Parallel parameter sweeps.
pub mod sweep;

pub use cancel::CancelToken;
pub use channel::{Channel, Outcome};
pub use config::{ChannelConfig, ConfigError, Scenario};
pub use frame::Frame;
pub use impairment::{Impairment, ImpairmentModel};
pub use observer::{
    ChannelEvent, ChannelStats, EventKind, EventLog, Observer, RecordedEvent, StatsSnapshot,
    TracingObserver,
};
