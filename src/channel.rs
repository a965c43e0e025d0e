use std::{future::Future, sync::Arc};

use rand::{Rng, rngs::StdRng};
use tokio::{
    sync::Mutex,
    time::{Instant, sleep_until},
};
use tracing::{debug, instrument};

use crate::{
    cancel::CancelToken,
    config::{ChannelConfig, ConfigError},
    frame::Frame,
    impairment::{Impairment, ImpairmentModel},
    observer::{ChannelEvent, EventKind, Observer, TracingObserver},
};

/// Result of one [`Channel::transmit`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The frame was dropped.
    Lost,
    /// The frame arrived after `delay` time units.
    Delivered {
        /// Frame as received, possibly corrupted.
        frame: Frame,
        /// Realized delay, in time units.
        delay: u32,
        /// Payload index altered in transit, if any.
        corrupted_at: Option<usize>,
    },
    /// The wait was interrupted before delivery.
    Cancelled {
        /// Frame as it stood when cancelled, including any corruption.
        frame: Frame,
        /// Delay that was being waited out, in time units.
        delay: u32,
        /// Payload index altered before cancellation, if any.
        corrupted_at: Option<usize>,
    },
}

impl Outcome {
    /// Event kind for this outcome.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Lost => EventKind::Lost,
            Self::Delivered {
                corrupted_at: Some(_),
                ..
            } => EventKind::Corrupted,
            Self::Delivered { .. } => EventKind::Delivered,
            Self::Cancelled { .. } => EventKind::Cancelled,
        }
    }

    /// Delivered frame, if any.
    pub fn delivered(&self) -> Option<&Frame> {
        match self {
            Self::Delivered { frame, .. } => Some(frame),
            _ => None,
        }
    }

    /// Drawn delay. `None` for lost frames.
    pub fn delay(&self) -> Option<u32> {
        match self {
            Self::Delivered { delay, .. } | Self::Cancelled { delay, .. } => Some(*delay),
            Self::Lost => None,
        }
    }

    /// Payload index altered in transit, delivered or cancelled alike.
    pub fn corrupted_at(&self) -> Option<usize> {
        match self {
            Self::Delivered { corrupted_at, .. } | Self::Cancelled { corrupted_at, .. } => {
                *corrupted_at
            }
            Self::Lost => None,
        }
    }
}

/// Unreliable point-to-point link.
///
/// Concurrent [`transmit`](Self::transmit) calls hold the randomness source
/// only while drawing, then wait out their delays independently. Deliveries
/// are therefore unordered across calls.
pub struct Channel<R = StdRng> {
    model: Mutex<ImpairmentModel<R>>,
    config: ChannelConfig,
    shutdown: CancelToken,
    observer: Arc<dyn Observer>,
}

impl Channel<StdRng> {
    /// Creates a channel seeded from `config.seed`, or from OS entropy.
    pub fn new(config: ChannelConfig) -> Result<Self, ConfigError> {
        let model = ImpairmentModel::seeded(config.clone())?;
        Ok(Self::from_model(config, model))
    }
}

impl<R: Rng + Send> Channel<R> {
    /// Creates a channel drawing from `rng`. `config.seed` is ignored.
    pub fn with_rng(config: ChannelConfig, rng: R) -> Result<Self, ConfigError> {
        let model = ImpairmentModel::new(config.clone(), rng)?;
        Ok(Self::from_model(config, model))
    }

    fn from_model(config: ChannelConfig, model: ImpairmentModel<R>) -> Self {
        debug!(
            loss = config.loss_probability,
            error = config.error_probability,
            max_delay = config.max_delay,
            "Channel initialized"
        );

        Self {
            model: Mutex::new(model),
            config,
            shutdown: CancelToken::new(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replaces the event sink.
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Configuration fixed at construction.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Cancels every pending and future delivery on this channel.
    pub fn shutdown(&self) {
        debug!("Channel shut down");
        self.shutdown.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Sends a frame through the channel.
    #[instrument(skip(self, frame), fields(seq = frame.sequence_number()))]
    pub async fn transmit(&self, frame: Frame) -> Outcome {
        self.transmit_until(frame, std::future::pending()).await
    }

    /// Sends a frame, giving up on delivery once `cancel` fires.
    #[instrument(skip(self, frame, cancel), fields(seq = frame.sequence_number()))]
    pub async fn transmit_cancellable(&self, frame: Frame, cancel: &CancelToken) -> Outcome {
        self.transmit_until(frame, cancel.cancelled()).await
    }

    async fn transmit_until(&self, mut frame: Frame, cancel: impl Future<Output = ()>) -> Outcome {
        let start = Instant::now();
        let impairment = self.model.lock().await.impair(&mut frame);

        let (delay, corrupted_at) = match impairment {
            Impairment::Lost => {
                self.emit(EventKind::Lost, &frame, None, None);
                return Outcome::Lost;
            }
            Impairment::Pass { delay, corrupted_at } => (delay, corrupted_at),
        };

        let deadline = start + self.config.delay_duration(delay);

        let outcome = tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => Outcome::Cancelled { frame, delay, corrupted_at },
            _ = cancel => Outcome::Cancelled { frame, delay, corrupted_at },
            _ = sleep_until(deadline) => Outcome::Delivered {
                frame,
                delay,
                corrupted_at,
            },
        };

        match &outcome {
            Outcome::Delivered { frame, .. } | Outcome::Cancelled { frame, .. } => {
                self.emit(outcome.kind(), frame, Some(delay), corrupted_at)
            }
            Outcome::Lost => {}
        }

        outcome
    }

    fn emit(&self, kind: EventKind, frame: &Frame, delay: Option<u32>, corrupted_at: Option<usize>) {
        self.observer.observe(&ChannelEvent {
            kind,
            frame,
            delay,
            corrupted_at,
        });
    }
}
