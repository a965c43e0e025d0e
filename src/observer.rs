use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::{debug, info};

use crate::frame::Frame;

/// Kind of a channel outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Dropped.
    Lost,
    /// Corrupted, then delivered.
    Corrupted,
    /// Delivered intact.
    Delivered,
    /// Cancelled while waiting out the delay.
    Cancelled,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lost => "lost",
            Self::Corrupted => "corrupted",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Structured record of one transmit outcome.
#[derive(Clone, Copy, Debug)]
pub struct ChannelEvent<'a> {
    /// What happened.
    pub kind: EventKind,
    /// Frame as it left the channel.
    pub frame: &'a Frame,
    /// Drawn delay in time units. `None` for lost frames.
    pub delay: Option<u32>,
    /// Payload index altered in transit. Set for cancelled frames too.
    pub corrupted_at: Option<usize>,
}

/// Sink for channel events.
pub trait Observer: Send + Sync {
    /// Called once per transmit, after its outcome is settled.
    fn observe(&self, event: &ChannelEvent<'_>);
}

impl<T: Observer + ?Sized> Observer for Arc<T> {
    fn observe(&self, event: &ChannelEvent<'_>) {
        (**self).observe(event)
    }
}

impl<A: Observer, B: Observer> Observer for (A, B) {
    fn observe(&self, event: &ChannelEvent<'_>) {
        self.0.observe(event);
        self.1.observe(event);
    }
}

/// Emits every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &ChannelEvent<'_>) {
        let seq = event.frame.sequence_number();
        let ack = event.frame.is_ack();

        match event.kind {
            EventKind::Delivered => {
                debug!(seq, ack, delay = event.delay, frame = %event.frame, "Frame delivered")
            }
            EventKind::Lost => info!(seq, ack, frame = %event.frame, "Frame lost"),
            EventKind::Corrupted => {
                info!(seq, ack, delay = event.delay, frame = %event.frame, "Frame corrupted")
            }
            EventKind::Cancelled => info!(
                seq,
                ack,
                delay = event.delay,
                corrupted_at = event.corrupted_at,
                frame = %event.frame,
                "Delivery cancelled"
            ),
        }
    }
}

/// Owned copy of a [`ChannelEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    /// What happened.
    pub kind: EventKind,
    /// Frame snapshot.
    pub frame: Frame,
    /// Drawn delay, in time units.
    pub delay: Option<u32>,
    /// Payload index altered in transit.
    pub corrupted_at: Option<usize>,
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<RecordedEvent>>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out the events seen so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Observer for EventLog {
    fn observe(&self, event: &ChannelEvent<'_>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                kind: event.kind,
                frame: event.frame.clone(),
                delay: event.delay,
                corrupted_at: event.corrupted_at,
            });
    }
}

/// Outcome counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Lost frames.
    pub lost: u64,
    /// Corrupted-then-delivered frames.
    pub corrupted: u64,
    /// Frames delivered intact.
    pub delivered: u64,
    /// Cancelled deliveries.
    pub cancelled: u64,
    /// Sum of delays over corrupted and delivered frames, in time units.
    pub total_delay: u64,
}

impl StatsSnapshot {
    /// Counts one event.
    pub fn record(&mut self, kind: EventKind, delay: Option<u32>) {
        match kind {
            EventKind::Lost => self.lost += 1,
            EventKind::Corrupted => self.corrupted += 1,
            EventKind::Delivered => self.delivered += 1,
            EventKind::Cancelled => self.cancelled += 1,
        }
        if matches!(kind, EventKind::Corrupted | EventKind::Delivered) {
            self.total_delay += u64::from(delay.unwrap_or(0));
        }
    }

    /// All recorded outcomes.
    pub fn total(&self) -> u64 {
        self.lost + self.corrupted + self.delivered + self.cancelled
    }

    /// Mean delay of delivered frames, corrupted or not.
    pub fn mean_delay(&self) -> Option<f64> {
        let arrived = self.corrupted + self.delivered;
        (arrived > 0).then(|| self.total_delay as f64 / arrived as f64)
    }

    /// Lost share of all outcomes.
    pub fn loss_rate(&self) -> f64 {
        ratio(self.lost, self.total())
    }

    /// Corrupted share of all outcomes.
    pub fn corruption_rate(&self) -> f64 {
        ratio(self.corrupted, self.total())
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames sent     : {}", self.total())?;
        writeln!(f, "Lost            : {}", self.lost)?;
        writeln!(f, "Corrupted       : {}", self.corrupted)?;
        writeln!(f, "Delivered intact: {}", self.delivered)?;
        writeln!(f, "Cancelled       : {}", self.cancelled)?;
        match self.mean_delay() {
            Some(mean) => write!(f, "Mean delay      : {mean:.1}"),
            None => write!(f, "Mean delay      : -"),
        }
    }
}

/// Thread-safe outcome counters, usable as an [`Observer`].
#[derive(Debug, Default)]
pub struct ChannelStats {
    lost: AtomicU64,
    corrupted: AtomicU64,
    delivered: AtomicU64,
    cancelled: AtomicU64,
    total_delay: AtomicU64,
}

impl ChannelStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counts.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lost: self.lost.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            total_delay: self.total_delay.load(Ordering::Relaxed),
        }
    }
}

impl Observer for ChannelStats {
    fn observe(&self, event: &ChannelEvent<'_>) {
        let counter = match event.kind {
            EventKind::Lost => &self.lost,
            EventKind::Corrupted => &self.corrupted,
            EventKind::Delivered => &self.delivered,
            EventKind::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if matches!(event.kind, EventKind::Corrupted | EventKind::Delivered) {
            self.total_delay
                .fetch_add(u64::from(event.delay.unwrap_or(0)), Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, frame: &Frame, delay: Option<u32>) -> ChannelEvent<'_> {
        ChannelEvent {
            kind,
            frame,
            delay,
            corrupted_at: None,
        }
    }

    #[test_log::test]
    fn test_stats_counts_outcomes() {
        let stats = ChannelStats::new();
        let frame = Frame::data(1, "x");

        stats.observe(&event(EventKind::Lost, &frame, None));
        stats.observe(&event(EventKind::Delivered, &frame, Some(10)));
        stats.observe(&event(EventKind::Corrupted, &frame, Some(30)));
        stats.observe(&event(EventKind::Cancelled, &frame, Some(50)));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total(), 4);
        assert_eq!(snapshot.lost, 1);
        assert_eq!(snapshot.total_delay, 40);
        assert_eq!(snapshot.mean_delay(), Some(20.0));
        assert_eq!(snapshot.loss_rate(), 0.25);
    }

    #[test_log::test]
    fn test_empty_snapshot() {
        let snapshot = StatsSnapshot::default();
        assert_eq!(snapshot.mean_delay(), None);
        assert_eq!(snapshot.loss_rate(), 0.0);
        assert!(snapshot.to_string().contains("Mean delay      : -"));
    }

    #[test_log::test]
    fn test_pair_observer_and_log() {
        let log = Arc::new(EventLog::new());
        let stats = Arc::new(ChannelStats::new());
        let observer = (log.clone(), stats.clone());

        let frame = Frame::ack(9);
        observer.observe(&event(EventKind::Delivered, &frame, Some(0)));
        TracingObserver.observe(&event(EventKind::Lost, &frame, None));

        assert_eq!(
            log.events(),
            vec![RecordedEvent {
                kind: EventKind::Delivered,
                frame: Frame::ack(9),
                delay: Some(0),
                corrupted_at: None,
            }]
        );
        assert_eq!(stats.snapshot().delivered, 1);
    }
}
