//! Frame counters fed from the event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::bus::{EventBus, EventFilter, SubscriptionId};
use super::events::BridgeEvent;

/// Running totals of frame traffic
#[derive(Debug, Default)]
pub struct BridgeStats {
    decoded: AtomicU64,
    forwarded: AtomicU64,
    transmitted: AtomicU64,
    consumed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames decoded from serial
    pub decoded: u64,
    /// Frames sent to the bus
    pub forwarded: u64,
    /// Frames written to serial
    pub transmitted: u64,
    /// Control frames swallowed
    pub consumed: u64,
    /// Frames discarded
    pub dropped: u64,
}

impl BridgeStats {
    /// Create counters and subscribe them to `bus`
    pub fn attach(bus: &EventBus) -> (Arc<Self>, SubscriptionId) {
        let stats = Arc::new(Self::default());
        let sink = stats.clone();
        let id = bus.subscribe(EventFilter::All, move |event| sink.record(event));
        (stats, id)
    }

    /// Count one event
    pub fn record(&self, event: &BridgeEvent) {
        let counter = match event {
            BridgeEvent::FrameDecoded { .. } => &self.decoded,
            BridgeEvent::FrameForwarded { .. } => &self.forwarded,
            BridgeEvent::FrameTransmitted { .. } => &self.transmitted,
            BridgeEvent::FrameConsumed { .. } => &self.consumed,
            BridgeEvent::FrameDropped { .. } => &self.dropped,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            decoded: self.decoded.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            transmitted: self.transmitted.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "decoded={} forwarded={} transmitted={} consumed={} dropped={}",
            self.decoded, self.forwarded, self.transmitted, self.consumed, self.dropped
        )
    }
}
