use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;

/// Why an outbound message was not delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Recipient identity not registered.
    RoutingMiss,
    /// Recipient handle refused the send (closed, queue full).
    SendFailed,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoutingMiss => "routing_miss",
            Self::SendFailed => "send_failed",
        }
    }
}

/// Relay counters. Every increment is mirrored to the `metrics` facade so
/// an installed exporter sees the same numbers.
#[derive(Debug, Default)]
pub struct RelayStats {
    connections: AtomicU64,
    disconnects: AtomicU64,
    delivered: AtomicU64,
    routing_misses: AtomicU64,
    send_failures: AtomicU64,
    malformed: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connections: u64,
    pub disconnects: u64,
    pub delivered: u64,
    pub routing_misses: u64,
    pub send_failures: u64,
    pub malformed: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        counter!("relay_connections_total").increment(1);
    }

    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        counter!("relay_disconnects_total").increment(1);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        counter!("relay_messages_delivered_total").increment(1);
    }

    pub fn record_dropped(&self, reason: DropReason) {
        let slot = match reason {
            DropReason::RoutingMiss => &self.routing_misses,
            DropReason::SendFailed => &self.send_failures,
        };
        slot.fetch_add(1, Ordering::Relaxed);
        counter!("relay_messages_dropped_total", "reason" => reason.as_str()).increment(1);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        counter!("relay_malformed_events_total").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            routing_misses: self.routing_misses.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = RelayStats::new();
        stats.record_connect();
        stats.record_connect();
        stats.record_disconnect();
        stats.record_delivered();
        stats.record_dropped(DropReason::RoutingMiss);
        stats.record_dropped(DropReason::RoutingMiss);
        stats.record_dropped(DropReason::SendFailed);
        stats.record_malformed();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                connections: 2,
                disconnects: 1,
                delivered: 1,
                routing_misses: 2,
                send_failures: 1,
                malformed: 1,
            }
        );
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(RelayStats::new().snapshot()).unwrap();
        assert_eq!(json["delivered"], 0);
        assert_eq!(json["routing_misses"], 0);
    }

    #[test]
    fn drop_reason_labels() {
        assert_eq!(DropReason::RoutingMiss.as_str(), "routing_miss");
        assert_eq!(DropReason::SendFailed.as_str(), "send_failed");
    }
}
