//! Per-client message statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed atomics from the send paths and read loops.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) sent_messages: AtomicU64,
    pub(crate) sent_requests: AtomicU64,
    pub(crate) sent_bytes: AtomicU64,
    pub(crate) received_invalid_packets: AtomicU64,
    pub(crate) received_messages: AtomicU64,
    pub(crate) received_responses: AtomicU64,
    pub(crate) received_reports: AtomicU64,
}

impl Counters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            sent_messages: self.sent_messages.load(Ordering::Relaxed),
            sent_requests: self.sent_requests.load(Ordering::Relaxed),
            sent_bytes: self.sent_bytes.load(Ordering::Relaxed),
            received_invalid_packets: self.received_invalid_packets.load(Ordering::Relaxed),
            received_messages: self.received_messages.load(Ordering::Relaxed),
            received_responses: self.received_responses.load(Ordering::Relaxed),
            received_reports: self.received_reports.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.sent_messages,
            &self.sent_requests,
            &self.sent_bytes,
            &self.received_invalid_packets,
            &self.received_messages,
            &self.received_responses,
            &self.received_reports,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of a client's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Datagrams written, including discovery and retries.
    pub sent_messages: u64,
    /// Operations issued by callers.
    pub sent_requests: u64,
    pub sent_bytes: u64,
    /// Datagrams that failed to decode or were dropped as spoofed.
    pub received_invalid_packets: u64,
    pub received_messages: u64,
    pub received_responses: u64,
    pub received_reports: u64,
}
