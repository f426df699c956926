//! Coarse timeout slots.
//!
//! Deadlines are bucketed into [`SLOT_GRANULARITY`] windows measured from the
//! scheduler's creation. Every request whose deadline lands in the same window
//! shares one timer task; when it fires the handler rejects the whole slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::util::lock;

/// Width of one timeout slot.
pub const SLOT_GRANULARITY: Duration = Duration::from_millis(250);

/// Receiver of fired slots.
pub trait SlotHandler: Send + Sync + 'static {
    fn trigger_timeout_slot(&self, slot: u64);
}

/// One timer per distinct deadline window.
pub struct TimeoutScheduler {
    origin: Instant,
    timers: Arc<Mutex<HashMap<u64, AbortHandle>>>,
    handler: Weak<dyn SlotHandler>,
}

impl TimeoutScheduler {
    pub fn new(handler: Weak<dyn SlotHandler>) -> Self {
        Self {
            origin: Instant::now(),
            timers: Arc::new(Mutex::new(HashMap::new())),
            handler,
        }
    }

    /// The first slot whose deadline is at least `timeout` after `now`.
    pub fn slot_for(&self, now: Instant, timeout: Duration) -> u64 {
        let due = now.saturating_duration_since(self.origin) + timeout;
        (due.as_nanos() / SLOT_GRANULARITY.as_nanos()) as u64 + 1
    }

    /// When `slot` fires.
    pub fn deadline_of(&self, slot: u64) -> Instant {
        self.origin + SLOT_GRANULARITY * u32::try_from(slot).unwrap_or(u32::MAX)
    }

    /// Register a timeout and return its slot, starting the slot timer if needed.
    ///
    /// Must be called within a Tokio runtime.
    pub fn schedule(&self, timeout: Duration) -> u64 {
        let slot = self.slot_for(Instant::now(), timeout);
        let mut timers = lock(&self.timers);
        if !timers.contains_key(&slot) {
            let deadline = self.deadline_of(slot);
            let owned = Arc::clone(&self.timers);
            let handler = self.handler.clone();
            let task = tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                lock(&owned).remove(&slot);
                tracing::trace!(
                    target: "snmp_requester::scheduler",
                    { snmp.slot = slot },
                    "timeout slot fired"
                );
                if let Some(handler) = handler.upgrade() {
                    handler.trigger_timeout_slot(slot);
                }
            });
            timers.insert(slot, task.abort_handle());
            tracing::trace!(
                target: "snmp_requester::scheduler",
                { snmp.slot = slot },
                "timeout slot armed"
            );
        }
        slot
    }

    /// Number of armed slot timers.
    pub fn timer_count(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Abort every armed timer without firing it.
    pub fn cancel_all(&self) {
        for (_, timer) in lock(&self.timers).drain() {
            timer.abort();
        }
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
