//! Request/response correlation.
//!
//! Every outstanding request is keyed by its request id and carries the
//! one-shot sender that resolves the caller's [`ResponseHandle`]. Each entry is
//! also a member of exactly one timeout slot of the embedded [`TimeoutScheduler`].

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::pdu::Pdu;
use crate::scheduler::{SlotHandler, TimeoutScheduler};
use crate::util::{lock, random_u32};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

struct Pending {
    target: SocketAddr,
    sender: oneshot::Sender<Result<Pdu>>,
    slot: u64,
    sent_at: Instant,
}

struct State {
    pending: HashMap<i32, Pending>,
    slots: HashMap<u64, HashSet<i32>>,
    next_id: i32,
}

impl State {
    /// Next free id in 1..=i32::MAX, wrapping back to 1.
    fn allocate_id(&mut self) -> i32 {
        loop {
            let id = self.next_id;
            self.next_id = if id == i32::MAX { 1 } else { id + 1 };
            if !self.pending.contains_key(&id) {
                return id;
            }
        }
    }

    fn remove(&mut self, id: i32) -> Option<Pending> {
        let entry = self.pending.remove(&id)?;
        if let Some(members) = self.slots.get_mut(&entry.slot) {
            members.remove(&id);
            if members.is_empty() {
                self.slots.remove(&entry.slot);
            }
        }
        Some(entry)
    }
}

/// In-flight request table.
pub struct RequestCorrelator {
    state: Mutex<State>,
    scheduler: TimeoutScheduler,
    timeout: Duration,
}

impl RequestCorrelator {
    /// Create a correlator whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Arc<Self> {
        let first_id = (random_u32() >> 1).max(1) as i32;
        Arc::new_cyclic(|weak: &Weak<Self>| Self {
            state: Mutex::new(State {
                pending: HashMap::new(),
                slots: HashMap::new(),
                next_id: first_id,
            }),
            scheduler: TimeoutScheduler::new(weak.clone() as Weak<dyn SlotHandler>),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register `pdu` as outstanding towards `target`.
    ///
    /// A request id of 0 is replaced by a fresh one; an explicit id that is
    /// already pending fails with [`Error::DuplicateRequestId`].
    pub fn schedule(&self, pdu: &mut Pdu, target: SocketAddr) -> Result<ResponseHandle> {
        let mut state = lock(&self.state);
        if pdu.request_id == 0 {
            pdu.request_id = state.allocate_id();
        } else if state.pending.contains_key(&pdu.request_id) {
            return Err(Error::DuplicateRequestId(pdu.request_id).boxed());
        }

        let request_id = pdu.request_id;
        let slot = self.scheduler.schedule(self.timeout);
        let (sender, receiver) = oneshot::channel();
        state.pending.insert(
            request_id,
            Pending {
                target,
                sender,
                slot,
                sent_at: Instant::now(),
            },
        );
        state.slots.entry(slot).or_default().insert(request_id);
        tracing::trace!(
            target: "snmp_requester::correlator",
            { snmp.request_id = request_id, snmp.target = %target, snmp.slot = slot },
            "request scheduled"
        );

        Ok(ResponseHandle {
            request_id,
            target,
            receiver,
        })
    }

    /// Detach the pending entry for `id` without resolving it.
    pub fn complete(&self, id: i32) -> Option<Completion> {
        let entry = lock(&self.state).remove(id)?;
        Some(Completion {
            request_id: id,
            target: entry.target,
            sender: entry.sender,
        })
    }

    /// Resolve `id` with `error`. Unknown ids are logged and ignored.
    pub fn reject(&self, id: i32, error: Box<Error>) {
        match self.complete(id) {
            Some(completion) => completion.fail(error),
            None => tracing::debug!(
                target: "snmp_requester::correlator",
                { snmp.request_id = id },
                "reject for unknown request"
            ),
        }
    }

    /// Reject every pending request, building each error from its id and target.
    pub fn reject_all(&self, mut error: impl FnMut(i32, SocketAddr) -> Box<Error>) {
        let drained: Vec<(i32, Pending)> = {
            let mut state = lock(&self.state);
            state.slots.clear();
            state.pending.drain().collect()
        };
        for (id, entry) in drained {
            let _ = entry.sender.send(Err(error(id, entry.target)));
        }
    }

    /// Target recorded for a pending request.
    pub fn target_of(&self, id: i32) -> Option<SocketAddr> {
        lock(&self.state).pending.get(&id).map(|p| p.target)
    }

    pub fn is_pending(&self, id: i32) -> bool {
        lock(&self.state).pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Armed slot timers (one per distinct deadline window).
    pub fn timer_count(&self) -> usize {
        self.scheduler.timer_count()
    }

    /// Stop all slot timers; pending entries are left for the caller to reject.
    pub fn cancel_timers(&self) {
        self.scheduler.cancel_all();
    }
}

impl SlotHandler for RequestCorrelator {
    fn trigger_timeout_slot(&self, slot: u64) {
        let expired: Vec<(i32, Pending)> = {
            let mut state = lock(&self.state);
            let members = state.slots.remove(&slot).unwrap_or_default();
            members
                .into_iter()
                .filter_map(|id| state.pending.remove(&id).map(|p| (id, p)))
                .collect()
        };
        for (request_id, entry) in expired {
            tracing::debug!(
                target: "snmp_requester::correlator",
                { snmp.request_id = request_id, snmp.target = %entry.target },
                "request timed out"
            );
            let _ = entry.sender.send(Err(Error::Timeout {
                target: entry.target,
                request_id,
                elapsed: entry.sent_at.elapsed(),
            }
            .boxed()));
        }
    }
}

/// A pending entry detached by [`RequestCorrelator::complete`]; resolve it exactly once.
#[must_use]
pub struct Completion {
    pub request_id: i32,
    pub target: SocketAddr,
    sender: oneshot::Sender<Result<Pdu>>,
}

impl Completion {
    pub fn resolve(self, pdu: Pdu) {
        let _ = self.sender.send(Ok(pdu));
    }

    pub fn fail(self, error: Box<Error>) {
        let _ = self.sender.send(Err(error));
    }
}

/// Caller side of a scheduled request.
#[derive(Debug)]
pub struct ResponseHandle {
    pub request_id: i32,
    pub target: SocketAddr,
    receiver: oneshot::Receiver<Result<Pdu>>,
}

impl ResponseHandle {
    /// Wait for the response, an error, or the timeout.
    pub async fn wait(self) -> Result<Pdu> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(Error::Transport {
                reason: "client shut down".into(),
            }
            .boxed()),
        }
    }
}
