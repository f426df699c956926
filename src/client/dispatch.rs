//! Routing of received datagrams to the requests waiting for them.

use std::net::SocketAddr;

use bytes::Bytes;

use super::ClientInner;
use crate::context::Inbound;
use crate::correlator::Completion;
use crate::counters::Counters;
use crate::error::Error;
use crate::message::{CommunityMessage, Message, V3Message};
use crate::pdu::{Pdu, PduType};
use crate::trace::Direction;
use crate::util::lock;

impl ClientInner {
    /// Handle one datagram received from `peer`.
    pub(super) fn dispatch(&self, data: Bytes, peer: SocketAddr) {
        if let Some(trace) = &self.trace {
            trace.record(Direction::Incoming, peer, &data);
        }

        let message = match Message::decode_from(data.clone(), peer) {
            Ok(message) => message,
            Err(err) => {
                Counters::incr(&self.counters.received_invalid_packets);
                tracing::debug!(
                    target: "snmp_requester::dispatch",
                    { snmp.source = %peer, error = %err },
                    "dropping undecodable datagram"
                );
                return;
            }
        };
        Counters::incr(&self.counters.received_messages);

        match message {
            Message::Community(message) => self.dispatch_community(message, peer),
            Message::V3(message) => self.dispatch_v3(&message, &data, peer),
        }
    }

    fn dispatch_community(&self, message: CommunityMessage, peer: SocketAddr) {
        let pdu = message.pdu;
        if pdu.is_trap() {
            tracing::debug!(
                target: "snmp_requester::dispatch",
                { snmp.source = %peer },
                "ignoring trap"
            );
            return;
        }
        if let Some(completion) = self.take_pending(pdu.request_id, peer) {
            self.resolve(completion, pdu);
        }
    }

    fn dispatch_v3(&self, message: &V3Message, raw: &[u8], peer: SocketAddr) {
        let msg_id = message.msg_id();
        let owner = lock(&self.messages).owners.get(&msg_id).cloned();
        let Some(target) = owner else {
            tracing::debug!(
                target: "snmp_requester::dispatch",
                { snmp.source = %peer, snmp.msg_id = msg_id },
                "no request waiting for message id"
            );
            return;
        };
        if target.address != peer {
            tracing::warn!(
                target: "snmp_requester::dispatch",
                { snmp.source = %peer, snmp.target = %target.address, snmp.msg_id = msg_id },
                "message id answered from unexpected address"
            );
            return;
        }

        let outcome = lock(&target.context).handle_incoming_v3(message, raw);
        match outcome {
            Ok(Inbound::Deliver(pdu)) => {
                if let Some(completion) = self.take_pending(pdu.request_id, peer) {
                    self.resolve(completion, pdu);
                }
            }
            Ok(Inbound::Refreshed) => {
                tracing::trace!(
                    target: "snmp_requester::dispatch",
                    { snmp.target = %peer, snmp.msg_id = msg_id },
                    "engine parameters refreshed"
                );
                if let Some(pdu) = message.plaintext_pdu()
                    && let Some(completion) = self.take_pending(pdu.request_id, peer)
                {
                    self.resolve(completion, pdu.clone());
                }
            }
            Ok(Inbound::Rejected) => {
                tracing::debug!(
                    target: "snmp_requester::dispatch",
                    { snmp.target = %peer, snmp.msg_id = msg_id },
                    "message rejected by security model"
                );
            }
            Err(err) => {
                if let Some(pdu) = message.plaintext_pdu()
                    && let Some(completion) = self.take_pending(pdu.request_id, peer)
                {
                    Counters::incr(&self.counters.received_reports);
                    completion.fail(err);
                }
            }
        }
    }

    /// Detach the pending request `id` if it was sent to `peer`.
    fn take_pending(&self, id: i32, peer: SocketAddr) -> Option<Completion> {
        match self.correlator.target_of(id) {
            Some(target) if target == peer => self.correlator.complete(id),
            Some(target) => {
                tracing::warn!(
                    target: "snmp_requester::dispatch",
                    { snmp.source = %peer, snmp.target = %target, snmp.request_id = id },
                    "response from unexpected address"
                );
                None
            }
            None => {
                tracing::debug!(
                    target: "snmp_requester::dispatch",
                    { snmp.source = %peer, snmp.request_id = id },
                    "response for unknown or expired request"
                );
                None
            }
        }
    }

    fn resolve(&self, completion: Completion, pdu: Pdu) {
        match pdu.pdu_type {
            PduType::Response => {
                Counters::incr(&self.counters.received_responses);
                if pdu.is_error() {
                    let error = pdu.to_error(completion.target);
                    completion.fail(error);
                } else {
                    completion.resolve(pdu);
                }
            }
            PduType::Report => {
                Counters::incr(&self.counters.received_reports);
                completion.resolve(pdu);
            }
            other => {
                tracing::debug!(
                    target: "snmp_requester::dispatch",
                    { snmp.source = %completion.target, snmp.pdu_type = %other },
                    "unexpected PDU type in reply"
                );
                let target = completion.target;
                completion.fail(Error::MalformedResponse { target }.boxed());
            }
        }
    }
}
