//! Multi-target SNMP client.
//!
//! A [`Client`] owns at most one UDP socket per address family and multiplexes
//! requests to every registered target over them. Requests are correlated by
//! request id (community versions) or message id (v3) and time out through the
//! shared slot scheduler of the [`RequestCorrelator`].

mod builder;
mod dispatch;
mod socket;
mod table;

pub use builder::ClientBuilder;
pub use table::{BulkTable, Column, OidList, normalize};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::context::SecurityContext;
use crate::correlator::{DEFAULT_TIMEOUT, RequestCorrelator};
use crate::counters::{CounterSnapshot, Counters};
use crate::credential::Credential;
use crate::error::{AuthErrorKind, Error, Result};
use crate::pdu::{Pdu, PduType};
use crate::trace::{Direction, PacketTrace};
use crate::util::{lock, random_u32};
use crate::v3::engine::classify_report;
use crate::version::Version;

use socket::Sockets;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Time to wait for a reply before failing with [`Error::Timeout`] (default: 3 seconds).
    ///
    /// Expiry is checked on a 250 ms tick, so a request may wait up to one
    /// tick longer than this.
    pub request_timeout: Duration,
    /// Local address of the IPv4 socket (default: `0.0.0.0:0`).
    pub bind_v4: SocketAddr,
    /// Local address of the IPv6 socket (default: `[::]:0`).
    pub bind_v6: SocketAddr,
    /// Socket receive buffer size in bytes; 0 keeps the OS default (default: 65535).
    pub recv_buffer_size: usize,
    /// Max-repetitions used by [`Client::fetch_table`] (default: 10).
    pub max_repetitions: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_TIMEOUT,
            bind_v4: SocketAddr::from(([0, 0, 0, 0], 0)),
            bind_v6: SocketAddr::from(([0u16; 8], 0)),
            recv_buffer_size: 65535,
            max_repetitions: 10,
        }
    }
}

/// Last observed reachability of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentReachability {
    /// No request has completed yet.
    #[default]
    Pending,
    /// The agent answered the most recent request.
    Reachable,
    /// The most recent request timed out.
    Unreachable,
}

/// A registered agent.
struct Target {
    id: Box<str>,
    address: SocketAddr,
    context: Mutex<SecurityContext>,
    reachability: Mutex<AgentReachability>,
    /// Held for the whole discovery exchange; one discovery per target at a time.
    discovery: tokio::sync::Mutex<()>,
}

/// Outstanding v3 message ids and the target each was sent to.
struct MessageTable {
    next_id: i32,
    owners: HashMap<i32, Arc<Target>>,
}

impl MessageTable {
    fn allocate(&mut self, target: &Arc<Target>) -> i32 {
        loop {
            let id = self.next_id;
            self.next_id = if id == i32::MAX { 1 } else { id + 1 };
            if !self.owners.contains_key(&id) {
                self.owners.insert(id, Arc::clone(target));
                return id;
            }
        }
    }
}

/// Removes its message id from the table when dropped.
struct MessageSlot<'a> {
    table: &'a Mutex<MessageTable>,
    msg_id: i32,
}

impl Drop for MessageSlot<'_> {
    fn drop(&mut self) {
        lock(self.table).owners.remove(&self.msg_id);
    }
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    correlator: Arc<RequestCorrelator>,
    targets: Mutex<HashMap<Box<str>, Arc<Target>>>,
    messages: Mutex<MessageTable>,
    sockets: Sockets,
    counters: Counters,
    trace: Option<Arc<dyn PacketTrace>>,
    shutdown: CancellationToken,
}

impl ClientInner {
    fn close(&self, reason: &str) {
        self.shutdown.cancel();
        self.correlator.cancel_timers();
        self.sockets.clear();
        self.correlator.reject_all(|_, _| Error::transport(reason));
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.close("client dropped");
    }
}

/// SNMP client shared by any number of targets.
///
/// Cloning is cheap; clones share sockets, targets and in-flight requests.
///
/// # Example
///
/// ```rust,no_run
/// use snmp_requester::{Client, Credential, OidList, oid};
///
/// # async fn example() -> snmp_requester::Result<()> {
/// let client = Client::builder().build();
/// client.register_target("core-sw1", "192.0.2.1:161".parse().unwrap(), Credential::v2c("public"))?;
///
/// let oids = OidList::from(vec![oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
/// let response = client.get("core-sw1", &oids).await?;
/// for vb in &response.varbinds {
///     println!("{vb}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from `config` without packet tracing.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_trace(config, None)
    }

    fn with_trace(config: ClientConfig, trace: Option<Arc<dyn PacketTrace>>) -> Self {
        let correlator = RequestCorrelator::new(config.request_timeout);
        Self {
            inner: Arc::new(ClientInner {
                config,
                correlator,
                targets: Mutex::new(HashMap::new()),
                messages: Mutex::new(MessageTable {
                    next_id: (random_u32() >> 1).max(1) as i32,
                    owners: HashMap::new(),
                }),
                sockets: Sockets::default(),
                counters: Counters::default(),
                trace,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Register (or replace) the agent known as `id`.
    ///
    /// Fails with [`Error::Config`] when the credential is incomplete for its
    /// security level.
    pub fn register_target(
        &self,
        id: impl Into<String>,
        address: SocketAddr,
        credential: impl Into<Credential>,
    ) -> Result<()> {
        let id: Box<str> = id.into().into_boxed_str();
        let context = SecurityContext::new(address, credential.into())?;
        tracing::debug!(
            target: "snmp_requester::client",
            { snmp.target_id = %id, snmp.target = %address, snmp.version = %context.version() },
            "target registered"
        );
        let target = Arc::new(Target {
            id: id.clone(),
            address,
            context: Mutex::new(context),
            reachability: Mutex::new(AgentReachability::Pending),
            discovery: tokio::sync::Mutex::new(()),
        });
        lock(&self.inner.targets).insert(id, target);
        Ok(())
    }

    /// Forget the agent known as `id`. Returns whether it was registered.
    ///
    /// Requests already in flight to it still complete.
    pub fn deregister_target(&self, id: &str) -> bool {
        lock(&self.inner.targets).remove(id).is_some()
    }

    /// Last observed reachability of `id`, if registered.
    pub fn reachability(&self, id: &str) -> Option<AgentReachability> {
        let target = lock(&self.inner.targets).get(id).cloned()?;
        let state = *lock(&target.reachability);
        Some(state)
    }

    /// Traffic counters since creation or the last [`reset_counters`](Self::reset_counters).
    pub fn counters(&self) -> CounterSnapshot {
        self.inner.counters.snapshot()
    }

    pub fn reset_counters(&self) {
        self.inner.counters.reset();
    }

    /// Number of requests awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Close the sockets and fail every outstanding request.
    ///
    /// Subsequent requests fail with [`Error::Transport`].
    pub fn shutdown(&self) {
        tracing::debug!(target: "snmp_requester::client", "client shutting down");
        self.inner.close("client shut down");
    }

    /// GET the values of `oids`.
    #[instrument(skip(self, target, oids), err, fields(snmp.target = %target, snmp.oid_count = oids.len()))]
    pub async fn get(&self, target: &str, oids: &OidList) -> Result<Pdu> {
        self.send_request_pdu(target, Pdu::get_request(0, &oids.oids()))
            .await
    }

    /// GETNEXT the lexicographic successors of `oids`.
    #[instrument(skip(self, target, oids), err, fields(snmp.target = %target, snmp.oid_count = oids.len()))]
    pub async fn get_next(&self, target: &str, oids: &OidList) -> Result<Pdu> {
        self.send_request_pdu(target, Pdu::get_next_request(0, &oids.oids()))
            .await
    }

    /// GETBULK `oids`; the first `non_repeaters` are fetched once, the rest
    /// up to `max_repetitions` times.
    #[instrument(
        skip(self, target, oids),
        err,
        fields(snmp.target = %target, snmp.oid_count = oids.len())
    )]
    pub async fn get_bulk(
        &self,
        target: &str,
        oids: &OidList,
        max_repetitions: u32,
        non_repeaters: u32,
    ) -> Result<Pdu> {
        let pdu = Pdu::get_bulk(0, non_repeaters, max_repetitions, &oids.oids());
        self.send_request_pdu(target, pdu).await
    }

    /// GETBULK and reshape the reply into scalars and per-column rows.
    ///
    /// `base` names the column prefixes the reply is matched against and
    /// defaults to `oids`; it must have the same length as `oids`.
    #[instrument(
        skip(self, target, oids, base),
        err,
        fields(snmp.target = %target, snmp.oid_count = oids.len())
    )]
    pub async fn get_bulk_normalized(
        &self,
        target: &str,
        oids: &OidList,
        base: Option<&OidList>,
        max_repetitions: u32,
        non_repeaters: u32,
    ) -> Result<BulkTable> {
        let base = base.unwrap_or(oids);
        if base.len() != oids.len() {
            return Err(Error::Config(
                format!(
                    "base list has {} entries but request has {}",
                    base.len(),
                    oids.len()
                )
                .into(),
            )
            .boxed());
        }
        if non_repeaters as usize > oids.len() {
            return Err(Error::Config("non-repeaters exceeds the number of OIDs".into()).boxed());
        }
        let response = self
            .get_bulk(target, oids, max_repetitions, non_repeaters)
            .await?;
        normalize(
            response.varbinds,
            base,
            non_repeaters as usize,
            max_repetitions,
        )
    }

    /// Retrieve the scalars and complete columns named by `oids`.
    ///
    /// Each column is re-requested from its highest row until a round returns
    /// fewer than `max_repetitions` rows for it, or stops advancing.
    #[instrument(
        skip(self, target, oids),
        err,
        fields(snmp.target = %target, snmp.oid_count = oids.len(), snmp.rounds = tracing::field::Empty)
    )]
    pub async fn table(
        &self,
        target: &str,
        oids: &OidList,
        max_repetitions: u32,
        non_repeaters: u32,
    ) -> Result<BulkTable> {
        if max_repetitions == 0 {
            return Err(Error::Config("max-repetitions must be positive".into()).boxed());
        }
        if non_repeaters as usize > oids.len() {
            return Err(Error::Config("non-repeaters exceeds the number of OIDs".into()).boxed());
        }

        let mut result = BulkTable::default();
        let mut fetch = oids.clone();
        let mut base = oids.clone();
        let mut non_repeaters = non_repeaters;
        let mut rounds = 0u32;

        while !fetch.is_empty() {
            rounds += 1;
            let page = self
                .get_bulk_normalized(target, &fetch, Some(&base), max_repetitions, non_repeaters)
                .await?;

            if non_repeaters > 0 {
                result.scalars.extend(page.scalars);
                base = base.tail(non_repeaters as usize);
                non_repeaters = 0;
            }

            let mut next_fetch = OidList::new();
            let mut next_base = OidList::new();
            for (i, column) in page.columns.into_iter().enumerate() {
                let alias = base.alias(i).map(str::to_owned);
                let column_base = column.base.clone();
                let continue_from = if column.len() >= max_repetitions as usize {
                    column.last_oid().cloned()
                } else {
                    None
                };
                let previous = result
                    .column(&column.name)
                    .and_then(Column::last_oid)
                    .cloned();
                result.merge_column(column);

                let Some(next) = continue_from else { continue };
                if previous.is_some_and(|previous| next <= previous) {
                    tracing::debug!(
                        target: "snmp_requester::client",
                        { snmp.column = %column_base, snmp.oid = %next },
                        "column stopped advancing, ending it"
                    );
                    continue;
                }
                next_fetch.push(next, alias.as_deref());
                next_base.push(column_base, alias.as_deref());
            }
            fetch = next_fetch;
            base = next_base;
        }

        tracing::Span::current().record("snmp.rounds", rounds);
        Ok(result)
    }

    /// [`table`](Self::table) with no scalars and the configured max-repetitions.
    pub async fn fetch_table(&self, target: &str, oids: &OidList) -> Result<BulkTable> {
        self.table(target, oids, self.inner.config.max_repetitions, 0)
            .await
    }

    /// Send an arbitrary request PDU to `target` and wait for the reply.
    ///
    /// A request id of 0 is assigned by the client. An explicit id that is
    /// already in flight fails with [`Error::DuplicateRequestId`].
    pub async fn send_request_pdu(&self, target: &str, pdu: Pdu) -> Result<Pdu> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::transport("client shut down"));
        }
        let target = lock(&self.inner.targets)
            .get(target)
            .cloned()
            .ok_or_else(|| Error::UnknownTarget(target.into()).boxed())?;
        Counters::incr(&self.inner.counters.sent_requests);

        tracing::debug!(
            target: "snmp_requester::client",
            { snmp.target_id = %target.id, snmp.pdu_type = %pdu.pdu_type, snmp.varbind_count = pdu.varbinds.len() },
            "sending {} request",
            pdu.pdu_type
        );

        let version = lock(&target.context).version();
        let result = match version {
            Version::V3 => self.send_v3(&target, pdu).await,
            Version::V1 | Version::V2c => self.exchange_community(&target, pdu).await,
        };

        let observed = match &result {
            Ok(_) => Some(AgentReachability::Reachable),
            Err(err) => match **err {
                Error::Timeout { .. } => Some(AgentReachability::Unreachable),
                Error::Snmp { .. } | Error::Auth { .. } | Error::MalformedResponse { .. } => {
                    Some(AgentReachability::Reachable)
                }
                _ => None,
            },
        };
        if let Some(observed) = observed {
            *lock(&target.reachability) = observed;
        }

        if let Ok(response) = &result {
            tracing::debug!(
                target: "snmp_requester::client",
                { snmp.target_id = %target.id, snmp.varbind_count = response.varbinds.len() },
                "received {} response",
                response.pdu_type
            );
        }
        result
    }

    async fn exchange_community(&self, target: &Arc<Target>, pdu: Pdu) -> Result<Pdu> {
        self.exchange(target, pdu, |context, pdu| context.prepare_message(pdu, None))
            .await
    }

    async fn send_v3(&self, target: &Arc<Target>, pdu: Pdu) -> Result<Pdu> {
        if !lock(&target.context).is_engine_known() {
            let _discovering = target.discovery.lock().await;
            // Another caller may have finished discovery while we waited.
            if !lock(&target.context).is_engine_known() {
                self.discover(target).await?;
            }
        }

        let response = self.exchange_v3(target, pdu.clone()).await?;
        if classify_report(&response) != Some(AuthErrorKind::NotInTimeWindow) {
            return v3_outcome(target.address, response);
        }

        tracing::debug!(
            target: "snmp_requester::client",
            { snmp.target = %target.address },
            "not in time window, retrying once"
        );
        let retry = Pdu {
            request_id: 0,
            ..pdu
        };
        let response = self.exchange_v3(target, retry).await?;
        v3_outcome(target.address, response)
    }

    /// Learn the agent's engine id, boots and time with an empty unauthenticated GET.
    async fn discover(&self, target: &Arc<Target>) -> Result<()> {
        tracing::debug!(
            target: "snmp_requester::client",
            { snmp.target = %target.address },
            "discovering engine"
        );
        let slot = self.reserve_message_id(target);
        let msg_id = slot.msg_id;
        self.exchange(target, Pdu::get_request(0, &[]), move |context, pdu| {
            Ok(context.prepare_unauthenticated_message(pdu, msg_id))
        })
        .await?;
        drop(slot);

        if lock(&target.context).is_engine_known() {
            Ok(())
        } else {
            Err(Error::auth(
                target.address,
                AuthErrorKind::EngineDiscoveryFailed,
            ))
        }
    }

    async fn exchange_v3(&self, target: &Arc<Target>, pdu: Pdu) -> Result<Pdu> {
        let slot = self.reserve_message_id(target);
        let msg_id = slot.msg_id;
        let result = self
            .exchange(target, pdu, move |context, pdu| {
                context.prepare_message(pdu, Some(msg_id))
            })
            .await;
        drop(slot);
        result
    }

    fn reserve_message_id(&self, target: &Arc<Target>) -> MessageSlot<'_> {
        let msg_id = lock(&self.inner.messages).allocate(target);
        MessageSlot {
            table: &self.inner.messages,
            msg_id,
        }
    }

    /// Schedule `pdu`, encode it with `build` and send it; then wait for the reply.
    async fn exchange(
        &self,
        target: &Arc<Target>,
        mut pdu: Pdu,
        build: impl FnOnce(&mut SecurityContext, &Pdu) -> Result<Bytes>,
    ) -> Result<Pdu> {
        let handle = self.inner.correlator.schedule(&mut pdu, target.address)?;

        let encoded = {
            let mut context = lock(&target.context);
            build(&mut *context, &pdu)
        };
        let sent = match encoded {
            Ok(data) => self.transmit(target.address, data).await,
            Err(err) => Err(err),
        };
        if let Err(err) = sent {
            let _ = self.inner.correlator.complete(handle.request_id);
            return Err(err);
        }

        handle.wait().await
    }

    async fn transmit(&self, peer: SocketAddr, data: Bytes) -> Result<()> {
        let socket = self.inner.sockets.get_or_bind(peer, &self.inner)?;
        if let Some(trace) = &self.inner.trace {
            trace.record(Direction::Outgoing, peer, &data);
        }
        socket
            .send_to(&data, peer)
            .await
            .map_err(|source| Error::Network { target: peer, source }.boxed())?;
        Counters::incr(&self.inner.counters.sent_messages);
        Counters::add(&self.inner.counters.sent_bytes, data.len() as u64);
        tracing::trace!(
            target: "snmp_requester::client",
            { snmp.target = %peer, snmp.bytes = data.len() },
            "datagram sent"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("targets", &lock(&self.inner.targets).len())
            .field("pending", &self.inner.correlator.pending_count())
            .finish()
    }
}

/// Map a v3 reply to the caller's result. Reports become authentication errors.
fn v3_outcome(target: SocketAddr, response: Pdu) -> Result<Pdu> {
    if response.pdu_type != PduType::Report {
        return Ok(response);
    }
    match classify_report(&response) {
        Some(kind) => Err(Error::auth(target, kind)),
        None => {
            tracing::debug!(
                target: "snmp_requester::client",
                { snmp.target = %target, snmp.varbind_count = response.varbinds.len() },
                "report without a USM statistics varbind"
            );
            Err(Error::MalformedResponse { target }.boxed())
        }
    }
}
