//! Builder for [`Client`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::{Client, ClientConfig};
use crate::trace::PacketTrace;

/// Builder for [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use snmp_requester::{Client, TracingPacketTrace};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let client = Client::builder()
///     .request_timeout(Duration::from_secs(5))
///     .max_repetitions(25)
///     .trace(TracingPacketTrace)
///     .build();
/// # drop(client);
/// # }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    trace: Option<Arc<dyn PacketTrace>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the request timeout (default: 3 seconds).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Local address for the IPv4 socket (default: `0.0.0.0:0`).
    pub fn bind_v4(mut self, addr: SocketAddr) -> Self {
        self.config.bind_v4 = addr;
        self
    }

    /// Local address for the IPv6 socket (default: `[::]:0`).
    pub fn bind_v6(mut self, addr: SocketAddr) -> Self {
        self.config.bind_v6 = addr;
        self
    }

    /// Socket receive buffer size; 0 keeps the OS default (default: 65535).
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Max-repetitions for [`Client::fetch_table`] (default: 10).
    pub fn max_repetitions(mut self, max_repetitions: u32) -> Self {
        self.config.max_repetitions = max_repetitions;
        self
    }

    /// Hand every sent and received datagram to `trace`.
    pub fn trace(mut self, trace: impl PacketTrace) -> Self {
        self.trace = Some(Arc::new(trace));
        self
    }

    /// Build the client. Sockets are bound on first use, inside the caller's runtime.
    pub fn build(self) -> Client {
        Client::with_trace(self.config, self.trace)
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("trace", &self.trace.is_some())
            .finish()
    }
}
