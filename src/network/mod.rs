//! Network transport module
//!
//! The node talks to the network only through [`Transport`]: a datagram
//! socket that can send, signal readiness and be drained without blocking.

mod connection;

pub use self::connection::MulticastSocket;

use std::net::SocketAddr;

use crate::core::Result;

/// Datagram transport used by the node executor
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends one datagram
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;

    /// Resolves once inbound data may be available
    async fn readable(&self) -> Result<()>;

    /// Takes one datagram without blocking; `None` means it would block
    fn try_receive_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;
}
