use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::core::{Config, Error, Result};
use super::Transport;

/// UDP/IPv6 socket bound to the node port and joined to the multicast group
pub struct MulticastSocket {
    socket: UdpSocket,
    group: Ipv6Addr,
}

impl MulticastSocket {
    /// Binds `[::]:port`, joins the multicast group and switches to non-blocking mode.
    ///
    /// Failing to join the group or set the hop limit only costs the
    /// broadcast path, so those are logged instead of returned.
    pub fn bind(config: &Config) -> Result<Self> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Error::network(format!("Failed to create socket: {}", e)))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;

        let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, config.bind_port, 0, 0);
        socket
            .bind(&SockAddr::from(bind_addr))
            .map_err(|e| Error::network(format!("Failed to bind socket: {}", e)))?;

        if let Err(e) = socket.set_multicast_hops_v6(config.multicast_hops) {
            warn!(hops = config.multicast_hops, "could not set multicast hop limit: {}", e);
        }
        if let Err(e) = socket.join_multicast_v6(&config.multicast_group, 0) {
            warn!(group = %config.multicast_group, "could not join multicast group: {}", e);
        }

        let std_sock: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_sock)?;
        info!(port = config.bind_port, group = %config.multicast_group, "socket ready");

        Ok(MulticastSocket {
            socket,
            group: config.multicast_group,
        })
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }

    pub fn group(&self) -> Ipv6Addr {
        self.group
    }
}

impl Transport for MulticastSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        self.socket
            .send_to(buf, target)
            .await
            .map_err(|e| Error::network(format!("Failed to send to {}: {}", target, e)))
    }

    async fn readable(&self) -> Result<()> {
        self.socket.readable().await?;
        Ok(())
    }

    fn try_receive_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.try_recv_from(buf) {
            Ok((len, from)) => Ok(Some((len, from))),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::network(format!("Failed to receive: {}", e))),
        }
    }
}
