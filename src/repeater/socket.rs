//! Socket lifecycle and the multiplexed readiness wait.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use futures_util::future::select_all;
use futures_util::FutureExt;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::info;

use super::error::{RepeaterError, RepeaterResult};

/// Receive buffer requested for every socket.
pub const RECV_BUFFER_SIZE: usize = 5 * 1024 * 1024;

/// Send buffer requested for transmitter sockets.
pub const SEND_BUFFER_SIZE: usize = 5 * 1024 * 1024;

/// Maximum theoretical UDP payload: 65535 - 20 (IP) - 8 (UDP).
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Hard ceiling on total open sockets (listeners + transmitters).
pub const MAX_SOCKETS: usize = 256;

/// The logical role that owns a socket.
///
/// A socket is tagged with a listener id or as a transmitter, never both.
/// Transmitter sockets sit in the wait set only so errors surface; datagrams
/// received on them carry no routing meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketTag {
    /// Bound listening socket with its routing id.
    Listener(u32),
    /// Outbound-only socket.
    Transmitter,
}

struct PoolEntry {
    socket: Arc<UdpSocket>,
    tag: SocketTag,
}

/// Owns every socket in the process and exposes the blocking readiness wait.
#[derive(Default)]
pub struct SocketPool {
    entries: Vec<PoolEntry>,
}

impl std::fmt::Debug for SocketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketPool")
            .field("sockets", &self.entries.len())
            .finish()
    }
}

impl SocketPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a listening socket bound to `address:port` and tag it with the
    /// listener id. The port is required and must lie strictly between 1024
    /// and 65536.
    ///
    /// # Errors
    ///
    /// Returns an error on a bad port, socket creation/bind failure, or a
    /// full pool. All are fatal at startup.
    pub fn add_listener(&mut self, id: u32, address: Ipv4Addr, port: u16) -> RepeaterResult<()> {
        if port <= 1024 {
            return Err(RepeaterError::InvalidPort { port });
        }
        let socket = self.open(address, port)?;

        // Log what the kernel actually granted, not what we asked for.
        if let Ok(granted) = socket2::SockRef::from(socket.as_ref()).recv_buffer_size() {
            info!(
                listener = id,
                address = %SocketAddrV4::new(address, port),
                recv_buffer = granted,
                "listener socket bound"
            );
        }

        self.entries.push(PoolEntry {
            socket,
            tag: SocketTag::Listener(id),
        });
        Ok(())
    }

    /// Open a transmitter socket, bound only if address or port is nonzero,
    /// with its send buffer raised. Returns the socket handle for the
    /// registry record.
    ///
    /// # Errors
    ///
    /// Returns an error on a bad port, socket creation/bind failure, or a
    /// full pool. All are fatal at startup.
    pub fn add_transmitter(
        &mut self,
        address: Ipv4Addr,
        port: u16,
    ) -> RepeaterResult<Arc<UdpSocket>> {
        if port != 0 && port <= 1024 {
            return Err(RepeaterError::InvalidPort { port });
        }
        let socket = self.open(address, port)?;

        let sock_ref = socket2::SockRef::from(socket.as_ref());
        sock_ref
            .set_send_buffer_size(SEND_BUFFER_SIZE)
            .map_err(RepeaterError::OpenError)?;
        if let Ok(granted) = sock_ref.send_buffer_size() {
            info!(
                address = %SocketAddrV4::new(address, port),
                send_buffer = granted,
                "transmitter socket opened"
            );
        }

        self.entries.push(PoolEntry {
            socket: Arc::clone(&socket),
            tag: SocketTag::Transmitter,
        });
        Ok(socket)
    }

    /// Create a non-blocking UDP socket with address reuse and a large
    /// receive buffer, binding it only if the address or port is nonzero.
    fn open(&self, address: Ipv4Addr, port: u16) -> RepeaterResult<Arc<UdpSocket>> {
        if self.entries.len() >= MAX_SOCKETS {
            return Err(RepeaterError::SocketLimit { limit: MAX_SOCKETS });
        }

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(RepeaterError::OpenError)?;
        socket
            .set_reuse_address(true)
            .map_err(RepeaterError::OpenError)?;
        socket
            .set_recv_buffer_size(RECV_BUFFER_SIZE)
            .map_err(RepeaterError::OpenError)?;
        socket
            .set_nonblocking(true)
            .map_err(RepeaterError::OpenError)?;

        if address != Ipv4Addr::UNSPECIFIED || port != 0 {
            let bind_addr = SocketAddrV4::new(address, port);
            socket
                .bind(&bind_addr.into())
                .map_err(|e| RepeaterError::BindError {
                    address: bind_addr,
                    source: e,
                })?;
        }

        let socket = UdpSocket::from_std(socket.into()).map_err(RepeaterError::OpenError)?;
        Ok(Arc::new(socket))
    }

    /// The socket and tag at a pool index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; callers only pass indices obtained
    /// from [`SocketPool::wait_ready`].
    #[must_use]
    pub fn entry(&self, index: usize) -> (&UdpSocket, SocketTag) {
        let entry = &self.entries[index];
        (&entry.socket, entry.tag)
    }

    /// Listener ids currently tagged in the pool, in creation order.
    #[must_use]
    pub fn listener_ids(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter_map(|e| match e.tag {
                SocketTag::Listener(id) => Some(id),
                SocketTag::Transmitter => None,
            })
            .collect()
    }

    /// Number of sockets in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no sockets have been opened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Block, with no timeout, until at least one socket has data to
    /// receive, then report the complete set of ready pool indices. The
    /// caller never needs to poll sockets not reported ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the readiness primitive itself fails; this is an
    /// unrecoverable OS condition.
    pub async fn wait_ready(&self) -> RepeaterResult<Vec<usize>> {
        let waits: Vec<_> = self
            .entries
            .iter()
            .map(|e| Box::pin(e.socket.readable()))
            .collect();
        let (first, first_index, _) = select_all(waits).await;
        first.map_err(RepeaterError::WaitError)?;

        let mut ready = vec![first_index];
        for (index, entry) in self.entries.iter().enumerate() {
            if index == first_index {
                continue;
            }
            if let Some(result) = entry.socket.readable().now_or_never() {
                result.map_err(RepeaterError::WaitError)?;
                ready.push(index);
            }
        }
        ready.sort_unstable();
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn free_port() -> u16 {
        // Bind an ephemeral port, note it, release it for the test to use.
        let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_listener_port_range_enforced() {
        let mut pool = SocketPool::new();
        let result = pool.add_listener(1, Ipv4Addr::LOCALHOST, 1024);
        assert!(matches!(
            result,
            Err(RepeaterError::InvalidPort { port: 1024 })
        ));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_listener_tagged_with_id() {
        let mut pool = SocketPool::new();
        pool.add_listener(7, Ipv4Addr::LOCALHOST, free_port())
            .unwrap();

        assert_eq!(pool.len(), 1);
        let (_, tag) = pool.entry(0);
        assert_eq!(tag, SocketTag::Listener(7));
        assert_eq!(pool.listener_ids(), vec![7]);
    }

    #[tokio::test]
    async fn test_unbound_transmitter_has_no_local_port_until_used() {
        let mut pool = SocketPool::new();
        let socket = pool
            .add_transmitter(Ipv4Addr::UNSPECIFIED, 0)
            .unwrap();

        let (_, tag) = pool.entry(0);
        assert_eq!(tag, SocketTag::Transmitter);
        // Unbound socket: the OS assigns a port at first send.
        assert!(socket.local_addr().is_err() || socket.local_addr().unwrap().port() == 0);
    }

    #[tokio::test]
    async fn test_bound_transmitter_uses_requested_port() {
        let port = free_port();
        let mut pool = SocketPool::new();
        let socket = pool.add_transmitter(Ipv4Addr::LOCALHOST, port).unwrap();
        assert_eq!(socket.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_socket_ceiling_enforced() {
        let mut pool = SocketPool::new();
        for _ in 0..MAX_SOCKETS {
            pool.add_transmitter(Ipv4Addr::UNSPECIFIED, 0).unwrap();
        }
        assert_eq!(pool.len(), MAX_SOCKETS);

        let result = pool.add_transmitter(Ipv4Addr::UNSPECIFIED, 0);
        assert!(matches!(
            result,
            Err(RepeaterError::SocketLimit { limit: MAX_SOCKETS })
        ));
        let result = pool.add_listener(1, Ipv4Addr::LOCALHOST, free_port());
        assert!(matches!(result, Err(RepeaterError::SocketLimit { .. })));
        assert_eq!(pool.len(), MAX_SOCKETS);
    }

    #[tokio::test]
    async fn test_wait_ready_reports_only_ready_sockets() {
        let mut pool = SocketPool::new();
        let quiet_port = free_port();
        let busy_port = free_port();
        pool.add_listener(1, Ipv4Addr::LOCALHOST, quiet_port)
            .unwrap();
        pool.add_listener(2, Ipv4Addr::LOCALHOST, busy_port).unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"ping", (Ipv4Addr::LOCALHOST, busy_port))
            .await
            .unwrap();

        let ready = tokio::time::timeout(Duration::from_secs(1), pool.wait_ready())
            .await
            .expect("wait_ready should wake")
            .unwrap();
        assert_eq!(ready, vec![1]);
    }

    #[tokio::test]
    async fn test_wait_ready_reports_full_ready_set() {
        let mut pool = SocketPool::new();
        let port_a = free_port();
        let port_b = free_port();
        pool.add_listener(1, Ipv4Addr::LOCALHOST, port_a).unwrap();
        pool.add_listener(2, Ipv4Addr::LOCALHOST, port_b).unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"a", (Ipv4Addr::LOCALHOST, port_a))
            .await
            .unwrap();
        sender
            .send_to(b"b", (Ipv4Addr::LOCALHOST, port_b))
            .await
            .unwrap();

        // Give the kernel a moment to queue both datagrams.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let ready = tokio::time::timeout(Duration::from_secs(1), pool.wait_ready())
            .await
            .expect("wait_ready should wake")
            .unwrap();
        assert_eq!(ready, vec![0, 1]);
    }
}
