//! Socket Entity
//!
//! The blocking TCP socket: one OS descriptor, driven by one logical owner
//! through init, bind/listen/accept or connect, timed send/recv, and close.
//! Timed I/O is two-phase: a readiness wait on the descriptor (bounded by the
//! configured deadline, restarted on signal interruption), then a transfer
//! loop that repeats the syscall until the requested length is consumed.
//!
//! The descriptor is exclusively owned. Dropping the entity releases it;
//! `close` is explicit and idempotent, and a closed entity may be
//! re-initialized.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::time::Duration;

use log::{error, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::socket::{self as sys, MsgFlags};
use socket2::{Domain, Protocol, SockAddr, Socket as SysSocket, Type};

use entities_error_handling::{SocketError, SocketResult};

use crate::addr::resolve_host;
use crate::config::SocketConfig;

/// Transfer direction, selects the readiness condition waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Send,
    Recv,
}

fn unspecified() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)
}

fn to_v4(addr: &SockAddr) -> Option<SocketAddrV4> {
    match addr.as_socket() {
        Some(SocketAddr::V4(v4)) => Some(v4),
        _ => None,
    }
}

/// Flags carried by every send so a broken pipe surfaces as an error
/// instead of a fatal signal.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn send_flags() -> MsgFlags {
    MsgFlags::MSG_NOSIGNAL
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn send_flags() -> MsgFlags {
    MsgFlags::empty()
}

fn apply_receive_timeout(sock: &SysSocket, timeout_millis: i32) {
    let timeout = if timeout_millis > 0 {
        Some(Duration::from_millis(timeout_millis as u64))
    } else {
        None
    };
    if let Err(e) = sock.set_read_timeout(timeout) {
        warn!("failed to set SO_RCVTIMEO: {e}");
    }
}

/// Blocking TCP socket with timed, readiness-driven I/O.
///
/// Construction modes: [`Socket::new`]/[`Default`] (no binding),
/// [`Socket::listener`], [`Socket::connector`], and the unsafe
/// [`Socket::from_raw_fd`] for wrapping an already-accepted descriptor.
#[derive(Debug)]
pub struct Socket {
    inner: Option<SysSocket>,
    local_addr: SocketAddrV4,
    peer_addr: SocketAddrV4,
    config: SocketConfig,
}

impl Default for Socket {
    fn default() -> Self {
        Self::new(SocketConfig::default())
    }
}

impl Socket {
    /// Create an unbound, uninitialized socket with the given configuration.
    pub fn new(config: SocketConfig) -> Self {
        Self {
            inner: None,
            local_addr: unspecified(),
            peer_addr: unspecified(),
            config,
        }
    }

    /// Create a socket configured to listen on the wildcard address.
    ///
    /// # Arguments
    ///
    /// * `port` - Local port to bind (0 picks an ephemeral port)
    /// * `timeout_millis` - Deadline for readiness waits; negative waits
    ///   indefinitely
    pub fn listener(port: u16, timeout_millis: i32) -> Self {
        let mut socket = Self::new(SocketConfig::with_timeout(timeout_millis));
        socket.set_listen_addr(port);
        socket
    }

    /// Create a socket configured to connect to a remote endpoint.
    ///
    /// # Arguments
    ///
    /// * `hostname` - Hostname or dotted-decimal literal
    /// * `port` - Remote port
    /// * `timeout_millis` - Deadline for connect and readiness waits
    ///
    /// # Returns
    ///
    /// * `Ok(Socket)` - Peer address resolved and stored
    /// * `Err(SocketError)` - *invalid-argument* when the hostname does not
    ///   resolve
    pub fn connector(hostname: &str, port: u16, timeout_millis: i32) -> SocketResult<Self> {
        let mut socket = Self::new(SocketConfig::with_timeout(timeout_millis));
        socket.set_peer(hostname, port)?;
        Ok(socket)
    }

    /// Wrap an already-connected descriptor, e.g. one accepted by other code.
    ///
    /// The local and peer addresses are read back from the kernel; the
    /// receive timeout is applied to the descriptor.
    ///
    /// # Safety
    ///
    /// `fd` must be an open TCP socket descriptor owned by the caller; the
    /// returned entity takes exclusive ownership and will close it.
    pub unsafe fn from_raw_fd(fd: RawFd, timeout_millis: i32) -> SocketResult<Self> {
        let sock = SysSocket::from_raw_fd(fd);
        let local = match sock.local_addr() {
            Ok(addr) => match to_v4(&addr) {
                Some(v4) => v4,
                None => {
                    return Err(SocketError::network(
                        "wrapped descriptor is not an IPv4 socket",
                    ))
                }
            },
            Err(e) => {
                error!("failed to get socket name: {e}");
                return Err(SocketError::network(format!("getsockname failed: {e}")));
            }
        };
        let peer = match sock.peer_addr() {
            Ok(addr) => to_v4(&addr).unwrap_or_else(unspecified),
            Err(e) => {
                warn!("failed to get peer name: {e}");
                unspecified()
            }
        };
        apply_receive_timeout(&sock, timeout_millis);
        Ok(Self {
            inner: Some(sock),
            local_addr: local,
            peer_addr: peer,
            config: SocketConfig::with_timeout(timeout_millis),
        })
    }

    /// Whether a live descriptor exists.
    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// The stored local address.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    /// The stored peer address.
    pub fn peer_addr(&self) -> SocketAddrV4 {
        self.peer_addr
    }

    /// The stored local port.
    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// The stored peer port.
    pub fn peer_port(&self) -> u16 {
        self.peer_addr.port()
    }

    /// The active configuration.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Store the wildcard listen address for the given port.
    pub fn set_listen_addr(&mut self, port: u16) {
        self.local_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    }

    /// Resolve and store a new peer address, clearing any previous one.
    /// Safe to call before every fresh `connect`.
    pub fn set_peer(&mut self, hostname: &str, port: u16) -> SocketResult<()> {
        self.peer_addr = unspecified();
        let ip = resolve_host(hostname)?;
        self.peer_addr = SocketAddrV4::new(ip, port);
        Ok(())
    }

    /// Reconfigure the deadline, re-applying the kernel receive timeout when
    /// a descriptor is live.
    pub fn set_timeout(&mut self, timeout_millis: i32) {
        self.config.timeout_millis = timeout_millis;
        if let Some(sock) = self.inner.as_ref() {
            apply_receive_timeout(sock, timeout_millis);
        }
    }

    /// Create and configure the descriptor. No-op when one already exists.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Descriptor live (created now or previously)
    /// * `Err(SocketError)` - *network* when descriptor creation fails
    pub fn init(&mut self) -> SocketResult<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        let sock = SysSocket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(
            |e| {
                error!("failed to initialize socket: {e}");
                SocketError::network(format!("socket creation failed: {e}"))
            },
        )?;
        apply_receive_timeout(&sock, self.config.timeout_millis);
        if self.config.keepalive {
            if let Err(e) = sock.set_keepalive(true) {
                warn!("failed to set SO_KEEPALIVE: {e}");
            }
        }
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        if let Err(e) = sock.set_nosigpipe(true) {
            warn!("failed to set SO_NOSIGPIPE: {e}");
        }
        self.inner = Some(sock);
        Ok(())
    }

    /// Release the descriptor. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// Bind the stored local address and start listening.
    ///
    /// Reuse-address and linger are applied best-effort; bind or listen
    /// failing closes the descriptor so no half-configured listener
    /// survives. On success the effective local address is re-read from the
    /// kernel.
    pub fn bind_and_listen(&mut self) -> SocketResult<()> {
        match self.try_bind_and_listen() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn try_bind_and_listen(&mut self) -> SocketResult<()> {
        let Some(sock) = self.inner.as_ref() else {
            return Err(SocketError::invalid_argument("socket is not initialized"));
        };
        if let Err(e) = sock.set_reuse_address(true) {
            warn!("failed to set SO_REUSEADDR: {e}");
        }
        if let Err(e) = sock.set_linger(self.config.linger) {
            warn!("failed to set SO_LINGER: {e}");
        }
        sock.bind(&SockAddr::from(self.local_addr)).map_err(|e| {
            error!("failed to bind {}: {e}", self.local_addr);
            SocketError::network(format!("bind failed: {e}"))
        })?;
        sock.listen(self.config.backlog).map_err(|e| {
            error!("failed to listen on {}: {e}", self.local_addr);
            SocketError::network(format!("listen failed: {e}"))
        })?;
        if let Some(bound) = sock.local_addr().ok().and_then(|a| to_v4(&a)) {
            self.local_addr = bound;
        }
        Ok(())
    }

    /// Connect to the stored peer address.
    ///
    /// Always yields an explicit outcome: success, *timeout* (the configured
    /// deadline elapsed), or *network* (refusal, reset, unreachable). A
    /// positive deadline bounds the attempt; otherwise the call blocks until
    /// the kernel decides. Any failure closes the descriptor, leaving the
    /// entity reinitializable. On success the local and peer addresses are
    /// refreshed from the kernel.
    pub fn connect(&mut self) -> SocketResult<()> {
        match self.try_connect() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn try_connect(&mut self) -> SocketResult<()> {
        if self.peer_addr.ip().is_unspecified() || self.peer_addr.port() == 0 {
            return Err(SocketError::invalid_argument(
                "peer address is not configured",
            ));
        }
        let Some(sock) = self.inner.as_ref() else {
            return Err(SocketError::invalid_argument("socket is not initialized"));
        };
        let target = SockAddr::from(self.peer_addr);
        let outcome = if self.config.timeout_millis > 0 {
            sock.connect_timeout(
                &target,
                Duration::from_millis(self.config.timeout_millis as u64),
            )
        } else {
            sock.connect(&target)
        };
        if let Err(e) = outcome {
            return Err(if e.kind() == io::ErrorKind::TimedOut {
                error!("connect to {} timed out", self.peer_addr);
                SocketError::timeout()
            } else {
                error!("failed to connect to {}: {e}", self.peer_addr);
                SocketError::network(format!("connect failed: {e}"))
            });
        }
        if let Some(local) = sock.local_addr().ok().and_then(|a| to_v4(&a)) {
            self.local_addr = local;
        }
        if let Some(peer) = sock.peer_addr().ok().and_then(|a| to_v4(&a)) {
            self.peer_addr = peer;
        }
        Ok(())
    }

    /// Wait for an incoming connection and wrap it as a fresh socket.
    ///
    /// # Returns
    ///
    /// * `Ok(Socket)` - Accepted connection, configuration inherited from
    ///   the listener, peer address populated
    /// * `Err(SocketError)` - *timeout* when nothing arrives in time (the
    ///   listener stays open); *network* on a kernel-level accept failure
    ///   (the listener is closed)
    pub fn accept(&mut self) -> SocketResult<Socket> {
        self.wait_ready(Direction::Recv)?;
        let accepted = {
            let Some(sock) = self.inner.as_ref() else {
                return Err(SocketError::invalid_argument("socket is not initialized"));
            };
            sock.accept()
        };
        let (conn, addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                error!("accept failed: {e}");
                self.close();
                return Err(SocketError::network(format!("accept failed: {e}")));
            }
        };
        apply_receive_timeout(&conn, self.config.timeout_millis);
        let local = conn
            .local_addr()
            .ok()
            .and_then(|a| to_v4(&a))
            .unwrap_or(self.local_addr);
        let peer = to_v4(&addr).unwrap_or_else(unspecified);
        Ok(Socket {
            inner: Some(conn),
            local_addr: local,
            peer_addr: peer,
            config: self.config.clone(),
        })
    }

    /// Send small writes immediately instead of coalescing them.
    pub fn disable_nagle(&mut self) -> SocketResult<()> {
        let sock = self.descriptor()?;
        sock.set_nodelay(true).map_err(|e| {
            warn!("failed to set TCP_NODELAY: {e}");
            SocketError::network(format!("TCP_NODELAY failed: {e}"))
        })
    }

    /// Control whether close blocks to flush outstanding data.
    ///
    /// # Arguments
    ///
    /// * `on` - Enable or disable lingering
    /// * `grace` - Flush grace period when enabled
    pub fn set_linger(&mut self, on: bool, grace: Duration) -> SocketResult<()> {
        let sock = self.descriptor()?;
        let linger = if on { Some(grace) } else { None };
        sock.set_linger(linger).map_err(|e| {
            warn!("failed to set SO_LINGER: {e}");
            SocketError::network(format!("SO_LINGER failed: {e}"))
        })
    }

    /// Best-effort liveness probe: a zero-length send issued directly at the
    /// descriptor. Any error means "not connected". TCP offers no stronger
    /// synchronous check.
    pub fn is_connected(&self) -> bool {
        match self.inner.as_ref() {
            Some(sock) => sys::send(sock.as_raw_fd(), &[] as &[u8], send_flags()).is_ok(),
            None => false,
        }
    }

    /// Send the whole buffer.
    ///
    /// Two-phase: wait for write readiness (bounded by the configured
    /// deadline), then repeat the transfer syscall until every byte is
    /// consumed. An empty buffer succeeds without a syscall.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - All `buf.len()` bytes sent
    /// * `Err(SocketError)` - *timeout* (descriptor untouched and still
    ///   usable) or *network*; `transferred()` on the error reports the
    ///   bytes that went out before the failure
    pub fn send(&mut self, buf: &[u8]) -> SocketResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.wait_ready(Direction::Send)?;
        let fd = self.descriptor()?.as_raw_fd();
        let mut sent = 0;
        let mut retries = 0;
        while sent < buf.len() {
            match sys::send(fd, &buf[sent..], send_flags()) {
                Ok(n) => sent += n,
                Err(Errno::EINTR) if retries < self.config.transfer_retries => retries += 1,
                Err(Errno::EAGAIN) if self.config.timeout_millis > 0 => {
                    error!("send would block after readiness was reported");
                    return Err(SocketError::network_after(
                        "send would block after readiness",
                        sent,
                    ));
                }
                Err(e) => {
                    error!("send failed: {e}");
                    return Err(SocketError::network_after(format!("send failed: {e}"), sent));
                }
            }
        }
        Ok(sent)
    }

    /// Receive exactly `buf.len()` bytes.
    ///
    /// Two-phase like [`Socket::send`]. A peer performing an orderly
    /// shutdown mid-transfer yields *peer-closed* with the byte count
    /// already collected recorded on the error. An empty buffer succeeds
    /// without a syscall.
    pub fn recv(&mut self, buf: &mut [u8]) -> SocketResult<usize> {
        self.recv_with_flags(buf, MsgFlags::empty())
    }

    /// Inspect incoming data without consuming it.
    ///
    /// Completes after the first successful peek regardless of how much was
    /// peeked; it answers "is data available and what does it look like",
    /// not "fill this buffer".
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Bytes peeked (at least 1 for a non-empty buffer)
    /// * `Err(SocketError)` - Same taxonomy as [`Socket::recv`]
    pub fn recv_peek(&mut self, buf: &mut [u8]) -> SocketResult<usize> {
        self.recv_with_flags(buf, MsgFlags::MSG_PEEK)
    }

    fn recv_with_flags(&mut self, buf: &mut [u8], flags: MsgFlags) -> SocketResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.wait_ready(Direction::Recv)?;
        let fd = self.descriptor()?.as_raw_fd();
        let peek = flags.contains(MsgFlags::MSG_PEEK);
        let mut received = 0;
        let mut retries = 0;
        while received < buf.len() {
            match sys::recv(fd, &mut buf[received..], flags) {
                Ok(0) => {
                    warn!(
                        "peer closed the connection after {received} of {} bytes",
                        buf.len()
                    );
                    return Err(SocketError::peer_closed(received));
                }
                Ok(n) => {
                    if peek {
                        return Ok(n);
                    }
                    received += n;
                }
                Err(Errno::EINTR) if retries < self.config.transfer_retries => retries += 1,
                Err(Errno::EAGAIN) if self.config.timeout_millis > 0 => {
                    // readiness was reported, so the descriptor-level timeout
                    // firing here is a race, not a deadline
                    warn!("recv would block after readiness was reported");
                    return Err(SocketError::network_after(
                        "recv would block after readiness",
                        received,
                    ));
                }
                Err(e) => {
                    error!("recv failed: {e}");
                    return Err(SocketError::network_after(
                        format!("recv failed: {e}"),
                        received,
                    ));
                }
            }
        }
        Ok(received)
    }

    /// Phase 1 of timed I/O: block until the descriptor is ready in the
    /// given direction. A signal-interrupted wait restarts with a fresh
    /// slice; zero ready descriptors is a *timeout* and leaves the
    /// descriptor open.
    fn wait_ready(&self, dir: Direction) -> SocketResult<()> {
        let sock = self.descriptor()?;
        let events = match dir {
            Direction::Send => PollFlags::POLLOUT,
            Direction::Recv => PollFlags::POLLIN,
        };
        let timeout = if self.config.timeout_millis >= 0 {
            self.config.timeout_millis
        } else {
            -1
        };
        loop {
            let mut fds = [PollFd::new(sock, events)];
            match poll(&mut fds, timeout) {
                Ok(0) => return Err(SocketError::timeout()),
                Ok(_) => {
                    // error/hangup readiness falls through to the transfer,
                    // which surfaces the actual condition
                    let ready = fds[0].revents().map_or(false, |r| {
                        r.intersects(events | PollFlags::POLLERR | PollFlags::POLLHUP)
                    });
                    if ready {
                        return Ok(());
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!("poll failed: {e}");
                    return Err(SocketError::network(format!("poll failed: {e}")));
                }
            }
        }
    }

    fn descriptor(&self) -> SocketResult<&SysSocket> {
        self.inner
            .as_ref()
            .ok_or_else(|| SocketError::invalid_argument("socket is not initialized"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_error_handling::SocketErrorKind;

    #[test]
    fn test_default_socket_is_uninitialized() {
        let socket = Socket::default();
        assert!(!socket.is_initialized());
        assert_eq!(socket.local_addr(), unspecified());
        assert_eq!(socket.peer_addr(), unspecified());
    }

    #[test]
    fn test_listener_stores_wildcard_address() {
        let socket = Socket::listener(7700, 5000);
        assert_eq!(socket.local_addr().ip(), &Ipv4Addr::UNSPECIFIED);
        assert_eq!(socket.local_port(), 7700);
        assert_eq!(socket.config().timeout_millis, 5000);
    }

    #[test]
    fn test_connector_resolves_peer() {
        let socket = Socket::connector("127.0.0.1", 9000, 5000).unwrap();
        assert_eq!(socket.peer_addr().ip(), &Ipv4Addr::LOCALHOST);
        assert_eq!(socket.peer_port(), 9000);
    }

    #[test]
    fn test_connector_rejects_bad_hostname() {
        let err = Socket::connector("host.invalid", 9000, 5000).unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut socket = Socket::default();
        socket.init().unwrap();
        assert!(socket.is_initialized());
        socket.init().unwrap();
        assert!(socket.is_initialized());
    }

    #[test]
    fn test_close_is_idempotent_and_reinit_works() {
        let mut socket = Socket::default();
        socket.init().unwrap();
        socket.close();
        assert!(!socket.is_initialized());
        socket.close();
        assert!(!socket.is_initialized());
        socket.init().unwrap();
        assert!(socket.is_initialized());
    }

    #[test]
    fn test_zero_length_transfers_succeed_without_descriptor() {
        let mut socket = Socket::default();
        assert_eq!(socket.send(&[]).unwrap(), 0);
        assert_eq!(socket.recv(&mut []).unwrap(), 0);
    }

    #[test]
    fn test_transfer_on_uninitialized_socket_is_invalid_argument() {
        let mut socket = Socket::default();
        let err = socket.send(b"data").unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);

        let mut buf = [0u8; 4];
        let err = socket.recv(&mut buf).unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);
    }

    #[test]
    fn test_bind_and_listen_requires_init() {
        let mut socket = Socket::listener(0, 5000);
        let err = socket.bind_and_listen().unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);
    }

    #[test]
    fn test_connect_requires_peer_address() {
        let mut socket = Socket::default();
        socket.init().unwrap();
        let err = socket.connect().unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);
    }

    #[test]
    fn test_bind_and_listen_learns_ephemeral_port() {
        let mut socket = Socket::listener(0, 5000);
        socket.init().unwrap();
        socket.bind_and_listen().unwrap();
        assert!(socket.local_port() > 0);
    }

    #[test]
    fn test_set_peer_clears_previous_address() {
        let mut socket = Socket::connector("127.0.0.1", 9000, 5000).unwrap();
        socket.set_peer("10.0.0.1", 9100).unwrap();
        assert_eq!(socket.peer_addr().ip(), &Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(socket.peer_port(), 9100);
    }

    #[test]
    fn test_set_timeout_updates_config() {
        let mut socket = Socket::default();
        socket.set_timeout(250);
        assert_eq!(socket.config().timeout_millis, 250);
        socket.init().unwrap();
        socket.set_timeout(750);
        assert_eq!(socket.config().timeout_millis, 750);
    }

    #[test]
    fn test_option_setters_require_descriptor() {
        let mut socket = Socket::default();
        let err = socket.disable_nagle().unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);

        socket.init().unwrap();
        socket.disable_nagle().unwrap();
        socket.set_linger(true, Duration::from_secs(5)).unwrap();
        socket.set_linger(false, Duration::ZERO).unwrap();
    }

    #[test]
    fn test_is_connected_false_without_connection() {
        let socket = Socket::default();
        assert!(!socket.is_connected());
    }
}
