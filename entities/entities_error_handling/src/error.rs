//! Socket Error Taxonomy
//!
//! Every fallible socket operation reports its outcome through this module.
//! The taxonomy is deliberately coarse: callers branch on [`SocketErrorKind`]
//! (or the matching integer status code), while the free-form detail string
//! exists for diagnostics only and is not part of the stable contract.

use std::fmt;
use std::io;

/// Status code for a successful operation.
pub const SOCKET_OK: i32 = 0;
/// Status code for a non-socket file I/O failure.
pub const STATUS_IO: i32 = -1;
/// Status code for malformed configuration caught before any syscall.
pub const STATUS_INVALID_ARGUMENT: i32 = -2;
/// Status code for descriptor, bind, listen, connect, accept, or transfer
/// failures not otherwise classified.
pub const STATUS_NETWORK: i32 = -3;
/// Status code for a readiness wait that exceeded its deadline.
pub const STATUS_TIMEOUT: i32 = -4;
/// Status code for an orderly peer shutdown observed mid-receive.
pub const STATUS_PEER_CLOSED: i32 = -5;

/// Result alias used throughout the socket layers.
pub type SocketResult<T> = Result<T, SocketError>;

/// The five failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketErrorKind {
    /// Non-socket file operation failure
    Io,
    /// Malformed configuration, caught before any syscall
    InvalidArgument,
    /// OS-level socket failure
    Network,
    /// Readiness wait exceeded the deadline
    Timeout,
    /// Orderly peer shutdown detected mid-receive
    PeerClosed,
}

impl SocketErrorKind {
    /// Stable integer status code for this kind.
    pub const fn code(self) -> i32 {
        match self {
            SocketErrorKind::Io => STATUS_IO,
            SocketErrorKind::InvalidArgument => STATUS_INVALID_ARGUMENT,
            SocketErrorKind::Network => STATUS_NETWORK,
            SocketErrorKind::Timeout => STATUS_TIMEOUT,
            SocketErrorKind::PeerClosed => STATUS_PEER_CLOSED,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            SocketErrorKind::Io => "I/O failure",
            SocketErrorKind::InvalidArgument => "invalid argument",
            SocketErrorKind::Network => "network failure",
            SocketErrorKind::Timeout => "operation timed out",
            SocketErrorKind::PeerClosed => "peer closed the connection",
        }
    }
}

/// Error value returned by socket operations.
///
/// Partial transfers are not rolled back; `transferred()` reports how many
/// bytes moved before the failure so callers can resume or discard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketError {
    kind: SocketErrorKind,
    detail: Option<String>,
    transferred: usize,
}

impl SocketError {
    /// Create an error of the given kind with no detail.
    pub fn new(kind: SocketErrorKind) -> Self {
        Self {
            kind,
            detail: None,
            transferred: 0,
        }
    }

    /// Create an error of the given kind with a diagnostic detail string.
    pub fn with_detail(kind: SocketErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
            transferred: 0,
        }
    }

    /// An *invalid-argument* error.
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::with_detail(SocketErrorKind::InvalidArgument, detail)
    }

    /// A *network* error.
    pub fn network(detail: impl Into<String>) -> Self {
        Self::with_detail(SocketErrorKind::Network, detail)
    }

    /// A *network* error recording the bytes transferred before the failure.
    pub fn network_after(detail: impl Into<String>, transferred: usize) -> Self {
        Self {
            kind: SocketErrorKind::Network,
            detail: Some(detail.into()),
            transferred,
        }
    }

    /// A *timeout* error.
    pub fn timeout() -> Self {
        Self::new(SocketErrorKind::Timeout)
    }

    /// A *peer-closed* error recording the bytes transferred before the
    /// shutdown was observed.
    pub fn peer_closed(transferred: usize) -> Self {
        Self {
            kind: SocketErrorKind::PeerClosed,
            detail: None,
            transferred,
        }
    }

    /// The failure class.
    pub fn kind(&self) -> SocketErrorKind {
        self.kind
    }

    /// The stable integer status code.
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    /// Bytes moved before the failure. Zero for non-transfer operations.
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// Diagnostic detail, when one was recorded. Not a stable contract.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.kind.as_str(), detail),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl std::error::Error for SocketError {}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut => SocketErrorKind::Timeout,
            io::ErrorKind::InvalidInput => SocketErrorKind::InvalidArgument,
            _ => SocketErrorKind::Network,
        };
        Self::with_detail(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(SOCKET_OK, 0);
        assert_eq!(SocketErrorKind::Io.code(), -1);
        assert_eq!(SocketErrorKind::InvalidArgument.code(), -2);
        assert_eq!(SocketErrorKind::Network.code(), -3);
        assert_eq!(SocketErrorKind::Timeout.code(), -4);
        assert_eq!(SocketErrorKind::PeerClosed.code(), -5);
    }

    #[test]
    fn test_error_accessors() {
        let err = SocketError::network("bind failed");
        assert_eq!(err.kind(), SocketErrorKind::Network);
        assert_eq!(err.code(), STATUS_NETWORK);
        assert_eq!(err.detail(), Some("bind failed"));
        assert_eq!(err.transferred(), 0);
    }

    #[test]
    fn test_peer_closed_records_progress() {
        let err = SocketError::peer_closed(50);
        assert_eq!(err.kind(), SocketErrorKind::PeerClosed);
        assert_eq!(err.code(), STATUS_PEER_CLOSED);
        assert_eq!(err.transferred(), 50);
    }

    #[test]
    fn test_network_after_records_progress() {
        let err = SocketError::network_after("recv failed", 12);
        assert_eq!(err.kind(), SocketErrorKind::Network);
        assert_eq!(err.transferred(), 12);
    }

    #[test]
    fn test_display() {
        let err = SocketError::timeout();
        assert_eq!(err.to_string(), "operation timed out");

        let err = SocketError::invalid_argument("bad hostname");
        assert_eq!(err.to_string(), "invalid argument: bad hostname");
    }

    #[test]
    fn test_from_io_error_classification() {
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(
            SocketError::from(timed_out).kind(),
            SocketErrorKind::Timeout
        );

        let invalid = io::Error::from(io::ErrorKind::InvalidInput);
        assert_eq!(
            SocketError::from(invalid).kind(),
            SocketErrorKind::InvalidArgument
        );

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(
            SocketError::from(refused).kind(),
            SocketErrorKind::Network
        );

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(SocketError::from(reset).kind(), SocketErrorKind::Network);
    }

    #[test]
    fn test_errors_compare_by_value() {
        assert_eq!(SocketError::timeout(), SocketError::timeout());
        assert_ne!(SocketError::timeout(), SocketError::peer_closed(0));
        assert_ne!(SocketError::peer_closed(1), SocketError::peer_closed(2));
    }
}
