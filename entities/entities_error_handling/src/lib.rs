//! Entities Layer: Error Handling
//!
//! Provides the socket error taxonomy shared by every layer:
//! - Error kinds and the stable integer status codes
//! - The error value carried through `Result` propagation
//! - Classification of OS-level I/O errors into the taxonomy

pub mod error;

pub use error::{SocketError, SocketErrorKind, SocketResult};
pub use error::{
    SOCKET_OK, STATUS_INVALID_ARGUMENT, STATUS_IO, STATUS_NETWORK, STATUS_PEER_CLOSED,
    STATUS_TIMEOUT,
};
