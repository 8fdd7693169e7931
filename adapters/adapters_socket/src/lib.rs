//! Adapters Layer: Blocking TCP Socket Transport
//!
//! Provides a blocking-with-timeout TCP socket abstraction: a single stateful
//! [`Socket`] entity wrapping one OS descriptor, with connect,
//! bind/listen/accept, timed send/receive, and address introspection. All I/O
//! is readiness-driven — the descriptor is never touched until `poll(2)`
//! reports it ready — followed by a partial-transfer loop with a bounded
//! retry budget for signal interruption.
//!
//! ## Overview
//!
//! The `adapters_socket` crate provides:
//! - **Addressing**: hostname resolution with a dotted-decimal fallback,
//!   service database lookup, local hostname lookup
//! - **Lifecycle**: descriptor creation and option setup, bind/listen,
//!   bounded connect, accept into a fresh entity, idempotent close
//! - **Timed I/O**: two-phase send/recv (readiness wait, then transfer loop)
//!   under a caller-configured deadline, including peek-mode receive
//!
//! ## Architecture
//!
//! This crate is part of the adapters layer in the CLEAN architecture
//! implementation. It depends on:
//! - `entities_error_handling`: error taxonomy and stable status codes
//! - `socket2`: descriptor creation, socket options, and address structures
//! - `nix`: readiness polling and flagged transfer syscalls
//!
//! One logical owner drives a `Socket` at a time; there is no internal
//! locking and no async machinery. Byte buffers are opaque — framing is the
//! caller's responsibility.

pub mod addr;
pub mod config;
pub mod socket;

pub use config::SocketConfig;
pub use socket::Socket;

pub use entities_error_handling::{SocketError, SocketErrorKind, SocketResult};
