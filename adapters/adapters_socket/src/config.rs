//! Socket Configuration
//!
//! Per-instance tunables for the socket entity. Each field replaces what the
//! transport would otherwise hard-code, so tests and latency-sensitive
//! callers can adjust them at construction time.

use std::time::Duration;

/// Default deadline for readiness waits and the kernel receive timeout.
pub const DEFAULT_TIMEOUT_MILLIS: i32 = 10_000;

/// Default close-time grace period for flushing outstanding data.
pub const DEFAULT_LINGER_SECS: u64 = 30;

/// Default retry budget for signal-interrupted transfer calls.
pub const DEFAULT_TRANSFER_RETRIES: u32 = 5;

/// Socket configuration
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Deadline in milliseconds applied to readiness waits and to the kernel
    /// receive timeout. Negative means wait indefinitely.
    pub timeout_millis: i32,
    /// Linger applied at bind time; `None` disables it.
    pub linger: Option<Duration>,
    /// Enable SO_KEEPALIVE at initialization.
    pub keepalive: bool,
    /// How many times a signal-interrupted transfer call is reissued before
    /// the operation fails.
    pub transfer_retries: u32,
    /// Listen backlog.
    pub backlog: i32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            linger: Some(Duration::from_secs(DEFAULT_LINGER_SECS)),
            keepalive: false,
            transfer_retries: DEFAULT_TRANSFER_RETRIES,
            backlog: libc::SOMAXCONN,
        }
    }
}

impl SocketConfig {
    /// Default configuration with an explicit deadline.
    pub fn with_timeout(timeout_millis: i32) -> Self {
        Self {
            timeout_millis,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SocketConfig::default();
        assert_eq!(config.timeout_millis, 10_000);
        assert_eq!(config.linger, Some(Duration::from_secs(30)));
        assert!(!config.keepalive);
        assert_eq!(config.transfer_retries, 5);
        assert_eq!(config.backlog, libc::SOMAXCONN);
    }

    #[test]
    fn test_with_timeout() {
        let config = SocketConfig::with_timeout(250);
        assert_eq!(config.timeout_millis, 250);
        assert_eq!(config.transfer_retries, 5);
    }
}
