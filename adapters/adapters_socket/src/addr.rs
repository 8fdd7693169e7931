//! Address Resolution
//!
//! Hostname and service lookups for the socket entity. Resolution is
//! IPv4-only and uncached: the platform resolver is consulted first, then the
//! input is parsed as a dotted-decimal literal.

use std::ffi::{CStr, CString};
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};

use entities_error_handling::{SocketError, SocketResult};

/// Resolve a hostname or dotted-decimal literal to an IPv4 address.
///
/// # Arguments
///
/// * `hostname` - Hostname or `x.x.x.x` literal
///
/// # Returns
///
/// * `Ok(Ipv4Addr)` - Resolved address
/// * `Err(SocketError)` - *invalid-argument* when the input neither resolves
///   nor parses
pub fn resolve_host(hostname: &str) -> SocketResult<Ipv4Addr> {
    if let Ok(addrs) = (hostname, 0u16).to_socket_addrs() {
        for addr in addrs {
            if let SocketAddr::V4(v4) = addr {
                return Ok(*v4.ip());
            }
        }
    }
    hostname.parse::<Ipv4Addr>().map_err(|_| {
        SocketError::invalid_argument(format!("unable to resolve host \"{hostname}\""))
    })
}

/// Look up a named TCP service's well-known port in the platform service
/// database.
///
/// # Arguments
///
/// * `name` - Service name, e.g. `"http"`
///
/// # Returns
///
/// * `Ok(u16)` - Port number in host byte order
/// * `Err(SocketError)` - *invalid-argument* for unknown services
pub fn service_port(name: &str) -> SocketResult<u16> {
    const TCP: &CStr = c"tcp";
    let c_name = CString::new(name)
        .map_err(|_| SocketError::invalid_argument("service name contains a NUL byte"))?;

    let entry = unsafe { libc::getservbyname(c_name.as_ptr(), TCP.as_ptr()) };
    if entry.is_null() {
        return Err(SocketError::invalid_argument(format!(
            "unknown service \"{name}\""
        )));
    }
    let raw_port = unsafe { (*entry).s_port };
    Ok(u16::from_be(raw_port as u16))
}

/// The local machine's hostname.
pub fn local_hostname() -> SocketResult<String> {
    let name = nix::unistd::gethostname()
        .map_err(|e| SocketError::network(format!("gethostname failed: {e}")))?;
    Ok(name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_error_handling::SocketErrorKind;

    #[test]
    fn test_resolve_literal() {
        let addr = resolve_host("192.168.7.1").unwrap();
        assert_eq!(addr, Ipv4Addr::new(192, 168, 7, 1));
    }

    #[test]
    fn test_resolve_loopback() {
        let addr = resolve_host("127.0.0.1").unwrap();
        assert_eq!(addr, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn test_resolve_failure_is_invalid_argument() {
        // .invalid is reserved and never resolves
        let err = resolve_host("host.invalid").unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unknown_service() {
        let err = service_port("no-such-service-entry").unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);
    }

    #[test]
    fn test_service_name_with_nul() {
        let err = service_port("ht\0tp").unwrap_err();
        assert_eq!(err.kind(), SocketErrorKind::InvalidArgument);
    }

    #[test]
    fn test_local_hostname() {
        let name = local_hostname().unwrap();
        assert!(!name.is_empty());
    }
}
