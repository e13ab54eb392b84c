//! Endpoint abstraction for transport-agnostic socket addressing.
//!
//! Brokers bind and clients connect to either a stream endpoint
//! (`tcp://host:port`) or a local-socket endpoint (`ipc:///path`).

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

/// Transport endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP transport: `tcp://host:port`
    Tcp(SocketAddr),
    /// IPC transport (Unix domain socket): `ipc:///path/to/socket`
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint from a string.
    ///
    /// Supported formats:
    /// - `tcp://127.0.0.1:5555`
    /// - `tcp://[::1]:5555` (IPv6)
    /// - `tcp://*:5555` (all interfaces, for binding)
    /// - `tcp://localhost:5555` (resolved once, first address wins)
    /// - `ipc:///tmp/feeds/0` (Unix only)
    ///
    /// # Examples
    ///
    /// ```
    /// use robotmq_core::endpoint::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("tcp://127.0.0.1:5555").unwrap();
    /// assert!(matches!(endpoint, Endpoint::Tcp(_)));
    ///
    /// # #[cfg(unix)]
    /// # {
    /// let endpoint = Endpoint::parse("ipc:///tmp/test.sock").unwrap();
    /// assert!(matches!(endpoint, Endpoint::Ipc(_)));
    /// # }
    /// ```
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    /// Returns true if this is a TCP endpoint.
    pub fn is_tcp(&self) -> bool {
        matches!(self, Endpoint::Tcp(_))
    }

    /// Returns true if this is an IPC endpoint.
    #[cfg(unix)]
    pub fn is_ipc(&self) -> bool {
        matches!(self, Endpoint::Ipc(_))
    }
}

fn parse_tcp(addr: &str) -> Result<SocketAddr, EndpointError> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        return Ok(socket_addr);
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| EndpointError::InvalidTcpAddress(addr.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| EndpointError::InvalidTcpAddress(addr.to_string()))?;

    if host == "*" {
        return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
    }

    (host, port)
        .to_socket_addrs()
        .map_err(|_| EndpointError::InvalidTcpAddress(addr.to_string()))?
        .next()
        .ok_or_else(|| EndpointError::InvalidTcpAddress(addr.to_string()))
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            Ok(Endpoint::Tcp(parse_tcp(addr)?))
        } else if let Some(path) = s.strip_prefix("ipc://") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(EndpointError::InvalidIpcPath(s.to_string()));
                }
                Ok(Endpoint::Ipc(PathBuf::from(path)))
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                Err(EndpointError::IpcNotSupported)
            }
        } else {
            Err(EndpointError::InvalidScheme(s.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            #[cfg(unix)]
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

/// Errors that can occur when parsing or using endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid scheme in endpoint: {0} (expected tcp:// or ipc://)")]
    InvalidScheme(String),

    #[error("Invalid TCP address: {0}")]
    InvalidTcpAddress(String),

    #[error("Invalid IPC path: {0}")]
    InvalidIpcPath(String),

    #[error("IPC transport not supported on this platform")]
    IpcNotSupported,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_ipv4() {
        let endpoint = Endpoint::parse("tcp://127.0.0.1:5555").unwrap();
        assert!(endpoint.is_tcp());
        assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:5555");
    }

    #[test]
    fn test_parse_tcp_ipv6() {
        let endpoint = Endpoint::parse("tcp://[::1]:5555").unwrap();
        assert!(matches!(endpoint, Endpoint::Tcp(_)));
    }

    #[test]
    fn test_parse_tcp_wildcard() {
        let endpoint = Endpoint::parse("tcp://*:5555").unwrap();
        assert_eq!(endpoint.to_string(), "tcp://0.0.0.0:5555");
    }

    #[test]
    fn test_parse_tcp_localhost() {
        let endpoint = Endpoint::parse("tcp://localhost:5555").unwrap();
        match endpoint {
            Endpoint::Tcp(addr) => {
                assert!(addr.ip().is_loopback());
                assert_eq!(addr.port(), 5555);
            }
            #[cfg(unix)]
            Endpoint::Ipc(_) => panic!("expected tcp endpoint"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_ipc() {
        let endpoint = Endpoint::parse("ipc:///tmp/feeds/0").unwrap();
        assert!(endpoint.is_ipc());
        assert_eq!(endpoint.to_string(), "ipc:///tmp/feeds/0");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = Endpoint::parse("inproc://name");
        assert!(matches!(result, Err(EndpointError::InvalidScheme(_))));
    }

    #[test]
    fn test_invalid_tcp_address() {
        let result = Endpoint::parse("tcp://invalid:port");
        assert!(matches!(result, Err(EndpointError::InvalidTcpAddress(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_ipc_empty() {
        let result = Endpoint::parse("ipc://");
        assert!(matches!(result, Err(EndpointError::InvalidIpcPath(_))));
    }
}
