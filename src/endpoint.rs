//! Endpoint identity (C1): the host/port a channel listens on.

use std::fmt;
use std::net::IpAddr;

/// The host + port identity of a listening socket. `address` may be a
/// literal IPv4 address, a literal IPv6 address, or a hostname; equality
/// and hashing are by fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: String,
    port: u16,
}

impl Endpoint {
    /// Build an endpoint from a literal address or hostname and a port.
    pub fn new(address: impl Into<String>, port: u16) -> Endpoint {
        Endpoint {
            address: address.into(),
            port,
        }
    }

    /// An endpoint bound to all interfaces (`0.0.0.0`) on `port`.
    pub fn any_v4(port: u16) -> Endpoint {
        Endpoint::new("0.0.0.0", port)
    }

    /// An endpoint bound to all interfaces (`::`) on `port`.
    pub fn any_v6(port: u16) -> Endpoint {
        Endpoint::new("::", port)
    }

    /// Loopback (`127.0.0.1`) on `port`.
    pub fn loopback_v4(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    /// The address, exactly as supplied.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Render this endpoint as a URL authority under `scheme`, e.g.
    /// `https://example.com:8443` or `http://[::1]:8080`. Literal IPv6
    /// addresses are bracketed; the unspecified `::` renders as `[::1]`,
    /// matching what a client actually reaches when connecting back to a
    /// wildcard bind.
    pub fn url(&self, scheme: &str) -> String {
        format!("{}://{}:{}", scheme, self.host_for_url(), self.port)
    }

    fn host_for_url(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) if v6.is_unspecified() => "[::1]".to_string(),
            Ok(IpAddr::V6(v6)) => format!("[{}]", v6),
            Ok(IpAddr::V4(v4)) => v4.to_string(),
            Err(_) => self.address.clone(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_for_url(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_hostname() {
        let e = Endpoint::new("example.com", 8080);
        assert_eq!(e.url("http"), "http://example.com:8080");
    }

    #[test]
    fn renders_ipv4() {
        let e = Endpoint::new("127.0.0.1", 443);
        assert_eq!(e.url("https"), "https://127.0.0.1:443");
    }

    #[test]
    fn brackets_ipv6_literal() {
        let e = Endpoint::new("2001:db8::1", 80);
        assert_eq!(e.url("http"), "http://[2001:db8::1]:80");
    }

    #[test]
    fn unspecified_ipv6_renders_as_loopback_bracketed() {
        let e = Endpoint::any_v6(9000);
        assert_eq!(e.url("http"), "http://[::1]:9000");
    }

    #[test]
    fn equality_is_by_fields() {
        assert_eq!(Endpoint::new("host", 80), Endpoint::new("host", 80));
        assert_ne!(Endpoint::new("host", 80), Endpoint::new("host", 81));
    }
}
