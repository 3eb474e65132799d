//! HTTP protocol variant a channel speaks.

/// Which HTTP version(s) a channel negotiates, and whether TLS terminates
/// the connection. `V2` always implies TLS — the `h2` crate this library
/// uses for it is a TLS-ALPN-negotiated protocol here, not cleartext h2c.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVariant {
    /// HTTP/1.1, optionally over TLS.
    V1_1 {
        /// Whether this channel terminates TLS.
        tls: bool,
    },
    /// HTTP/2 over TLS, with ALPN negotiation falling back to HTTP/1.1.
    V2,
}

impl HttpVariant {
    /// `true` iff this variant terminates TLS.
    pub fn is_secure(&self) -> bool {
        match self {
            HttpVariant::V1_1 { tls } => *tls,
            HttpVariant::V2 => true,
        }
    }

    /// The URL scheme this variant renders endpoints under.
    pub fn scheme(&self) -> &'static str {
        if self.is_secure() {
            "https"
        } else {
            "http"
        }
    }

    /// ALPN protocol IDs to advertise, in preference order. Empty for
    /// cleartext HTTP/1.1 (no ALPN is performed).
    pub fn alpn_protocols(&self) -> Vec<Vec<u8>> {
        match self {
            HttpVariant::V2 => vec![b"h2".to_vec(), b"http/1.1".to_vec()],
            HttpVariant::V1_1 { tls: true } => vec![b"http/1.1".to_vec()],
            HttpVariant::V1_1 { tls: false } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_is_always_secure() {
        assert!(HttpVariant::V2.is_secure());
        assert_eq!(HttpVariant::V2.scheme(), "https");
    }

    #[test]
    fn v1_1_secure_flag_drives_scheme() {
        assert_eq!(HttpVariant::V1_1 { tls: false }.scheme(), "http");
        assert_eq!(HttpVariant::V1_1 { tls: true }.scheme(), "https");
    }

    #[test]
    fn alpn_preference_order() {
        assert_eq!(
            HttpVariant::V2.alpn_protocols(),
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
        assert_eq!(
            HttpVariant::V1_1 { tls: true }.alpn_protocols(),
            vec![b"http/1.1".to_vec()]
        );
        assert!(HttpVariant::V1_1 { tls: false }.alpn_protocols().is_empty());
    }
}
