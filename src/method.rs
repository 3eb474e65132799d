//! The HTTP request method.

use std::fmt;
use std::str::FromStr;

/// The request method (verb).
///
/// Covers the methods registered with IANA as of RFC 9110, plus a `Raw`
/// escape hatch for anything else a client might send.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Method {
    /// OPTIONS
    Options,
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// TRACE
    Trace,
    /// CONNECT
    Connect,
    /// PATCH
    Patch,
    /// Any method not covered above, e.g. `let m = Method::Raw("MOVE".into())`.
    Raw(String),
}

impl Method {
    /// Whether this method is considered "safe" (essentially read-only),
    /// per RFC 9110 §9.2.1. Unregistered (`Raw`) methods are never safe.
    pub fn is_safe(&self) -> bool {
        matches!(
            self,
            Method::Get | Method::Head | Method::Options | Method::Trace
        )
    }

    /// Whether this method is idempotent, per RFC 9110 §9.2.2.
    /// Unregistered (`Raw`) methods are never idempotent.
    pub fn is_idempotent(&self) -> bool {
        self.is_safe() || matches!(self, Method::Put | Method::Delete)
    }

    /// The wire name of this method, e.g. `"GET"`.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Patch => "PATCH",
            Method::Raw(s) => s.as_str(),
        }
    }
}

impl FromStr for Method {
    type Err = InvalidMethod;

    fn from_str(s: &str) -> Result<Method, InvalidMethod> {
        if s.is_empty() {
            return Err(InvalidMethod(()));
        }
        Ok(match s {
            "OPTIONS" => Method::Options,
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            "PATCH" => Method::Patch,
            other => Method::Raw(other.to_owned()),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by `Method::from_str` for an empty method token.
#[derive(Debug)]
pub struct InvalidMethod(());

impl fmt::Display for InvalidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid HTTP method")
    }
}

impl std::error::Error for InvalidMethod {}

impl From<&http::Method> for Method {
    fn from(m: &http::Method) -> Method {
        Method::from_str(m.as_str()).expect("http::Method is never empty")
    }
}

impl From<&Method> for http::Method {
    fn from(m: &Method) -> http::Method {
        http::Method::from_bytes(m.as_str().as_bytes()).unwrap_or(http::Method::GET)
    }
}
