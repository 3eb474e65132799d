//! Request-handler capability (C10): the contract between the connection
//! handler and user code for body bytes, completion, and incident overrides.

use async_trait::async_trait;

use crate::error::{Error, IncidentKind};
use crate::method::Method;
use crate::response::Response;

/// The parts of a request head the core exposes to user code when asking
/// for a handler.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// The request method.
    pub method: Method,
    /// The request target exactly as received (no normalization).
    pub uri: String,
    /// The request headers.
    pub headers: http::HeaderMap,
}

/// A request-scoped incident: a recoverable policy violation encountered
/// while intaking or completing one request.
#[derive(Debug)]
pub enum RequestIncident {
    /// A body chunk (or declared `Content-Length`) exceeded the handler's
    /// limit.
    ByteLimitExceeded,
    /// A header the core interprets could not be parsed.
    InvalidHeader(String),
    /// `on_end` produced no response.
    NoResponse,
    /// `on_body_chunk` or `on_end` raised an error.
    RequestProcessingError(Error),
    /// The response body producer raised an error.
    ResponseBodyError(Error),
}

impl RequestIncident {
    /// The incident's kind/default-status tag.
    pub fn kind(&self) -> IncidentKind {
        match self {
            RequestIncident::ByteLimitExceeded => IncidentKind::ByteLimitExceeded,
            RequestIncident::InvalidHeader(_) => IncidentKind::InvalidHeader,
            RequestIncident::NoResponse => IncidentKind::NoResponse,
            RequestIncident::RequestProcessingError(_) => IncidentKind::RequestProcessingError,
            RequestIncident::ResponseBodyError(_) => IncidentKind::ResponseBodyError,
        }
    }

    /// Render this incident as an `Error` for propagation to `on_error`.
    pub fn into_error(self) -> Error {
        match self {
            RequestIncident::RequestProcessingError(e) | RequestIncident::ResponseBodyError(e) => e,
            other => Error::new_incident(other.kind()),
        }
    }
}

/// A client-scoped incident: encountered before any request-scoped handler
/// exists.
#[derive(Debug)]
pub enum ClientIncident {
    /// The client delegate supplied no request handler for an incoming
    /// head.
    NoRequestHandler,
}

impl ClientIncident {
    /// The incident's kind/default-status tag.
    pub fn kind(&self) -> IncidentKind {
        match self {
            ClientIncident::NoRequestHandler => IncidentKind::NoRequestHandler,
        }
    }
}

/// Per-request capability supplied by user code: receives body bytes,
/// produces the response, and may override the default response for an
/// incident.
#[async_trait]
pub trait RequestHandler: Send {
    /// The maximum number of body bytes this handler will accept; chunks
    /// (and any declared `Content-Length`) beyond this trigger
    /// `byte_limit_exceeded`.
    fn body_length_limit(&self) -> u64;

    /// A chunk of the request body, in the order received. An `Err` becomes
    /// a `request_processing_error` incident.
    async fn on_body_chunk(&mut self, chunk: &[u8]) -> Result<(), Error>;

    /// The request body is complete; produce the response, if any. An `Err`
    /// becomes a `request_processing_error` incident.
    async fn on_end(&mut self) -> Result<Option<Response>, Error>;

    /// An incident occurred while processing this request; optionally
    /// override the default response.
    async fn on_incident(&mut self, incident: &RequestIncident) -> Option<Response> {
        let _ = incident;
        None
    }

    /// A transport or internal error occurred while this handler was
    /// active.
    async fn on_error(&mut self, error: &Error) {
        let _ = error;
    }
}

/// Per-connection capability supplied by user code: supplies a
/// [`RequestHandler`] for each incoming request head.
#[async_trait]
pub trait ClientDelegate: Send + Sync {
    /// Produce a handler for `head`, or `None` to trigger
    /// `no_request_handler`.
    async fn request_handler_for(&self, head: &RequestHead) -> Option<Box<dyn RequestHandler>>;

    /// A client-scoped incident occurred; optionally override the default
    /// response.
    async fn on_client_incident(&self, incident: &ClientIncident) -> Option<Response> {
        let _ = incident;
        None
    }

    /// A transport or internal error occurred with no request handler
    /// active.
    async fn on_error(&self, error: &Error) {
        let _ = error;
    }
}
