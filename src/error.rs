//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Result type returned from fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur while driving a channel or connection.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Error creating or binding a listening socket.
    Listen,
    /// Error accepting a connection on a bound listener.
    Accept,
    /// Error loading or applying TLS material.
    Tls,
    /// Error parsing wire bytes into request parts.
    Parse(Parse),
    /// An `io::Error` while reading or writing a connection.
    Io,
    /// A request- or client-scoped incident (see `incident` module).
    Incident(IncidentKind),
    /// A channel/server lifecycle error.
    Channel(ChannelError),
}

#[derive(Debug)]
pub(crate) enum Parse {
    Method,
    Version,
    Uri,
    Header,
    TooLarge,
    Internal,
}

/// Request- or client-scoped incidents, each with a default response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentKind {
    /// No request handler was supplied by the client delegate.
    NoRequestHandler,
    /// A body chunk (or declared `Content-Length`) exceeded the handler's limit.
    ByteLimitExceeded,
    /// A header the core interprets could not be parsed.
    InvalidHeader,
    /// The user handler produced no response.
    NoResponse,
    /// The user handler's processing raised an error.
    RequestProcessingError,
    /// The response body producer raised an error.
    ResponseBodyError,
}

impl IncidentKind {
    /// The status code this incident maps to by default.
    pub fn default_status(self) -> crate::status::StatusCode {
        use crate::status::StatusCode as S;
        match self {
            IncidentKind::NoRequestHandler => S::NotFound,
            IncidentKind::ByteLimitExceeded => S::PayloadTooLarge,
            IncidentKind::InvalidHeader => S::BadRequest,
            IncidentKind::NoResponse => S::NotFound,
            IncidentKind::RequestProcessingError => S::InternalServerError,
            IncidentKind::ResponseBodyError => S::InternalServerError,
        }
    }
}

/// Channel- and server-scoped lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// A channel operation was attempted with no server bound.
    MissingServer,
    /// An operation required the server to be running.
    ServerNotRunning,
    /// An operation was attempted from an unexpected lifecycle state.
    UnexpectedState,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with<C: Into<Cause>>(kind: Kind, cause: C) -> Error {
        Error {
            inner: Box::new(ErrorImpl {
                kind,
                cause: Some(cause.into()),
            }),
        }
    }

    pub(crate) fn new_listen<E: Into<Cause>>(cause: E) -> Error {
        Error::with(Kind::Listen, cause)
    }

    pub(crate) fn new_accept<E: Into<Cause>>(cause: E) -> Error {
        Error::with(Kind::Accept, cause)
    }

    pub(crate) fn new_tls<E: Into<Cause>>(cause: E) -> Error {
        Error::with(Kind::Tls, cause)
    }

    pub(crate) fn new_io(cause: io::Error) -> Error {
        Error::with(Kind::Io, cause)
    }

    #[cfg(feature = "http2")]
    pub(crate) fn new_io_h2(cause: h2::Error) -> Error {
        match cause.into_io() {
            Some(io_err) => Error::with(Kind::Io, io_err),
            None => Error::with(Kind::Io, cause),
        }
    }

    pub(crate) fn new_io_other<E: Into<Cause>>(cause: E) -> Error {
        Error::with(Kind::Io, cause)
    }

    pub(crate) fn new_parse(parse: Parse) -> Error {
        Error::new(Kind::Parse(parse))
    }

    /// Build an error representing a request- or client-scoped incident.
    pub fn new_incident(kind: IncidentKind) -> Error {
        Error::new(Kind::Incident(kind))
    }

    pub(crate) fn new_incident_with<E: Into<Cause>>(kind: IncidentKind, cause: E) -> Error {
        Error::with(Kind::Incident(kind), cause)
    }

    pub(crate) fn new_channel(kind: ChannelError) -> Error {
        Error::new(Kind::Channel(kind))
    }

    /// True if the underlying transport error merely indicates the peer
    /// closed the connection (and should be suppressed once the connection
    /// handler has already moved to `Stopped`).
    pub(crate) fn is_peer_closed(&self) -> bool {
        match &self.inner.kind {
            Kind::Io => self
                .inner
                .cause
                .as_ref()
                .and_then(|c| c.downcast_ref::<io::Error>())
                .map(|e| {
                    matches!(
                        e.kind(),
                        io::ErrorKind::UnexpectedEof
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::BrokenPipe
                    )
                })
                .unwrap_or(false),
            _ => false,
        }
    }

    /// The incident kind, if this error represents one.
    pub fn incident_kind(&self) -> Option<IncidentKind> {
        match self.inner.kind {
            Kind::Incident(k) => Some(k),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("flue::Error");
        f.field("kind", &self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field("cause", cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            Kind::Listen => f.write_str("error binding listener")?,
            Kind::Accept => f.write_str("error accepting connection")?,
            Kind::Tls => f.write_str("error loading TLS material")?,
            Kind::Parse(p) => write!(f, "parse error: {:?}", p)?,
            Kind::Io => f.write_str("connection I/O error")?,
            Kind::Incident(k) => write!(f, "incident: {:?}", k)?,
            Kind::Channel(c) => write!(f, "channel error: {:?}", c)?,
        }
        if let Some(ref cause) = self.inner.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.cause.as_ref().map(|c| &**c as _)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::new_io(e)
    }
}
