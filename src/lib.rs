#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(rust_2018_idioms))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # flue
//!
//! flue is an embeddable HTTPS server library: it negotiates HTTP/1.1 and
//! HTTP/2 over TLS (or plaintext HTTP/1.1), drives each connection through
//! a bounded per-connection state machine, and hands completed requests to
//! user-supplied delegate traits rather than a routing layer.
//!
//! ## Features
//!
//! - Channel-level TLS termination and ALPN negotiation
//! - A single per-connection state machine shared by HTTP/1.1 and HTTP/2
//! - Resource limits: idle timeout, request quota, body byte budget
//! - Conditional-request precondition evaluation (`If-Match`,
//!   `If-None-Match`, `If-Modified-Since`, `If-Unmodified-Since`)
//! - A declarative, builder-style [`Response`](response::Response) value
//!
//! ## "Low-level"
//!
//! flue is a lower-level building block, meant to be embedded behind an
//! application's own routing and business logic via the
//! [`handler::ClientDelegate`] and [`handler::RequestHandler`] traits. It
//! does not include a router, middleware stack, or client.
//!
//! # Optional Features
//!
//! flue uses a set of [feature flags] to reduce the amount of compiled
//! code. By default, flue does not enable any features but allows one to
//! enable a subset for their use case.
//!
//! - `http1`: Enables the HTTP/1.1 engine.
//! - `http2`: Enables the HTTP/2 engine (pulls in the `h2` crate).
//! - `tls`: Enables TLS termination (`rustls`, `rustls-pemfile`,
//!   `tokio-rustls`).
//! - `runtime`/`tcp`: Enables the socket-binding [`channel::Channel`] and
//!   [`server::Server`] runtime glue (`socket2`, `num_cpus`, Tokio's net,
//!   time, and signal facilities).
//! - `full`: All of the above.
//!
//! [feature flags]: https://doc.rust-lang.org/cargo/reference/manifest.html#the-features-section

pub use crate::error::{Error, Result};

mod error;

pub mod accept_language;
pub mod date;
pub mod etag;
pub mod handler;
pub mod method;
pub mod mime;
pub mod path;
pub mod precondition;
pub mod response;
pub mod status;
pub mod variant;

pub mod connection;
pub mod endpoint;

#[cfg(feature = "tcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "tcp")))]
pub mod channel;

#[cfg(feature = "tcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "tcp")))]
pub mod server;

#[cfg(feature = "tcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "tcp")))]
pub mod signal;

#[cfg(feature = "tls")]
#[cfg_attr(docsrs, doc(cfg(feature = "tls")))]
pub mod tls;

pub use crate::method::Method;
pub use crate::response::Response;
pub use crate::status::StatusCode;
pub use crate::variant::HttpVariant;
