//! Per-connection state (C9 data model).

use std::time::Duration;

/// The connection-scoped lifecycle state. `Processing` is a simplification:
/// at most one request is ever in flight on an HTTP/1 connection at a time
/// (pipelined heads arriving mid-processing are logged and dropped); each
/// HTTP/2 stream gets its own handler instance sharing only the quota and
/// idle timer of a connection-level supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    /// No request currently in flight; a new head may be admitted.
    Idle,
    /// A request is in flight: intake, body delivery, or response emission.
    Processing,
    /// Terminal: no further requests will be admitted on this connection.
    Stopped,
}

/// Tunables carried by a channel's `connection` configuration (§3).
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Maximum wall time between the end of the last in-flight request and
    /// the next inbound byte before the connection is closed.
    pub idle_time: Duration,
    /// Maximum number of requests serviced on one connection.
    pub request_limit: u32,
}

impl Default for ConnectionConfig {
    fn default() -> ConnectionConfig {
        ConnectionConfig {
            idle_time: Duration::from_millis(4_000),
            request_limit: 128,
        }
    }
}

/// The mutable fields of [`crate::connection::Connection`], held behind a
/// single short-critical-section mutex.
#[derive(Debug)]
pub struct ConnectionState {
    /// The connection's current lifecycle state.
    pub processing: ProcessingState,
    /// Requests whose responses have not yet been fully written.
    pub active_request_count: u32,
    /// Requests still permitted before this connection must refuse new heads.
    pub remaining_request_quota: u32,
    /// Whether the idle timer has already fired once for this connection.
    pub idle_fired: bool,
    /// Whether the socket is still believed open.
    pub socket_active: bool,
}

impl ConnectionState {
    /// A fresh, idle state with the full request quota available.
    pub fn new(request_limit: u32) -> ConnectionState {
        ConnectionState {
            processing: ProcessingState::Idle,
            active_request_count: 0,
            remaining_request_quota: request_limit,
            idle_fired: false,
            socket_active: true,
        }
    }
}
