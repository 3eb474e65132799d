//! Connection handler (C9) — the hard part: per-connection request intake,
//! body-limit enforcement, keep-alive, idle timeout, request quota,
//! incident handling, and response emission.

mod h1;
#[cfg(feature = "http2")]
mod h2;
pub mod state;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::handler::ClientDelegate;
use crate::variant::HttpVariant;

pub use state::{ConnectionConfig, ConnectionState, ProcessingState};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable per-instance connection id, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The per-connection response dispatch queue: a serialized mailbox that
/// guarantees response N's bytes are fully written before response N+1's
/// first byte, even though intake and completion may race across tasks.
pub(crate) struct ResponseQueue {
    tx: mpsc::UnboundedSender<BoxFuture>,
}

impl ResponseQueue {
    fn spawn() -> ResponseQueue {
        let (tx, mut rx) = mpsc::unbounded_channel::<BoxFuture>();
        tokio::spawn(async move {
            while let Some(work) = rx.recv().await {
                work.await;
            }
        });
        ResponseQueue { tx }
    }

    pub(crate) fn push(&self, work: BoxFuture) {
        // The receiving task only exits when every sender (held by the
        // connection and its in-flight work items) is dropped, so send
        // cannot fail while this connection is still reachable.
        let _ = self.tx.send(work);
    }
}

/// The shared state behind a connection, reachable both from the I/O task
/// driving it and from the [`ConnectionHandle`] exposed to delegates.
pub struct Connection {
    id: ConnectionId,
    config: ConnectionConfig,
    variant: HttpVariant,
    state: Mutex<ConnectionState>,
    delegate: Mutex<Option<Arc<dyn ClientDelegate>>>,
    response_queue: ResponseQueue,
    idle_deadline: Mutex<Option<Instant>>,
    idle_notify: Notify,
    disconnect_notify: Notify,
}

impl Connection {
    pub(crate) fn new(config: ConnectionConfig, variant: HttpVariant) -> Arc<Connection> {
        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        let conn = Arc::new(Connection {
            id,
            state: Mutex::new(ConnectionState::new(config.request_limit)),
            config,
            variant,
            delegate: Mutex::new(None),
            response_queue: ResponseQueue::spawn(),
            idle_deadline: Mutex::new(Some(Instant::now() + config.idle_time)),
            idle_notify: Notify::new(),
            disconnect_notify: Notify::new(),
        });
        tokio::spawn(idle_timer_task(conn.clone()));
        conn
    }

    /// This connection's stable id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn variant(&self) -> HttpVariant {
        self.variant
    }

    pub(crate) fn config(&self) -> ConnectionConfig {
        self.config
    }

    pub(crate) fn response_queue(&self) -> &ResponseQueue {
        &self.response_queue
    }

    fn set_delegate(&self, delegate: Arc<dyn ClientDelegate>) {
        *self.delegate.lock().unwrap() = Some(delegate);
    }

    pub(crate) fn delegate(&self) -> Option<Arc<dyn ClientDelegate>> {
        self.delegate.lock().unwrap().clone()
    }

    /// Intake gate for a new request head: returns `Err` when the
    /// connection has already moved to `Stopped`, or `Ok(false)` when the
    /// quota is exhausted (the connection transitions to `Stopped` silently
    /// and no response should be emitted for this head).
    pub(crate) fn begin_request(&self) -> RequestAdmission {
        let mut state = self.state.lock().unwrap();
        match state.processing {
            ProcessingState::Processing => {
                warn!(connection = %self.id, "head received while already processing; dropping (HTTP/1 pipelining is not supported)");
                RequestAdmission::Busy
            }
            ProcessingState::Stopped => RequestAdmission::Stopped,
            ProcessingState::Idle => {
                if state.remaining_request_quota == 0 {
                    state.processing = ProcessingState::Stopped;
                    debug!(connection = %self.id, "request quota exhausted; stopping without a response");
                    RequestAdmission::QuotaExhausted
                } else {
                    state.remaining_request_quota -= 1;
                    state.processing = ProcessingState::Processing;
                    self.note_active_delta(&mut state, 1);
                    RequestAdmission::Admitted
                }
            }
        }
    }

    /// Called once a response for the current request has been fully
    /// written. Returns whether the socket should now be closed.
    pub(crate) fn end_request(&self, needs_disconnect: bool, head_not_keepalive: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        self.note_active_delta(&mut state, -1);
        if state.processing == ProcessingState::Processing {
            state.processing = ProcessingState::Idle;
        }
        let quota_exhausted = state.remaining_request_quota == 0;
        let socket_not_active = !state.socket_active;
        let idle_fired = state.idle_fired;
        let active_zero = state.active_request_count == 0;

        needs_disconnect
            || head_not_keepalive
            || socket_not_active
            || (active_zero && (idle_fired || quota_exhausted))
    }

    /// An incident or transport error forced the connection to `Stopped`.
    pub(crate) fn force_stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.processing = ProcessingState::Stopped;
    }

    /// Whether the connection has already moved to `Stopped`. Checked by
    /// the I/O loop before it parks on a blocking read/accept, since a
    /// disconnect requested before that wait began (e.g. from
    /// `did_start_client`) can otherwise race `disconnect_notify`: a
    /// `notify_waiters` call with no waiter registered yet is not stored,
    /// so a loop that only reacted to `disconnected()` could wait forever.
    pub(crate) fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().processing == ProcessingState::Stopped
    }

    fn note_active_delta(&self, state: &mut ConnectionState, delta: i64) {
        if delta > 0 {
            state.active_request_count += delta as u32;
            if state.active_request_count == 1 {
                *self.idle_deadline.lock().unwrap() = None;
                self.idle_notify.notify_one();
            }
        } else {
            state.active_request_count = state.active_request_count.saturating_sub((-delta) as u32);
            if state.active_request_count == 0 {
                *self.idle_deadline.lock().unwrap() = Some(Instant::now() + self.config.idle_time);
                self.idle_notify.notify_one();
            }
        }
    }

    fn mark_idle_fired(&self) {
        self.state.lock().unwrap().idle_fired = true;
    }

    fn mark_socket_inactive(&self) {
        self.state.lock().unwrap().socket_active = false;
    }

    pub(crate) fn request_disconnect(&self) {
        self.force_stop();
        self.mark_socket_inactive();
        self.disconnect_notify.notify_waiters();
    }

    pub(crate) async fn disconnected(&self) {
        self.disconnect_notify.notified().await
    }
}

async fn idle_timer_task(conn: Arc<Connection>) {
    loop {
        let deadline = *conn.idle_deadline.lock().unwrap();
        match deadline {
            None => {
                tokio::select! {
                    _ = conn.idle_notify.notified() => {}
                    _ = conn.disconnected() => { return; }
                }
            }
            Some(instant) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(instant) => {
                        let fire = {
                            let state = conn.state.lock().unwrap();
                            state.active_request_count == 0 && state.processing != ProcessingState::Stopped
                        };
                        if fire {
                            trace!(connection = %conn.id, "idle timeout elapsed; closing connection");
                            conn.mark_idle_fired();
                            conn.request_disconnect();
                            return;
                        }
                    }
                    _ = conn.idle_notify.notified() => {}
                    _ = conn.disconnected() => { return; }
                }
            }
        }
        if conn.state.lock().unwrap().processing == ProcessingState::Stopped {
            return;
        }
    }
}

/// The outcome of [`Connection::begin_request`].
pub(crate) enum RequestAdmission {
    Admitted,
    Busy,
    Stopped,
    QuotaExhausted,
}

/// A non-owning handle to a connection, given to a [`ChannelDelegate`] in
/// `did_start_client`/`did_stop_client`. Installing a [`ClientDelegate`] is
/// mandatory — a channel delegate that neither installs one nor disconnects
/// leaves the connection permanently unable to admit requests.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Connection>,
}

impl ConnectionHandle {
    pub(crate) fn new(inner: Arc<Connection>) -> ConnectionHandle {
        ConnectionHandle { inner }
    }

    /// The connection's stable id.
    pub fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    /// Install the per-request capability provider for this connection.
    pub fn set_delegate(&self, delegate: Arc<dyn ClientDelegate>) {
        self.inner.set_delegate(delegate);
    }

    /// Force-close the connection without writing a response.
    pub fn disconnect(&self) {
        self.inner.request_disconnect();
    }

    pub(crate) fn shared(&self) -> Arc<Connection> {
        self.inner.clone()
    }
}

/// Per-channel capability supplied by user code: notified as each
/// connection starts and stops.
#[async_trait]
pub trait ChannelDelegate: Send + Sync {
    /// A new connection was accepted. The delegate must either
    /// [`ConnectionHandle::set_delegate`] or [`ConnectionHandle::disconnect`]
    /// before returning, or the connection can never admit a request.
    async fn did_start_client(&self, handle: ConnectionHandle);

    /// The connection's socket has closed.
    async fn did_stop_client(&self, handle: ConnectionHandle, result: crate::Result<()>);

    /// A transport-layer error on the listening socket itself (bind,
    /// accept), reported before any client connection exists.
    async fn on_error(&self, error: &Error) {
        let _ = error;
    }
}

/// Drive one accepted, already TLS-terminated-if-applicable, duplex stream
/// to completion, dispatching to the HTTP/1 or HTTP/2 engine per `variant`.
pub(crate) async fn serve<S>(
    stream: S,
    config: ConnectionConfig,
    variant: HttpVariant,
    channel_delegate: Arc<dyn ChannelDelegate>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let conn = Connection::new(config, variant);
    let handle = ConnectionHandle::new(conn.clone());
    channel_delegate.did_start_client(handle.clone()).await;

    let alpn_h2 = matches!(variant, HttpVariant::V2);
    let result = if alpn_h2 {
        drive_h2(stream, conn.clone()).await
    } else {
        h1::serve(stream, conn.clone()).await
    };

    conn.force_stop();
    channel_delegate.did_stop_client(handle, result).await;
}

#[cfg(feature = "http2")]
async fn drive_h2<S>(stream: S, conn: Arc<Connection>) -> crate::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    h2::serve(stream, conn).await
}

#[cfg(not(feature = "http2"))]
async fn drive_h2<S>(_stream: S, _conn: Arc<Connection>) -> crate::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    Err(Error::new_io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "http2 feature not enabled",
    )))
}
