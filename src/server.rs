//! Server (C7): owns the I/O runtime, tracks a set of channels, and
//! coordinates their start/stop lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelId};
use crate::error::{ChannelError, Error};

/// The server's lifecycle state. `Stopped` carries the result of the most
/// recent `stop()` (or `None` before the server has ever run).
enum State {
    Stopped(Option<Arc<crate::Result<()>>>),
    Starting,
    Running,
    Stopping,
}

/// Owns a set of [`Channel`]s and coordinates their lifecycle together:
/// `start()` allocates a dedicated multi-thread Tokio runtime sized to the
/// host's logical core count, brings every bound channel up concurrently on
/// it, and only reports `Running` once all of them have; `stop()` tears
/// every channel down and shuts that runtime down.
pub struct Server {
    channels: AsyncMutex<HashMap<ChannelId, Arc<Channel>>>,
    state: std::sync::Mutex<State>,
    state_changed: Notify,
    runtime: std::sync::Mutex<Option<Runtime>>,
    handle: std::sync::Mutex<Option<Handle>>,
}

impl Default for Server {
    fn default() -> Server {
        Server::new()
    }
}

impl Server {
    /// An empty, stopped server with no channels bound.
    pub fn new() -> Server {
        Server {
            channels: AsyncMutex::new(HashMap::new()),
            state: std::sync::Mutex::new(State::Stopped(None)),
            state_changed: Notify::new(),
            runtime: std::sync::Mutex::new(None),
            handle: std::sync::Mutex::new(None),
        }
    }

    /// Bind `channel` to this server. Idempotent: binding the same channel
    /// twice just replaces the entry. If the server is currently `Running`,
    /// the channel is started immediately on the server's runtime.
    pub async fn add_channel(self: &Arc<Server>, channel: Arc<Channel>) -> crate::Result<()> {
        let already_running = matches!(*self.state.lock().unwrap(), State::Running);
        {
            let mut channels = self.channels.lock().await;
            channels.insert(channel.id(), channel.clone());
        }
        if already_running {
            let handle = self
                .handle
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::new_channel(ChannelError::UnexpectedState))?;
            run_on(&handle, async move { channel.start().await }).await?;
        }
        Ok(())
    }

    /// Start every bound channel concurrently, on a fresh multi-thread
    /// runtime sized to the host's logical core count. Transitions
    /// `Stopped -> Starting -> Running`; fails with `UnexpectedState`
    /// unless currently `Stopped`.
    pub async fn start(self: &Arc<Server>) -> crate::Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                State::Stopped(_) => *state = State::Starting,
                _ => return Err(Error::new_channel(ChannelError::UnexpectedState)),
            }
        }
        self.state_changed.notify_waiters();
        info!("server starting");

        let worker_threads = num_cpus::get().max(1);
        let rt = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .enable_all()
            .thread_name("flue-io")
            .build()
            .map_err(Error::new_listen)?;
        let handle = rt.handle().clone();

        let channels: Vec<Arc<Channel>> = self.channels.lock().await.values().cloned().collect();
        let start_all = async move {
            let joins: Vec<_> = channels
                .into_iter()
                .map(|c| tokio::spawn(async move { c.start().await }))
                .collect();
            let mut results = Vec::with_capacity(joins.len());
            for join in joins {
                results.push(
                    join.await
                        .unwrap_or_else(|_| Err(Error::new_channel(ChannelError::UnexpectedState))),
                );
            }
            results
        };
        let results = run_on(&handle, start_all).await?;

        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            warn!(error = %err, "server failed to start; rolling back to stopped");
            shutdown_runtime(rt).await;
            *self.state.lock().unwrap() = State::Stopped(Some(Arc::new(Err(Error::new_channel(
                ChannelError::UnexpectedState,
            )))));
            self.state_changed.notify_waiters();
            return Err(err);
        }

        *self.runtime.lock().unwrap() = Some(rt);
        *self.handle.lock().unwrap() = Some(handle);
        *self.state.lock().unwrap() = State::Running;
        self.state_changed.notify_waiters();
        info!(worker_threads, "server running");
        Ok(())
    }

    /// Stop every bound channel and shut down the server's runtime.
    /// Tolerates any current state; concurrent callers all observe the same
    /// terminal result.
    pub async fn stop(self: &Arc<Server>) -> crate::Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if let State::Stopped(Some(ref result)) = *state {
                return clone_result(result);
            }
            *state = State::Stopping;
        }
        self.state_changed.notify_waiters();
        debug!("server stopping");

        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let channels: Vec<Arc<Channel>> =
                self.channels.lock().await.values().cloned().collect();
            let _ = run_on(&handle, async move {
                for channel in &channels {
                    let _ = channel.stop().await;
                }
                Ok::<(), Error>(())
            })
            .await;
        }

        if let Some(rt) = self.runtime.lock().unwrap().take() {
            shutdown_runtime(rt).await;
        }

        let result = Arc::new(Ok(()));
        *self.state.lock().unwrap() = State::Stopped(Some(result.clone()));
        self.state_changed.notify_waiters();
        info!("server stopped");
        clone_result(&result)
    }

    /// Block until the server leaves `Starting` (i.e. reaches `Running` or
    /// falls back to `Stopped` on failure).
    pub async fn wait_while_starting(&self) {
        loop {
            if !matches!(*self.state.lock().unwrap(), State::Starting) {
                return;
            }
            self.state_changed.notified().await;
        }
    }

    /// Block until the server reaches `Stopped`.
    pub async fn wait_until_stopped(&self) {
        loop {
            if matches!(*self.state.lock().unwrap(), State::Stopped(_)) {
                return;
            }
            self.state_changed.notified().await;
        }
    }

    /// `true` iff the server is currently `Running`.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock().unwrap(), State::Running)
    }
}

/// `crate::Result<()>` is not `Clone` (the cause is a boxed trait object);
/// `stop()` only ever stores `Ok(())`, so concurrent callers just observe
/// that success (an `UnexpectedState` stand-in on the unreachable error arm).
fn clone_result(result: &crate::Result<()>) -> crate::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(_) => Err(Error::new_channel(ChannelError::UnexpectedState)),
    }
}

/// Runs `fut` as a task on `handle`'s runtime and waits for its result from
/// the caller's own runtime, so the caller never has to `block_on`.
async fn run_on<F, T>(handle: &Handle, fut: F) -> crate::Result<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    handle.spawn(async move {
        let _ = tx.send(fut.await);
    });
    rx.await
        .map_err(|_| Error::new_channel(ChannelError::UnexpectedState))
}

async fn shutdown_runtime(rt: Runtime) {
    let _ = tokio::task::spawn_blocking(move || {
        rt.shutdown_timeout(Duration::from_secs(5));
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ChannelDelegate, ConnectionConfig, ConnectionHandle};
    use crate::endpoint::Endpoint;
    use crate::variant::HttpVariant;
    use async_trait::async_trait;

    struct NullDelegate;

    #[async_trait]
    impl ChannelDelegate for NullDelegate {
        async fn did_start_client(&self, handle: ConnectionHandle) {
            handle.disconnect();
        }
        async fn did_stop_client(&self, _handle: ConnectionHandle, _result: crate::Result<()>) {}
    }

    fn channel() -> Arc<Channel> {
        Channel::new(
            Endpoint::loopback_v4(0),
            HttpVariant::V1_1 { tls: false },
            ConnectionConfig::default(),
            #[cfg(feature = "tls")]
            None,
            Arc::new(NullDelegate),
        )
    }

    #[tokio::test]
    async fn start_waits_for_every_channel() {
        let server = Arc::new(Server::new());
        server.add_channel(channel()).await.unwrap();
        server.add_channel(channel()).await.unwrap();
        server.start().await.unwrap();
        assert!(server.is_running());
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_from_running_is_unexpected_state() {
        let server = Arc::new(Server::new());
        server.add_channel(channel()).await.unwrap();
        server.start().await.unwrap();
        let err = server.start().await.unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::error::Kind::Channel(ChannelError::UnexpectedState)
        ));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn add_channel_after_running_starts_it_immediately() {
        let server = Arc::new(Server::new());
        server.start().await.unwrap();
        assert!(server.is_running());
        let ch = channel();
        server.add_channel(ch.clone()).await.unwrap();
        assert!(ch.is_running());
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_stop_callers_observe_same_result() {
        let server = Arc::new(Server::new());
        server.add_channel(channel()).await.unwrap();
        server.start().await.unwrap();

        let a = server.clone();
        let b = server.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.stop().await }),
            tokio::spawn(async move { b.stop().await }),
        );
        assert!(ra.unwrap().is_ok());
        assert!(rb.unwrap().is_ok());
    }
}
