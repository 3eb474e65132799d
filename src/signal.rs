//! Stop-signal helper (C15): a process-integration convenience for host
//! programs, not wired into [`crate::server::Server`] automatically.

#![cfg(feature = "tcp")]

use tokio::signal::unix::{signal, SignalKind};

/// Waits for `SIGHUP`, `SIGINT`, `SIGQUIT`, or `SIGTERM`, whichever fires
/// first. Installs its listeners fresh on each call — callers intending a
/// "stop exactly once" lifecycle should call this once and race it
/// (`tokio::select!`) against [`crate::server::Server::wait_until_stopped`].
pub async fn wait_for_stop_signal() {
    let mut hangup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = hangup.recv() => {}
        _ = interrupt.recv() => {}
        _ = quit.recv() => {}
        _ = terminate.recv() => {}
    }
}
