use std::future::Future;

use anyhow::{Context, Result};
use log::info;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

pub struct SignalHandler {
    tok: CancellationToken,
}

pub fn new() -> SignalHandler {
    SignalHandler {
        tok: CancellationToken::new(),
    }
}

impl SignalHandler {
    pub fn subscribe_stop(&self) -> CancellationToken {
        self.tok.clone()
    }

    /// Waits for the first termination-ish signal and cancels all subscribers.
    /// Handlers are registered before the first await, so calling this from a freshly spawned
    /// task is enough to stop the default SIGINT behaviour from killing the process.
    pub async fn wait_for_signal(self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate()).context("registering SIGTERM")?;
        let mut sigint = signal(SignalKind::interrupt()).context("registering SIGINT")?;
        let mut sighup = signal(SignalKind::hangup()).context("registering SIGHUP")?;

        select! {
        _ = sigterm.recv() => info!("Terminated; stopping..."),
        _ = sigint.recv() => info!("Interrupted; stopping..."),
        _ = sighup.recv() => info!("Hangup received; stopping..."), // used by tmux apparently
        }
        self.tok.cancel();
        Ok(())
    }
}

/// Drives `work` until it completes or `stop_rx` is cancelled, whichever happens first.
/// Returns `None` if stopped; `work` is dropped in that case, releasing whatever it holds.
pub async fn until_stopped<F: Future>(stop_rx: &CancellationToken, work: F) -> Option<F::Output> {
    select! {
        biased; // Stop should take prio
        _ = stop_rx.cancelled() => {
            log::trace!("Cancellation signal received while waiting.");
            None
        }
        output = work => Some(output),
    }
}
