//! Fixed-interval background refresh with explicit cancellation.
//!
//! While the gate reports offline the scheduler keeps ticking, but each tick
//! is a [`TickKind::Reconnect`]: a single cheap attempt that brings the gate back
//! online once the provider answers again.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Conditions under which automatic refresh may fire.
#[derive(Debug, Clone)]
pub struct RefreshGate {
    visible: Arc<AtomicBool>,
    online: Arc<AtomicBool>,
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self {
            visible: Arc::new(AtomicBool::new(true)),
            online: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn allows_refresh(&self) -> bool {
        self.is_visible() && self.is_online()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Full refresh with retries.
    Refresh,
    /// Connectivity check while offline.
    Reconnect,
}

/// One automatic refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTick {
    pub at: Instant,
    pub kind: TickKind,
}

/// Background task emitting [`RefreshTick`]s while the gate is open.
#[derive(Debug)]
pub struct RefreshScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Start ticking every `interval`; the first tick comes one interval from now.
    /// Nothing is emitted while the gate reports hidden.
    pub fn spawn(interval: Duration, gate: RefreshGate) -> (Self, mpsc::Receiver<RefreshTick>) {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let at = tokio::select! {
                    _ = token.cancelled() => break,
                    at = ticker.tick() => at,
                };

                if !gate.is_visible() {
                    debug!("Skipping automatic refresh while hidden");
                    continue;
                }
                let kind = if gate.is_online() {
                    TickKind::Refresh
                } else {
                    debug!("Offline, checking connectivity");
                    TickKind::Reconnect
                };

                // A full channel means a refresh is already pending.
                match tx.try_send(RefreshTick { at, kind }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => debug!("Refresh already pending"),
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            info!("Refresh scheduler stopped");
        });

        (Self { cancel, handle: Some(handle) }, rx)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the timer and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
