//! Worker Lifecycle
//!
//! Shared state machine and background task plumbing for the pull and push
//! workers: `Idle -> Running -> Stopping -> Stopped`. The stop signal is only
//! observed while waiting for the next tick, so stopping never interrupts a
//! cycle in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Worker state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet started
    Idle,
    /// Timer loop active
    Running,
    /// Stop requested, waiting for the loop to exit
    Stopping,
    /// Loop exited
    Stopped,
}

/// Observable state cell shared between a worker task and its handle
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<WorkerState>>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(WorkerState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> WorkerState {
        *self.tx.borrow()
    }

    pub fn set(&self, state: WorkerState) {
        self.tx.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.tx.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A spawned timer loop and the means to stop it
pub(crate) struct TimerTask {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    state: StateCell,
}

impl TimerTask {
    /// Spawn a loop that waits `interval`, runs `cycle`, and repeats until
    /// stopped. `on_exit` runs once after the loop ends.
    pub(crate) fn spawn<C, CF, E, EF>(
        worker: &'static str,
        interval: Duration,
        state: StateCell,
        mut cycle: C,
        on_exit: E,
    ) -> Self
    where
        C: FnMut() -> CF + Send + 'static,
        CF: Future<Output = ()> + Send + 'static,
        E: FnOnce() -> EF + Send + 'static,
        EF: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        state.set(WorkerState::Running);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!(worker = worker, "Stop signal received");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        cycle().await;
                    }
                }
            }
            on_exit().await;
        });

        Self {
            shutdown_tx,
            task,
            state,
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state.get()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Signal the loop and wait until it, including `on_exit`, has finished.
    pub(crate) async fn stop(self) {
        self.state.set(WorkerState::Stopping);
        // The loop may already be gone if it panicked; the join reports that.
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "Worker task ended abnormally");
        }
        self.state.set(WorkerState::Stopped);
    }
}
