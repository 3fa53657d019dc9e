//! Background synchronization.
//!
//! [`BackgroundWorker`] owns one spawned task that interleaves queued
//! requests with a periodic tick. [`SyncRunnable`] plugs the operation
//! facade into it: every tick runs `synchronize_all`, and a
//! [`SyncRequest`] runs one round on demand, optionally acknowledging when
//! it is done.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::aggregator::OperationApi;

/// Requests that may wait in the queue before `submit` applies backpressure.
const QUEUE_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Work driven by a [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    /// Handles one queued task.
    async fn run(&mut self, task: Self::Task);

    /// Periodic work. Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Runs once after the queue has been drained on stop. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// SyncRequest / SyncRunnable
// ---------------------------------------------------------------------------

/// One on-demand synchronization round.
#[derive(Debug)]
pub struct SyncRequest {
    /// Provider to synchronize; `None` means every provider.
    pub provider: Option<String>,
    done: Option<oneshot::Sender<()>>,
}

impl SyncRequest {
    #[must_use]
    pub fn all() -> Self {
        Self {
            provider: None,
            done: None,
        }
    }

    #[must_use]
    pub fn provider(name: impl Into<String>) -> Self {
        Self {
            provider: Some(name.into()),
            done: None,
        }
    }

    /// Attaches an acknowledgment, resolved once the round has run.
    #[must_use]
    pub fn acknowledged(mut self) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        self.done = Some(tx);
        (self, rx)
    }
}

/// Synchronizes the facade's providers on each tick and on request.
pub struct SyncRunnable {
    api: Arc<OperationApi>,
}

impl SyncRunnable {
    #[must_use]
    pub fn new(api: Arc<OperationApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BackgroundRunnable for SyncRunnable {
    type Task = SyncRequest;

    async fn run(&mut self, request: SyncRequest) {
        match &request.provider {
            None => self.api.synchronize_all().await,
            Some(name) => match self.api.provider(name) {
                Some(provider) => {
                    if let Err(e) = provider.synchronize().await {
                        warn!(provider = %name, error = %e, "provider synchronization failed");
                    }
                }
                None => debug!(provider = %name, "synchronize requested for unknown provider"),
            },
        }
        if let Some(done) = request.done {
            let _ = done.send(());
        }
    }

    async fn on_tick(&mut self) {
        self.api.synchronize_all().await;
    }
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Spawned loop feeding a [`BackgroundRunnable`].
///
/// The first tick fires one full period after start. Queued tasks take
/// precedence over a due tick; a tick that overruns delays the next one.
/// Stopping closes the queue, lets the loop finish what is already queued,
/// then runs `shutdown`.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    queue: Option<mpsc::Sender<R::Task>>,
    handle: Option<JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the loop. A zero interval is treated as one millisecond.
    pub fn start(mut runnable: R, tick_interval_ms: u64) -> Self {
        let (queue, mut inbox) = mpsc::channel::<R::Task>(QUEUE_DEPTH);
        let period = Duration::from_millis(tick_interval_ms.max(1));

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    task = inbox.recv() => match task {
                        Some(task) => runnable.run(task).await,
                        None => break,
                    },
                    _ = ticks.tick() => runnable.on_tick().await,
                }
            }
            runnable.shutdown().await;
        });

        Self {
            queue: Some(queue),
            handle: Some(handle),
        }
    }

    /// Queues `task`, waiting for room if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        let Some(queue) = &self.queue else {
            anyhow::bail!("worker not running");
        };
        queue
            .send(task)
            .await
            .map_err(|_| anyhow::anyhow!("worker loop has exited"))
    }

    /// Closes the queue and waits for the loop to drain and exit.
    pub async fn stop(&mut self) {
        self.queue.take();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "background worker ended abnormally");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
