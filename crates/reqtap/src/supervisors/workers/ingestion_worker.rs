//! 🎬 *[a queue fills with records. somewhere, a database is down.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[the worker does not panic. the worker has a state machine.]*
//!
//! 🗑️ The IngestionWorker: patient, tireless, and deeply unbothered by the chaos
//! upstream. It lives in one of three states:
//!
//! ```text
//!            open + verify ok
//!  Connecting ───────────────▶ Draining ──┐ row error: log, skip, keep going
//!      ▲  │                       │  ▲────┘
//!      │  │ open/verify failed    │ connection lost: close
//!      │  ▼                       ▼
//!      └── Backoff ◀──────────────┘
//!        (sleep, then retry)
//! ```
//!
//! There is no terminal state. The only way out is a closed, empty queue, which only
//! happens when the Supervisor is asked to shut down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Worker;
use crate::backends::{Sink, SinkBackend};
use crate::queue::BoundedQueue;
use crate::stats::PipelineStats;

/// ⏳ How long to wait between reconnect attempts.
///
/// `initial == max` is a fixed interval. `max > initial` doubles the wait after every
/// failed attempt until it hits `max`. A successful connect resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BackoffPolicy {
    pub(crate) initial: Duration,
    pub(crate) max: Duration,
}

impl BackoffPolicy {
    #[cfg(test)]
    pub(crate) fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            max: interval,
        }
    }

    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max).max(self.initial)
    }
}

/// 🚦 Where the worker is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Connecting,
    Draining,
    Backoff,
}

/// 🗑️ Takes records from the queue, throws them into the sink, survives the sink.
#[derive(Debug)]
pub(crate) struct IngestionWorker {
    queue: BoundedQueue,
    sink: SinkBackend,
    stats: Arc<PipelineStats>,
    backoff: BackoffPolicy,
}

impl IngestionWorker {
    pub(crate) fn new(
        queue: BoundedQueue,
        sink: SinkBackend,
        stats: Arc<PipelineStats>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            queue,
            sink,
            stats,
            backoff,
        }
    }

    /// 🔌 open, then verify. Either both work or the attempt failed.
    async fn connect(&mut self) -> Result<(), crate::error::SinkError> {
        self.sink.open().await?;
        self.sink.verify().await
    }

    async fn run(mut self) -> Result<()> {
        let mut state = WorkerState::Connecting;
        let mut delay = self.backoff.initial;
        let mut attempt: u64 = 0;

        loop {
            state = match state {
                WorkerState::Connecting => {
                    if self.queue.is_closed() && self.queue.is_empty() {
                        debug!("🏁 queue is closed and empty, no reason to keep knocking");
                        break;
                    }
                    attempt += 1;
                    match self.connect().await {
                        Ok(()) => {
                            info!(attempt, "🔌 sink connected, draining queue ({} waiting)", self.queue.len());
                            attempt = 0;
                            delay = self.backoff.initial;
                            WorkerState::Draining
                        }
                        Err(e) => {
                            self.stats.record_connect_failure();
                            error!(
                                attempt,
                                retry_in = ?delay,
                                queued = self.queue.len(),
                                "💀 could not connect to sink: {}",
                                e.detailed()
                            );
                            self.sink.close().await;
                            WorkerState::Backoff
                        }
                    }
                }
                WorkerState::Draining => {
                    // -- 😴 the one place this task is allowed to nap. everyone else is serving requests.
                    let Some(record) = self.queue.dequeue().await else {
                        debug!("🏁 queue closed and drained");
                        break;
                    };
                    match self.sink.write(&record).await {
                        Ok(()) => {
                            self.stats.record_written();
                            WorkerState::Draining
                        }
                        Err(e) if e.is_connectivity() => {
                            // -- 🪦 the record in flight goes down with the connection. at-most-once.
                            self.stats.record_write_failure();
                            self.stats.record_reconnect();
                            error!(
                                path = %record.path,
                                retry_in = ?delay,
                                "💀 lost the sink connection mid-write, reconnecting: {}",
                                e.detailed()
                            );
                            self.sink.close().await;
                            WorkerState::Backoff
                        }
                        Err(e) => {
                            self.stats.record_write_failure();
                            warn!(
                                path = %record.path,
                                method = %record.method,
                                "⚠️ failed to insert record, skipping it: {}",
                                e.detailed()
                            );
                            WorkerState::Draining
                        }
                    }
                }
                WorkerState::Backoff => {
                    debug!(?delay, "⏳ backing off before the next connect attempt");
                    tokio::time::sleep(delay).await;
                    delay = self.backoff.next(delay);
                    WorkerState::Connecting
                }
            };
        }

        self.sink.close().await;
        info!("🏁 ingestion worker finished. the queue is empty and the sink is closed.");
        Ok(())
    }
}

impl Worker for IngestionWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 IngestionWorker started draining queue...");
            self.run().await
        })
    }
}
