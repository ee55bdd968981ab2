//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where requests never stop coming..."
//! 🎬 "One supervisor made sure somebody wrote them down."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor owns the pipeline: the queue, the stats, and the one background
//! worker that drains the queue into the sink. Request handlers never see any of that.
//! They get a [`TelemetryHandle`] (or a [`TelemetryLayer`] wrapped around it) and a
//! promise that offering a record will never make them wait.
//!
//! ⚠️ The workers module stays private. Nobody outside this file gets to poke the
//! worker directly. Like Fight Club, but for async tasks.

mod workers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app_config::{AppConfig, RuntimeConfig};
use crate::backends::SinkBackend;
use crate::interceptor::TelemetryLayer;
use crate::queue::BoundedQueue;
use crate::record::RequestRecord;
use crate::stats::{PipelineStats, StatsSnapshot};
use workers::{BackoffPolicy, IngestionWorker, Worker};

/// 🎟️ The producer side of the pipeline. Clone it into as many handlers as you like.
///
/// [`TelemetryHandle::offer`] is the whole API: one non-blocking attempt to enqueue a
/// record. A full queue means the record is dropped, counted, and logged. That's it.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    queue: BoundedQueue,
    stats: Arc<PipelineStats>,
}

impl TelemetryHandle {
    pub(crate) fn new(queue: BoundedQueue, stats: Arc<PipelineStats>) -> Self {
        Self { queue, stats }
    }

    /// 🚪 Try to hand a record to the worker. Returns `true` if it was queued.
    ///
    /// Never blocks, never retries. A dropped record costs one counter bump and one
    /// warning, and the request that produced it carries on as if nothing happened.
    pub fn offer(&self, record: RequestRecord) -> bool {
        if self.queue.try_enqueue(record) {
            self.stats.record_enqueued();
            return true;
        }

        self.stats.record_dropped();
        if self.queue.is_closed() {
            warn!("🗑️ telemetry queue closed for shutdown, data discarded");
        } else {
            warn!("🗑️ telemetry queue full, data discarded");
        }
        false
    }

    /// 📊 Counters as of right now.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// 📦 The Supervisor: starts the ingestion worker, hands out handles, and on the way
/// out asks the worker (nicely, then not nicely) to finish up.
///
/// Dropping it without calling [`Supervisor::shutdown`] still closes the queue, so the
/// worker drains what is left and exits on its own. Nobody waits for it though, and a
/// sink that never comes back keeps it retrying until the runtime goes away.
#[derive(Debug)]
pub struct Supervisor {
    handle: TelemetryHandle,
    worker: JoinHandle<Result<()>>,
    shutdown_grace: Duration,
}

impl Supervisor {
    /// 🚀 Build the sink described by `app_config` and start draining into it.
    ///
    /// No connection is made here. The worker connects in the background, so a sink
    /// that is down at startup does not stop the collector from starting. Must be
    /// called from inside a tokio runtime.
    pub fn start(app_config: &AppConfig) -> Result<Self> {
        app_config
            .validate()
            .context("💀 refusing to start the pipeline with an invalid configuration")?;
        let sink = SinkBackend::from_config(&app_config.sink_config);
        Self::start_with_sink(sink, &app_config.runtime)
    }

    /// 🔧 Same as [`Supervisor::start`], but with a sink you built yourself. Handy when
    /// you want to keep a clone of an [`InMemorySink`](crate::backends::InMemorySink).
    pub fn start_with_sink(sink: SinkBackend, runtime: &RuntimeConfig) -> Result<Self> {
        runtime.validate()?;

        let queue = BoundedQueue::new(runtime.queue_capacity);
        let stats = Arc::new(PipelineStats::new());
        let backoff = BackoffPolicy {
            initial: runtime.backoff(),
            max: runtime.max_backoff(),
        };

        info!(
            capacity = runtime.queue_capacity,
            backoff = ?backoff.initial,
            "🚀 starting ingestion worker"
        );
        let worker = IngestionWorker::new(queue.clone(), sink, stats.clone(), backoff).start();

        Ok(Self {
            handle: TelemetryHandle::new(queue, stats),
            worker,
            shutdown_grace: runtime.shutdown_grace(),
        })
    }

    /// 🎟️ A producer handle. Cheap to clone.
    pub fn handle(&self) -> TelemetryHandle {
        self.handle.clone()
    }

    /// 🧅 A tower layer that records every request passing through it.
    pub fn layer(&self) -> TelemetryLayer {
        TelemetryLayer::new(self.handle())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.handle.stats()
    }

    /// 🧹 Shut down with the configured grace period.
    pub async fn shutdown(self) -> StatsSnapshot {
        let grace = self.shutdown_grace;
        self.shutdown_within(grace).await
    }

    /// 🧹 Close the queue, give the worker `grace` to drain what's left, then pull the
    /// plug. Records still queued when the plug gets pulled are lost.
    pub async fn shutdown_within(mut self, grace: Duration) -> StatsSnapshot {
        self.handle.queue.close();
        info!(
            pending = self.handle.queue.len(),
            ?grace,
            "🧹 telemetry queue closed, waiting for the worker to drain"
        );

        match tokio::time::timeout(grace, &mut self.worker).await {
            Ok(Ok(Ok(()))) => info!("🏁 ingestion worker drained and stopped"),
            Ok(Ok(Err(e))) => warn!("💀 ingestion worker stopped with an error: {e:#}"),
            Ok(Err(join_err)) => warn!("💀 ingestion worker task died: {join_err}"),
            Err(_) => {
                warn!(
                    pending = self.handle.queue.len(),
                    "⏰ ingestion worker did not drain within {grace:?}, aborting it"
                );
                self.worker.abort();
            }
        }

        self.stats()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // -- 🚪 no-op after a shutdown. otherwise it's the worker's cue to finish up and leave.
        if self.handle.queue.close() {
            debug!("🧹 supervisor dropped without shutdown, closing the telemetry queue");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemorySink;
    use crate::record::tests::sample_record;

    fn runtime(capacity: usize) -> RuntimeConfig {
        RuntimeConfig {
            queue_capacity: capacity,
            ..RuntimeConfig::default()
        }
    }

    #[tokio::test]
    async fn the_one_where_a_full_queue_drops_and_counts() {
        let sink = InMemorySink::new();
        sink.hang_writes(true);
        let supervisor = Supervisor::start_with_sink(SinkBackend::InMemory(sink), &runtime(2))
            .expect("💀 supervisor should start");
        let handle = supervisor.handle();

        // -- the worker grabs at most one record and then hangs on it forever
        let accepted = (0..10)
            .filter(|i| handle.offer(sample_record(&format!("/{i}"))))
            .count();

        let stats = handle.stats();
        assert!(accepted >= 2 && accepted <= 3, "accepted {accepted}");
        assert_eq!(stats.enqueued as usize, accepted);
        assert_eq!(stats.dropped as usize, 10 - accepted);

        let _ = supervisor.shutdown_within(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn the_one_where_shutdown_drains_what_was_queued() {
        let sink = InMemorySink::new();
        let supervisor =
            Supervisor::start_with_sink(SinkBackend::InMemory(sink.clone()), &runtime(16))
                .expect("💀 supervisor should start");
        let handle = supervisor.handle();
        for path in ["/a", "/b", "/c"] {
            assert!(handle.offer(sample_record(path)));
        }

        let stats = supervisor.shutdown_within(Duration::from_secs(5)).await;

        assert_eq!(stats.written, 3);
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(sink.records().await.len(), 3);
        assert!(!handle.offer(sample_record("/too-late")), "closed queue takes no records");
        assert_eq!(handle.stats().dropped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_shutdown_gives_up_on_a_dead_sink() {
        let sink = InMemorySink::new();
        sink.fail_next_opens(u64::MAX);
        let supervisor = Supervisor::start_with_sink(SinkBackend::InMemory(sink), &runtime(16))
            .expect("💀 supervisor should start");
        assert!(supervisor.handle().offer(sample_record("/stranded")));

        let stats = supervisor.shutdown_within(Duration::from_secs(12)).await;

        assert_eq!(stats.written, 0);
        assert_eq!(stats.in_flight(), 1);
        assert!(stats.connect_failures >= 2);
    }

    #[tokio::test]
    async fn the_one_where_a_forgotten_supervisor_still_lets_the_worker_go_home() {
        let sink = InMemorySink::new();
        let supervisor =
            Supervisor::start_with_sink(SinkBackend::InMemory(sink.clone()), &runtime(16))
                .expect("💀 supervisor should start");
        let handle = supervisor.handle();
        for path in ["/a", "/b"] {
            assert!(handle.offer(sample_record(path)));
        }

        drop(supervisor);

        assert!(!handle.offer(sample_record("/after-drop")), "the queue closes with the supervisor");
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.stats().written < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("💀 the worker should drain what was queued before the drop");
        assert_eq!(sink.records().await.len(), 2);
    }

    #[test]
    fn the_one_where_bad_runtime_config_never_gets_a_worker() {
        let sink = SinkBackend::InMemory(InMemorySink::new());
        assert!(Supervisor::start_with_sink(sink, &runtime(0)).is_err());
    }
}
