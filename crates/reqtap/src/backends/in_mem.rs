//! # Previously, on reqtap...
//!
//! 🎬 The records were trapped. Somebody had to catch them. Somebody had to write a
//! backend so simple it lives entirely in RAM, gone the moment you blink.
//!
//! That someone was this module.
//!
//! [`InMemorySink`] collects written records behind an `Arc<Mutex<...>>` so callers can
//! inspect what arrived. Clone it before handing it to the pipeline and you keep a
//! window into the vault.
//!
//! 🎭 It also takes requests for misbehaviour: fail the next few opens, refuse certain
//! rows, pretend the connection died, or hang forever on write. Outages on demand.
//! Every chaos engineer's dream, minus the pager.
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please also deploy
//! a therapist.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::Sink;
use crate::error::SinkError;
use crate::record::RequestRecord;

/// 🎭 Misbehaviour on request. Shared between every clone of the sink.
#[derive(Debug, Default)]
struct FaultPlan {
    failing_opens: AtomicU64,
    failing_verify: AtomicBool,
    hanging_writes: AtomicBool,
    rejected_path: Mutex<Option<String>>,
    disconnect_path: Mutex<Option<String>>,
}

/// 📦 A sink that never forgets (until the process exits).
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    /// 🔒 The vault. The evidence locker. The "I told you I received that record" proof.
    received: Arc<Mutex<Vec<RequestRecord>>>,
    faults: Arc<FaultPlan>,
    open_attempts: Arc<AtomicU64>,
    /// 🔌 per-instance, not shared: only the worker's copy ever opens.
    connected: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 📋 Everything written so far, in write order.
    pub async fn records(&self) -> Vec<RequestRecord> {
        self.received.lock().await.clone()
    }

    /// 🔢 How many times somebody tried to open this sink, successful or not.
    pub fn open_attempts(&self) -> u64 {
        self.open_attempts.load(Ordering::Relaxed)
    }

    /// 💀 The next `count` calls to `open` fail with a connectivity error.
    pub fn fail_next_opens(&self, count: u64) {
        self.faults.failing_opens.store(count, Ordering::Relaxed);
    }

    /// 💀 While `true`, `verify` reports the connection as dead.
    pub fn fail_verify(&self, failing: bool) {
        self.faults.failing_verify.store(failing, Ordering::Relaxed);
    }

    /// 🐌 While `true`, `write` never returns. The sink equivalent of "let me get back to you".
    pub fn hang_writes(&self, hanging: bool) {
        self.faults.hanging_writes.store(hanging, Ordering::Relaxed);
    }

    /// 🧱 Records with this exact path are refused as bad rows.
    pub async fn reject_rows_with_path(&self, path: impl Into<String>) {
        *self.faults.rejected_path.lock().await = Some(path.into());
    }

    /// 🔌 A record with this exact path kills the "connection" instead of being written.
    pub async fn disconnect_on_path(&self, path: impl Into<String>) {
        *self.faults.disconnect_path.lock().await = Some(path.into());
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn open(&mut self) -> Result<(), SinkError> {
        self.open_attempts.fetch_add(1, Ordering::Relaxed);
        let failing = self.faults.failing_opens.load(Ordering::Relaxed);
        if failing > 0 {
            self.faults.failing_opens.store(failing - 1, Ordering::Relaxed);
            return Err(SinkError::connectivity(
                "in-memory open",
                std::io::Error::other("connection refused (simulated)"),
            ));
        }
        self.connected = true;
        Ok(())
    }

    async fn verify(&mut self) -> Result<(), SinkError> {
        if !self.connected || self.faults.failing_verify.load(Ordering::Relaxed) {
            return Err(SinkError::connectivity(
                "in-memory verify",
                std::io::Error::other("ping went unanswered (simulated)"),
            ));
        }
        Ok(())
    }

    async fn write(&mut self, record: &RequestRecord) -> Result<(), SinkError> {
        if !self.connected {
            return Err(SinkError::connectivity(
                "in-memory write",
                std::io::Error::other("sink is not open"),
            ));
        }
        if self.faults.hanging_writes.load(Ordering::Relaxed) {
            // -- 🐌 the write path has left the chat. it will not be back.
            futures::future::pending::<()>().await;
        }
        if self.faults.disconnect_path.lock().await.as_deref() == Some(record.path.as_str()) {
            self.connected = false;
            return Err(SinkError::connectivity(
                "in-memory write",
                std::io::Error::other("connection reset by peer (simulated)"),
            ));
        }
        if self.faults.rejected_path.lock().await.as_deref() == Some(record.path.as_str()) {
            return Err(SinkError::row(
                format!("in-memory write of {}", record.path),
                "row rejected (simulated)",
            ));
        }

        trace!("📥 in-memory sink stashing {} {}", record.method, record.path);
        self.received.lock().await.push(record.clone());
        Ok(())
    }

    async fn close(&mut self) {
        // 🗑️ Cleanup routine: flip one bool. We live in RAM. The OS handles the rest.
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_record;

    #[tokio::test]
    async fn the_one_where_writes_before_open_are_turned_away() {
        let mut sink = InMemorySink::new();
        let err = sink.write(&sample_record("/early")).await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(sink.records().await.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_the_outage_runs_out_of_steam() {
        let mut sink = InMemorySink::new();
        sink.fail_next_opens(2);

        assert!(sink.open().await.is_err());
        assert!(sink.open().await.is_err());
        assert!(sink.open().await.is_ok());
        assert_eq!(sink.open_attempts(), 3);
        assert!(sink.verify().await.is_ok());
    }

    #[tokio::test]
    async fn the_one_where_one_bad_row_is_just_one_bad_row() {
        let mut sink = InMemorySink::new();
        sink.reject_rows_with_path("/cursed").await;
        sink.open().await.unwrap();

        let err = sink.write(&sample_record("/cursed")).await.unwrap_err();
        assert!(!err.is_connectivity());
        sink.write(&sample_record("/fine")).await.unwrap();

        let paths: Vec<_> = sink.records().await.into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/fine"]);
    }

    #[tokio::test]
    async fn the_one_where_the_connection_dies_mid_stream() {
        let mut sink = InMemorySink::new();
        sink.disconnect_on_path("/boom").await;
        sink.open().await.unwrap();

        assert!(sink.write(&sample_record("/boom")).await.unwrap_err().is_connectivity());
        assert!(sink.verify().await.is_err(), "a dead connection should not verify");
        assert!(sink.write(&sample_record("/after")).await.unwrap_err().is_connectivity());
    }

    #[tokio::test]
    async fn the_one_where_clones_share_the_vault() {
        let observer = InMemorySink::new();
        let mut worker_copy = observer.clone();
        worker_copy.open().await.unwrap();
        worker_copy.write(&sample_record("/shared")).await.unwrap();
        assert_eq!(observer.records().await.len(), 1);
    }
}
