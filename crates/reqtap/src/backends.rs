//! 🔌 Backends: where the records finally stop moving.
//!
//! 🕳️ Every backend is a [`Sink`]: open a connection, prove it's alive, write one record
//! at a time, close up. That's the whole contract. No batching, no retries, no
//! swallowing errors. The ingestion worker decides what a failure means; the sink just
//! reports it, honestly, with the right [`SinkError`] flavor.
//!
//! 🎭 [`SinkBackend`] is the casting agency: one enum, one variant per backend, so the
//! worker never needs to know whether it's talking to Postgres, a file, or RAM.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use async_trait::async_trait;

use crate::app_config::SinkConfig;
use crate::error::SinkError;
use crate::record::RequestRecord;

pub mod file;
pub mod in_mem;
pub mod postgres;

// 🎯 Re-export backend configs so callers can say `backends::PostgresSinkConfig`
// instead of spelunking into `backends::postgres::PostgresSinkConfig`.
pub use file::{FileSink, FileSinkConfig};
pub use in_mem::InMemorySink;
pub use postgres::{PostgresSink, PostgresSinkConfig};

/// 🕳️ A connector to durable storage, owned by exactly one ingestion worker.
///
/// # Contract 📜
/// - `open` connects AND prepares the write path, so `write` never pays setup costs.
/// - `verify` is a liveness check on an open connection.
/// - `write` stores exactly one record. It does not retry and it does not suppress.
///   Row-level trouble is [`SinkError::Row`]; a dead connection is
///   [`SinkError::Connectivity`].
/// - `close` releases whatever `open` acquired. It is safe to call when nothing is open,
///   and safe to call twice. Problems during close are logged, not returned: there is
///   nobody left to tell.
#[async_trait]
pub trait Sink: std::fmt::Debug + Send {
    /// 🔌 Disconnected → connected-prepared.
    async fn open(&mut self) -> Result<(), SinkError>;
    /// 💓 Are you still there?
    async fn verify(&mut self) -> Result<(), SinkError>;
    /// 📥 One record in, one row out.
    async fn write(&mut self, record: &RequestRecord) -> Result<(), SinkError>;
    /// 🗑️ Back to disconnected.
    async fn close(&mut self);
}

/// 🎭 The many faces of a Sink.
///
/// The enum dispatches every call to the inner concrete type, keeping the worker
/// blissfully ignorant of where data actually lands.
#[derive(Debug)]
pub enum SinkBackend {
    InMemory(InMemorySink),
    File(FileSink),
    Postgres(PostgresSink),
}

impl SinkBackend {
    /// 🏗️ Build the backend a config describes. No I/O happens here; that's `open`'s job,
    /// and `open` is allowed to fail and be retried. Constructors are not.
    pub fn from_config(sink_config: &SinkConfig) -> Self {
        match sink_config {
            SinkConfig::InMemory => SinkBackend::InMemory(InMemorySink::new()),
            SinkConfig::File(config) => SinkBackend::File(FileSink::new(config.clone())),
            SinkConfig::Postgres(config) => SinkBackend::Postgres(PostgresSink::new(config.clone())),
        }
    }
}

#[async_trait]
impl Sink for SinkBackend {
    async fn open(&mut self) -> Result<(), SinkError> {
        match self {
            SinkBackend::InMemory(sink) => sink.open().await,
            SinkBackend::File(sink) => sink.open().await,
            SinkBackend::Postgres(sink) => sink.open().await,
        }
    }

    async fn verify(&mut self) -> Result<(), SinkError> {
        match self {
            SinkBackend::InMemory(sink) => sink.verify().await,
            SinkBackend::File(sink) => sink.verify().await,
            SinkBackend::Postgres(sink) => sink.verify().await,
        }
    }

    async fn write(&mut self, record: &RequestRecord) -> Result<(), SinkError> {
        match self {
            SinkBackend::InMemory(sink) => sink.write(record).await,
            SinkBackend::File(sink) => sink.write(record).await,
            SinkBackend::Postgres(sink) => sink.write(record).await,
        }
    }

    async fn close(&mut self) {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::File(sink) => sink.close().await,
            SinkBackend::Postgres(sink) => sink.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_each_config_gets_its_own_backend() {
        assert!(matches!(
            SinkBackend::from_config(&SinkConfig::InMemory),
            SinkBackend::InMemory(_)
        ));
        assert!(matches!(
            SinkBackend::from_config(&SinkConfig::File(FileSinkConfig {
                file_name: "out.ndjson".into(),
                flush_each_write: true,
            })),
            SinkBackend::File(_)
        ));
        assert!(matches!(
            SinkBackend::from_config(&SinkConfig::Postgres(PostgresSinkConfig {
                dsn: "postgres://localhost/analytics".into(),
                table: "request_logs".into(),
                ensure_schema: false,
                connect_timeout_secs: 10,
                write_timeout_secs: 5,
            })),
            SinkBackend::Postgres(_)
        ));
    }

    #[tokio::test]
    async fn the_one_where_dispatch_reaches_the_inner_sink() {
        let inner = InMemorySink::new();
        let mut backend = SinkBackend::InMemory(inner.clone());

        backend.open().await.expect("💀 in-memory open can't fail without being asked to");
        backend.verify().await.expect("💀 in-memory verify can't fail either");
        backend
            .write(&crate::record::tests::sample_record("/dispatch"))
            .await
            .expect("💀 write should land");
        backend.close().await;

        let records = inner.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/dispatch");
    }
}
