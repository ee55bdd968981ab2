//! 📁 FileSink: one request, one line of NDJSON, appended to a file.
//!
//! The poor person's durable storage. No schema, no server, no DBA, no problem.
//! Handy for local development, for shipping logs to something that tails files, and
//! for proving the pipeline works without spinning up a database.

use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{trace, warn};

use crate::backends::Sink;
use crate::error::SinkError;
use crate::record::RequestRecord;

// -- 🚰 FileSinkConfig lives next to its FileSink bestie. One backend, one config, one file.
#[derive(Debug, Deserialize, Clone)]
pub struct FileSinkConfig {
    pub file_name: String,
    /// 💧 Flush the BufWriter after every record. Turn off to trade durability for fewer syscalls.
    #[serde(default = "default_flush_each_write")]
    pub flush_each_write: bool,
}

fn default_flush_each_write() -> bool {
    true
}

impl FileSinkConfig {
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.file_name.trim().is_empty() {
            bail!("💀 sink_config.File.file_name is required. We can't append to a file with no name.");
        }
        Ok(())
    }
}

/// 🚰 Appends records to a file, one JSON object per line.
///
/// ⚠️ Opens in append mode. Unlike some sinks we could mention, this one never truncates.
/// Restarting the collector adds to the story, it doesn't rewrite it.
#[derive(Debug)]
pub struct FileSink {
    config: FileSinkConfig,
    file_buf: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(config: FileSinkConfig) -> Self {
        Self {
            config,
            file_buf: None,
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.file_name)
            .await
            .map_err(|e| {
                SinkError::connectivity(
                    format!("💀 could not open sink file '{}' for appending", self.config.file_name),
                    e,
                )
            })?;
        self.file_buf = Some(BufWriter::new(file));
        Ok(())
    }

    async fn verify(&mut self) -> Result<(), SinkError> {
        if self.file_buf.is_none() {
            return Err(SinkError::connectivity(
                "file sink verify",
                std::io::Error::other("sink file is not open"),
            ));
        }
        // -- 💓 the file handle can outlive the file. make sure the path still points somewhere.
        tokio::fs::metadata(&self.config.file_name)
            .await
            .map(|_| ())
            .map_err(|e| {
                SinkError::connectivity(
                    format!("💀 sink file '{}' vanished from under us", self.config.file_name),
                    e,
                )
            })
    }

    async fn write(&mut self, record: &RequestRecord) -> Result<(), SinkError> {
        let Some(file_buf) = self.file_buf.as_mut() else {
            return Err(SinkError::connectivity(
                "file sink write",
                std::io::Error::other("sink file is not open"),
            ));
        };

        let mut line = serde_json::to_vec(record)
            .map_err(|e| SinkError::row(format!("could not serialize record for {}", record.path), e))?;
        line.push(b'\n');

        trace!("📬 {} bytes walked into the file sink", line.len());
        file_buf
            .write_all(&line)
            .await
            .map_err(|e| SinkError::connectivity("file sink write", e))?;
        if self.config.flush_each_write {
            file_buf
                .flush()
                .await
                .map_err(|e| SinkError::connectivity("file sink flush", e))?;
        }
        Ok(())
    }

    async fn close(&mut self) {
        // -- 🎬 final flush. the BufWriter empties its soul to disk. the orchestra swells.
        if let Some(mut file_buf) = self.file_buf.take() {
            if let Err(e) = file_buf.flush().await {
                warn!(error = %e, "💀 final flush of sink file '{}' failed; the last records may be gone", self.config.file_name);
            }
        }
    }
}
