//! 🏷️ Sink errors: the two flavors of bad news the ingestion worker knows how to handle.
//!
//! The rest of the crate is happy with `anyhow`. The worker is not: it has to tell a
//! "this one row was cursed" apart from a "the database left the building", because one
//! means `continue` and the other means tear down, back off, and start over.

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 💀 Everything a [`Sink`](crate::backends::Sink) can fail with.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 🔌 The connection is gone, or never showed up. Reconnect required.
    #[error("sink connectivity failure: {context}")]
    Connectivity {
        context: String,
        #[source]
        source: BoxError,
    },

    /// 🧱 One record could not be written. The connection is still fine.
    #[error("sink rejected a row: {context}")]
    Row {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl SinkError {
    pub fn connectivity(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connectivity {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn row(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Row {
            context: context.into(),
            source: source.into(),
        }
    }

    /// 🧅 The message plus every cause underneath it, one layer of the onion at a time.
    pub fn detailed(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }
        message
    }

    /// 🔄 True when the worker should throw the connection away and go back to connecting.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}
