//! 📡 reqtap: request telemetry that never makes a request wait.
//!
//! Wrap your service in a [`TelemetryLayer`], and every request it serves turns into a
//! [`RequestRecord`] dropped into a bounded queue. One background worker drains that
//! queue into a [`Sink`](backends::Sink) (PostgreSQL, an NDJSON file, or RAM) and
//! reconnects on its own when the sink goes away.
//!
//! Delivery is at-most-once. A full queue drops records. A dead sink loses the record
//! that was in flight. The request path never finds out about either.
//!
//! ```no_run
//! # async fn demo(app_config: reqtap::app_config::AppConfig) -> anyhow::Result<()> {
//! let supervisor = reqtap::Supervisor::start(&app_config)?;
//! let app = axum::Router::<()>::new()
//!     .route("/health", axum::routing::get(|| async { "ok" }))
//!     .layer(supervisor.layer());
//! # let _ = app;
//! let stats = supervisor.shutdown().await;
//! println!("{} written, {} dropped", stats.written, stats.dropped);
//! # Ok(())
//! # }
//! ```

pub mod app_config;
pub mod backends;
pub mod error;
pub mod interceptor;
pub mod queue;
pub mod record;
pub mod stats;
pub mod supervisors;

pub use app_config::{AppConfig, RuntimeConfig, SinkConfig, load_config};
pub use error::SinkError;
pub use interceptor::{TelemetryLayer, TelemetryService};
pub use record::RequestRecord;
pub use stats::StatsSnapshot;
pub use supervisors::{Supervisor, TelemetryHandle};
