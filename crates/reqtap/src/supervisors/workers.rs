//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! There is exactly one worker in this crate, and it has exactly one job: empty the
//! queue into the sink, and never, ever give up on the sink. 🦆
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use anyhow::Result;
use tokio::task::JoinHandle;

mod ingestion_worker;
pub(super) use ingestion_worker::{BackoffPolicy, IngestionWorker};

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    /// Mostly verify.
    fn start(self) -> JoinHandle<Result<()>>;
}
