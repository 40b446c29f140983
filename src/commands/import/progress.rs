use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::info;

use crate::model::{ImportOutput, ProgressStatus};

/// One progress milestone. `data` is attached on the final update only.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub percentage: u8,
    pub message: String,
    pub status: ProgressStatus,
    pub elapsed_seconds: f64,
    pub data: Option<ImportOutput>,
}

/// External progress collaborator. Callers treat it as best-effort: a
/// returned error is logged and swallowed, never propagated into the run.
pub trait ProgressSink {
    fn on_progress(&self, update: ProgressUpdate) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_progress(&self, update: ProgressUpdate) -> Result<()> {
        info!(
            percentage = update.percentage,
            status = update.status.as_str(),
            elapsed_seconds = update.elapsed_seconds,
            message = %update.message,
            "progress"
        );
        Ok(())
    }
}

/// Cooperative cancellation flag, polled between edition transactions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
