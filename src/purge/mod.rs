/// Batch purge pipeline: page through matching messages, archive, delete.
pub mod batch;
pub mod driver;
pub mod progress;

use thiserror::Error;

use crate::error::PurgeError;

pub use batch::{BatchProcessor, BatchResult};
pub use driver::{PipelineDriver, RunOutcome};
pub use progress::{LogObserver, ProgressEvent, ProgressObserver};

/// Totals accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_batches: usize,
    pub total_processed: usize,
}

impl RunSummary {
    pub fn record(&mut self, processed: usize) {
        self.total_batches += 1;
        self.total_processed += processed;
    }
}

/// A run stopped early; carries what had been done by then.
#[derive(Debug, Error)]
#[error("run aborted after {} batch(es): {source}", .summary.total_batches)]
pub struct RunAborted {
    pub summary: RunSummary,
    #[source]
    pub source: PurgeError,
}

impl RunAborted {
    pub fn new(summary: RunSummary, source: PurgeError) -> Self {
        RunAborted { summary, source }
    }
}
