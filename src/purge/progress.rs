use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::purge::RunSummary;

/// Something that happened during a run, reported as it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted {
        query: String,
        archive_dir: Option<PathBuf>,
        dry_run: bool,
    },
    /// The quota tracker asked for a pause before the next call.
    QuotaPause { operation: String, delay: Duration },
    /// A call was rate limited; the next attempt follows after `delay`.
    RateLimited {
        operation: String,
        attempt: u32,
        delay: Duration,
    },
    MessageArchived { id: String, path: PathBuf },
    BatchCompleted {
        batch: usize,
        processed: usize,
        total_processed: usize,
        dry_run: bool,
    },
    /// Fixed pause between two pages.
    Cooldown { delay: Duration },
    RunFinished { summary: RunSummary },
    RunCancelled { summary: RunSummary },
    RunFailed { summary: RunSummary, error: String },
}

/// Receives progress events from the driver, batch processor and executor.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Writes every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                query,
                archive_dir,
                dry_run,
            } => {
                if *dry_run {
                    info!(
                        "🧪 Dry run: listing messages matching '{}' (nothing is deleted)",
                        query
                    );
                } else {
                    info!("🚀 Purging messages matching '{}'", query);
                }
                match archive_dir {
                    Some(dir) => info!("📁 Archiving to {:?}", dir),
                    None => info!("📁 Archiving disabled"),
                }
            }
            ProgressEvent::QuotaPause { operation, delay } => {
                warn!(
                    "⏸️  Request quota reached before {}, pausing {:?}",
                    operation, delay
                );
            }
            ProgressEvent::RateLimited {
                operation,
                attempt,
                delay,
            } => {
                warn!(
                    "⚠️  {} rate limited (attempt {}), retrying in {:?}",
                    operation, attempt, delay
                );
            }
            ProgressEvent::MessageArchived { id, path } => {
                debug!("Message {} archived to {:?}", id, path);
            }
            ProgressEvent::BatchCompleted {
                batch,
                processed,
                total_processed,
                dry_run,
            } => {
                let verb = if *dry_run { "matched" } else { "deleted" };
                info!(
                    "📦 Batch {}: {} message(s) {} ({} so far)",
                    batch, processed, verb, total_processed
                );
            }
            ProgressEvent::Cooldown { delay } => {
                debug!("Waiting {:?} before next batch", delay);
            }
            ProgressEvent::RunFinished { summary } => {
                info!(
                    "✅ Done: {} batch(es), {} message(s) processed",
                    summary.total_batches, summary.total_processed
                );
            }
            ProgressEvent::RunCancelled { summary } => {
                warn!(
                    "🛑 Cancelled after {} batch(es), {} message(s) processed",
                    summary.total_batches, summary.total_processed
                );
            }
            ProgressEvent::RunFailed { summary, error } => {
                error!(
                    "❌ Run aborted after {} batch(es), {} message(s) processed: {}",
                    summary.total_batches, summary.total_processed, error
                );
            }
        }
    }
}
