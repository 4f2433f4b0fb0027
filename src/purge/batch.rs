use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::archiver::Archiver;
use crate::backoff::{pause, BackoffExecutor};
use crate::config::{Limits, PurgeConfig};
use crate::error::PurgeError;
use crate::mail_api::MailApi;
use crate::purge::progress::{ProgressEvent, ProgressObserver};
use crate::purge::{RunAborted, RunSummary};
use crate::quota::{Clock, TokioClock};

/// Outcome of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub processed_count: usize,
    /// `None` ends the run.
    pub next_page_token: Option<String>,
}

/// Walks the listing page by page: archive every message, then delete the page.
pub struct BatchProcessor<'a, A: MailApi, C: Clock = TokioClock> {
    api: &'a A,
    config: &'a PurgeConfig,
    limits: &'a Limits,
    executor: BackoffExecutor<C>,
    archiver: Option<Archiver>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl<'a, A: MailApi, C: Clock> BatchProcessor<'a, A, C> {
    pub fn new(
        api: &'a A,
        config: &'a PurgeConfig,
        limits: &'a Limits,
        executor: BackoffExecutor<C>,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancellationToken,
    ) -> Self {
        let archiver = config.archives().then(|| Archiver::new(&config.archive_dir));

        BatchProcessor {
            api,
            config,
            limits,
            executor,
            archiver,
            observer,
            cancel,
        }
    }

    /// Processes pages until one comes back without a next page token.
    pub async fn run(mut self) -> Result<RunSummary, RunAborted> {
        let query = self.config.query();
        let mut summary = RunSummary::default();
        let mut page_token: Option<String> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(RunAborted::new(summary, PurgeError::Cancelled));
            }
            if self.batch_limit_reached(&summary) {
                break;
            }

            let batch = match self.process_batch(&query, page_token.as_deref()).await {
                Ok(batch) => batch,
                Err(e) => return Err(RunAborted::new(summary, e)),
            };

            summary.record(batch.processed_count);
            self.observer.on_event(&ProgressEvent::BatchCompleted {
                batch: summary.total_batches,
                processed: batch.processed_count,
                total_processed: summary.total_processed,
                dry_run: self.config.dry_run,
            });

            let Some(token) = batch.next_page_token else {
                debug!("No next page token, listing exhausted");
                break;
            };

            if self.batch_limit_reached(&summary) {
                break;
            }

            let delay = self.limits.batch_cooldown;
            self.observer.on_event(&ProgressEvent::Cooldown { delay });
            if let Err(e) = pause(&self.cancel, delay).await {
                return Err(RunAborted::new(summary, e));
            }

            page_token = Some(token);
        }

        Ok(summary)
    }

    /// Checked before every page, so a limit of zero lists and deletes nothing.
    fn batch_limit_reached(&self, summary: &RunSummary) -> bool {
        match self.config.max_batches {
            Some(max) if summary.total_batches >= max => {
                info!("Stopping after {} batch(es) (--max-batches)", summary.total_batches);
                true
            }
            _ => false,
        }
    }

    /// Lists one page, archives its messages in order, then deletes them in one call.
    pub async fn process_batch(
        &mut self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<BatchResult, PurgeError> {
        let api = self.api;
        let page_size = self.limits.page_size;

        let page = self
            .executor
            .execute("messages.list", move || api.list_messages(query, page_size, page_token))
            .await?;

        let ids = page.message_ids;
        let next_page_token = page.next_page_token;

        if ids.is_empty() {
            debug!("Empty page (next page token present: {})", next_page_token.is_some());
            return Ok(BatchResult {
                processed_count: 0,
                next_page_token,
            });
        }

        if self.config.dry_run {
            return Ok(BatchResult {
                processed_count: ids.len(),
                next_page_token,
            });
        }

        // One at a time: keeps the request rate flat, and every message of
        // the page is on disk before the delete below.
        if let Some(archiver) = &self.archiver {
            for id in &ids {
                let path = archiver.archive(api, &mut self.executor, id).await?;
                self.observer.on_event(&ProgressEvent::MessageArchived {
                    id: id.clone(),
                    path,
                });
            }
        }

        let to_delete: &[String] = &ids;
        self.executor
            .execute("messages.batchDelete", move || api.batch_delete(to_delete))
            .await?;

        debug!("Deleted {} message(s)", ids.len());

        Ok(BatchResult {
            processed_count: ids.len(),
            next_page_token,
        })
    }
}
