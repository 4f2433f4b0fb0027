use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use log::info;
use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffExecutor;
use crate::config::{Limits, PurgeConfig};
use crate::error::PurgeError;
use crate::mail_api::MailApi;
use crate::purge::batch::BatchProcessor;
use crate::purge::progress::{LogObserver, ProgressEvent, ProgressObserver};
use crate::purge::{RunAborted, RunSummary};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Cancelled(RunSummary),
    Failed { summary: RunSummary, error: PurgeError },
}

impl RunOutcome {
    pub fn summary(&self) -> RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Cancelled(summary) => *summary,
            RunOutcome::Failed { summary, .. } => *summary,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// 0 on completion, 130 on cancellation, 1 on failure.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunOutcome::Completed(_) => ExitCode::SUCCESS,
            RunOutcome::Cancelled(_) => ExitCode::from(130),
            RunOutcome::Failed { .. } => ExitCode::FAILURE,
        }
    }
}

/// Top-level entry point of a purge run.
pub struct PipelineDriver<A: MailApi> {
    api: A,
    config: PurgeConfig,
    limits: Limits,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl<A: MailApi> PipelineDriver<A> {
    pub fn new(api: A, config: PurgeConfig, limits: Limits) -> Self {
        PipelineDriver {
            api,
            config,
            limits,
            observer: Arc::new(LogObserver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs to completion. Errors are reported to the observer and returned
    /// in the outcome, never raised.
    pub async fn run(&self) -> RunOutcome {
        self.observer.on_event(&ProgressEvent::RunStarted {
            query: self.config.query(),
            archive_dir: self.config.archives().then(|| self.config.archive_dir.clone()),
            dry_run: self.config.dry_run,
        });

        let outcome = match self.run_batches().await {
            Ok(summary) => RunOutcome::Completed(summary),
            Err(RunAborted {
                summary,
                source: PurgeError::Cancelled,
            }) => RunOutcome::Cancelled(summary),
            Err(RunAborted { summary, source }) => RunOutcome::Failed {
                summary,
                error: source,
            },
        };

        let event = match &outcome {
            RunOutcome::Completed(summary) => ProgressEvent::RunFinished { summary: *summary },
            RunOutcome::Cancelled(summary) => ProgressEvent::RunCancelled { summary: *summary },
            RunOutcome::Failed { summary, error } => ProgressEvent::RunFailed {
                summary: *summary,
                error: error.to_string(),
            },
        };
        self.observer.on_event(&event);

        outcome
    }

    async fn run_batches(&self) -> Result<RunSummary, RunAborted> {
        if self.config.archives() {
            info!("Ensuring archive directory {:?} exists", self.config.archive_dir);
            fs::create_dir_all(&self.config.archive_dir).map_err(|source| {
                RunAborted::new(
                    RunSummary::default(),
                    PurgeError::ArchiveDir {
                        path: self.config.archive_dir.clone(),
                        source,
                    },
                )
            })?;
        }

        let executor =
            BackoffExecutor::new(&self.limits, self.observer.clone(), self.cancel.clone());
        let processor = BatchProcessor::new(
            &self.api,
            &self.config,
            &self.limits,
            executor,
            self.observer.clone(),
            self.cancel.clone(),
        );

        processor.run().await
    }
}
