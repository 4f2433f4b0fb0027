// Library exports for the gmail-purge crate
// This allows tests and the binary to use the modules

pub mod archiver;
pub mod backoff;
pub mod config;
pub mod error;
pub mod gmail_client;
pub mod mail_api;
pub mod quota;

// Batch pipeline: processor, driver, progress reporting
pub mod purge;

pub use crate::config::{Config, Limits, PurgeConfig};
pub use error::{PurgeError, RemoteError};
pub use mail_api::{MailApi, MessagePage};
pub use purge::{PipelineDriver, RunOutcome, RunSummary};
