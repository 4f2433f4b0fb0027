use std::fs;
use std::path::PathBuf;

use log::debug;

use crate::backoff::BackoffExecutor;
use crate::error::PurgeError;
use crate::mail_api::MailApi;
use crate::quota::Clock;

/// Saves full messages as pretty-printed JSON, one file per message id.
#[derive(Debug, Clone)]
pub struct Archiver {
    dir: PathBuf,
}

impl Archiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Archiver { dir: dir.into() }
    }

    /// `<dir>/<id>.json`. Path separators in the id are replaced.
    pub fn path_for(&self, message_id: &str) -> PathBuf {
        let name: String = message_id
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.json", name))
    }

    /// Fetches a message through the executor and writes it to disk.
    pub async fn archive<A, C>(
        &self,
        api: &A,
        executor: &mut BackoffExecutor<C>,
        message_id: &str,
    ) -> Result<PathBuf, PurgeError>
    where
        A: MailApi,
        C: Clock,
    {
        let message = executor
            .execute("messages.get", move || api.get_message(message_id))
            .await?;
        self.write(message_id, &message)
    }

    /// Writes `message` for `message_id`, replacing any earlier copy.
    pub fn write(
        &self,
        message_id: &str,
        message: &serde_json::Value,
    ) -> Result<PathBuf, PurgeError> {
        let path = self.path_for(message_id);

        let content = serde_json::to_vec_pretty(message).map_err(|source| PurgeError::Encode {
            id: message_id.to_string(),
            source,
        })?;

        fs::write(&path, content).map_err(|source| PurgeError::Archive {
            id: message_id.to_string(),
            path: path.clone(),
            source,
        })?;

        debug!("Message {} saved to {:?}", message_id, path);
        Ok(path)
    }
}
