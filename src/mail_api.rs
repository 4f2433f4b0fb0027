use futures::future::BoxFuture;

use crate::error::RemoteError;

/// One page of a message listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub message_ids: Vec<String>,
    /// Absent on the last page.
    pub next_page_token: Option<String>,
}

/// The remote operations a purge run needs from a mail provider.
///
/// Implementations map provider throttling to [`RemoteError::RateLimited`]
/// so the backoff executor can tell it apart from hard failures.
pub trait MailApi: Send + Sync {
    fn list_messages<'a>(
        &'a self,
        query: &'a str,
        page_size: u32,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MessagePage, RemoteError>>;

    /// Full representation of a message, as structured data.
    fn get_message<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, RemoteError>>;

    /// Deletes every id in one call. All-or-nothing.
    fn batch_delete<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<(), RemoteError>>;
}
