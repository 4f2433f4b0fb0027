// Shared helpers for the integration tests: an in-memory mailbox and a
// recording observer writing into the same journal.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use futures::future::BoxFuture;
use serde_json::json;

use gmail_purge::purge::{ProgressEvent, ProgressObserver};
use gmail_purge::{MailApi, MessagePage, PurgeConfig, RemoteError};

/// Everything the stub and the observer saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { query: String, page_token: Option<String> },
    Get(String),
    Delete(Vec<String>),
    Archived(String),
}

pub type Journal = Arc<Mutex<Vec<Call>>>;

/// Mailbox serving fixed pages; tokens are `page-<index>`.
pub struct StubMailbox {
    pages: Vec<Vec<String>>,
    journal: Journal,
    rate_limited_lists: AtomicU32,
    failing_delete: Option<usize>,
    delete_calls: AtomicU32,
}

impl StubMailbox {
    pub fn new(pages: Vec<Vec<&str>>) -> Self {
        StubMailbox {
            pages: pages
                .into_iter()
                .map(|page| page.into_iter().map(String::from).collect())
                .collect(),
            journal: Arc::new(Mutex::new(Vec::new())),
            rate_limited_lists: AtomicU32::new(0),
            failing_delete: None,
            delete_calls: AtomicU32::new(0),
        }
    }

    /// `n` pages of `per_page` messages each.
    pub fn with_pages(n: usize, per_page: usize) -> Self {
        let pages = (0..n)
            .map(|p| (0..per_page).map(|m| format!("msg-{}-{}", p, m)).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        StubMailbox {
            pages,
            journal: Arc::new(Mutex::new(Vec::new())),
            rate_limited_lists: AtomicU32::new(0),
            failing_delete: None,
            delete_calls: AtomicU32::new(0),
        }
    }

    /// The first `n` list calls answer with a rate-limit error.
    pub fn rate_limit_first_lists(self, n: u32) -> Self {
        self.rate_limited_lists.store(n, Ordering::SeqCst);
        self
    }

    /// The batch delete call number `n` (1-based) fails hard.
    pub fn fail_delete_call(mut self, n: usize) -> Self {
        self.failing_delete = Some(n);
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn record(&self, call: Call) {
        self.journal.lock().unwrap().push(call);
    }
}

impl MailApi for StubMailbox {
    fn list_messages<'a>(
        &'a self,
        query: &'a str,
        _page_size: u32,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MessagePage, RemoteError>> {
        Box::pin(async move {
            self.record(Call::List {
                query: query.to_string(),
                page_token: page_token.map(String::from),
            });

            let remaining = self.rate_limited_lists.load(Ordering::SeqCst);
            if remaining > 0 {
                self.rate_limited_lists.store(remaining - 1, Ordering::SeqCst);
                return Err(RemoteError::rate_limited("messages.list", "429 Too Many Requests"));
            }

            let index = match page_token {
                None => 0,
                Some(token) => token
                    .trim_start_matches("page-")
                    .parse::<usize>()
                    .map_err(|_| RemoteError::failed("messages.list", "bad page token"))?,
            };

            let message_ids = self.pages.get(index).cloned().unwrap_or_default();
            let next_page_token =
                (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));

            Ok(MessagePage {
                message_ids,
                next_page_token,
            })
        })
    }

    fn get_message<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, RemoteError>> {
        Box::pin(async move {
            self.record(Call::Get(id.to_string()));
            Ok(json!({ "id": id, "snippet": format!("body of {}", id) }))
        })
    }

    fn batch_delete<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async move {
            self.record(Call::Delete(ids.to_vec()));
            let n = self.delete_calls.fetch_add(1, Ordering::SeqCst) as usize + 1;
            if self.failing_delete == Some(n) {
                return Err(RemoteError::failed("messages.batchDelete", "500 Backend Error"));
            }
            Ok(())
        })
    }
}

/// Keeps every event and mirrors archive writes into the journal.
pub struct RecordingObserver {
    journal: Journal,
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(RecordingObserver {
            journal,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn cooldowns(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Cooldown { .. }))
            .count()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        if let ProgressEvent::MessageArchived { id, .. } = event {
            self.journal.lock().unwrap().push(Call::Archived(id.clone()));
        }
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn purge_config(archive_dir: &Path, archive: bool) -> PurgeConfig {
    PurgeConfig::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), archive, archive_dir)
}

pub fn calls(journal: &Journal) -> Vec<Call> {
    journal.lock().unwrap().clone()
}

pub fn count(journal: &Journal, pred: impl Fn(&Call) -> bool) -> usize {
    journal.lock().unwrap().iter().filter(|c| pred(*c)).count()
}
