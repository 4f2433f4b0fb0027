use anyhow::{Context, Result};
use futures::future::BoxFuture;
use google_gmail1::api::{BatchDeleteMessagesRequest, Scope};
use google_gmail1::{hyper, hyper_rustls, oauth2, Gmail};
use log::{debug, info};

use crate::config::GmailConfig;
use crate::error::RemoteError;
use crate::mail_api::{MailApi, MessagePage};

const USER_ID: &str = "me";

/// Gmail API access for an already authorized account.
pub struct GmailClient {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
}

impl GmailClient {
    pub async fn new(config: &GmailConfig) -> Result<Self> {
        info!("Connecting to Gmail API via OAuth2");

        let secret = oauth2::read_application_secret(&config.credentials_path)
            .await
            .context("Unable to read OAuth2 client credentials file")?;

        // Scope::Gmai (full mailbox access) is the only scope that allows batchDelete,
        // so every call asks for it and a single cached token covers the run.
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .context("Unable to create OAuth2 authenticator")?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);
        let hub = Gmail::new(client, auth);

        info!("✅ Gmail API connection established successfully");

        Ok(GmailClient { hub })
    }

    async fn list(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, RemoteError> {
        debug!("messages.list q='{}' page_token={:?}", query, page_token);

        let mut call = self
            .hub
            .users()
            .messages_list(USER_ID)
            .q(query)
            .max_results(page_size)
            .add_scope(Scope::Gmai);

        if let Some(token) = page_token {
            call = call.page_token(token);
        }

        let (_, list) = call
            .doit()
            .await
            .map_err(|e| classify("messages.list", e))?;

        let message_ids = list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id)
            .collect();

        Ok(MessagePage {
            message_ids,
            next_page_token: list.next_page_token,
        })
    }

    async fn get(&self, id: &str) -> Result<serde_json::Value, RemoteError> {
        debug!("messages.get id={}", id);

        let (_, message) = self
            .hub
            .users()
            .messages_get(USER_ID, id)
            .format("full")
            .add_scope(Scope::Gmai)
            .doit()
            .await
            .map_err(|e| classify("messages.get", e))?;

        serde_json::to_value(&message).map_err(|e| {
            RemoteError::failed("messages.get", format!("malformed message {}: {}", id, e))
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<(), RemoteError> {
        debug!("messages.batchDelete with {} id(s)", ids.len());

        let request = BatchDeleteMessagesRequest {
            ids: Some(ids.to_vec()),
        };

        self.hub
            .users()
            .messages_batch_delete(request, USER_ID)
            .add_scope(Scope::Gmai)
            .doit()
            .await
            .map_err(|e| classify("messages.batchDelete", e))?;

        Ok(())
    }
}

impl MailApi for GmailClient {
    fn list_messages<'a>(
        &'a self,
        query: &'a str,
        page_size: u32,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MessagePage, RemoteError>> {
        Box::pin(self.list(query, page_size, page_token))
    }

    fn get_message<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, RemoteError>> {
        Box::pin(self.get(id))
    }

    fn batch_delete<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.delete(ids))
    }
}

/// Sorts a Gmail API failure into rate-limited or hard failure.
fn classify(operation: &str, err: google_gmail1::Error) -> RemoteError {
    let rate_limited = match &err {
        google_gmail1::Error::Failure(response) => {
            response.status() == hyper::StatusCode::TOO_MANY_REQUESTS
        }
        google_gmail1::Error::BadRequest(body) => is_rate_limit_body(body),
        _ => false,
    };

    if rate_limited {
        RemoteError::rate_limited(operation, err.to_string())
    } else {
        RemoteError::failed(operation, err.to_string())
    }
}

/// Google error bodies signal throttling with code 429, or 403 with a rate-limit reason.
fn is_rate_limit_body(body: &serde_json::Value) -> bool {
    let error = &body["error"];
    let code = error["code"].as_u64().unwrap_or(0);

    if code == 429 || error["status"].as_str() == Some("RESOURCE_EXHAUSTED") {
        return true;
    }

    code == 403
        && error["errors"]
            .as_array()
            .map(|errors| {
                errors.iter().any(|e| {
                    matches!(
                        e["reason"].as_str(),
                        Some("rateLimitExceeded") | Some("userRateLimitExceeded")
                    )
                })
            })
            .unwrap_or(false)
}
