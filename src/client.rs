//! Mail provider client with rate limiting and retry logic

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use google_gmail1::api::{Message, Thread as GmailThread};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::auth::{GmailHub, Session};
use crate::error::{Result, TriageError};
use crate::models::{internal_date_to_datetime, MessageHeaders, ParsedMessage, Thread};

const READ_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Mail provider operations used by the wizard and the reply tracker
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Total messages carrying the INBOX label
    async fn inbox_count(&self) -> Result<u64>;

    /// Total messages carrying the UNREAD label
    async fn unread_count(&self) -> Result<u64>;

    /// Fetch one thread with message headers and snippets
    async fn get_thread(&self, thread_id: &str) -> Result<Thread>;

    /// Fetch several threads, skipping ones that no longer exist
    async fn get_threads_by_ids(&self, thread_ids: &[String]) -> Result<Vec<Thread>>;
}

/// Builds a mail client for an authenticated session
pub trait MailClientFactory: Send + Sync {
    fn client_for(&self, session: &Session) -> Arc<dyn MailClient>;
}

/// Factory handing out one shared client, for single-account use
pub struct SharedClientFactory {
    client: Arc<dyn MailClient>,
}

impl SharedClientFactory {
    pub fn new(client: Arc<dyn MailClient>) -> Self {
        Self { client }
    }
}

impl MailClientFactory for SharedClientFactory {
    fn client_for(&self, session: &Session) -> Arc<dyn MailClient> {
        debug!("Using shared mail client for user {}", session.user.id);
        Arc::clone(&self.client)
    }
}

/// Production Gmail client
///
/// - Semaphore-based concurrency limit
/// - Exponential backoff on transient errors
/// - Per-call timeout so a hung request surfaces as a network error
pub struct ProductionGmailClient {
    hub: Arc<GmailHub>,
    rate_limiter: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ProductionGmailClient {
    pub fn new(hub: Arc<GmailHub>, max_concurrent: usize) -> Self {
        Self {
            hub,
            rate_limiter: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    fn should_retry(error: &TriageError) -> bool {
        error.is_transient()
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(operation_name: &str, max_retries: u32, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_millis(250);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    let wait = match &e {
                        TriageError::RateLimitExceeded { retry_after } => {
                            Duration::from_secs(*retry_after).max(delay)
                        }
                        _ => delay,
                    };
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run a Gmail call under the semaphore with a 30 second timeout
    async fn limited<T, Fut>(&self, call: Fut) -> Result<T>
    where
        Fut: std::future::Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        let _permit = self.rate_limiter.acquire().await.map_err(|e| {
            TriageError::Unknown(format!("Failed to acquire rate limit permit: {}", e))
        })?;

        let timeout_duration = Duration::from_secs(30);
        match tokio::time::timeout(timeout_duration, call).await {
            Ok(result) => result.map_err(TriageError::from),
            Err(_) => Err(TriageError::NetworkError(format!(
                "API call timed out after {:?}",
                timeout_duration
            ))),
        }
    }

    async fn label_total(&self, label_id: &str) -> Result<u64> {
        Self::with_retry("labels.get", 3, || async {
            let (_, label) = self
                .limited(
                    self.hub
                        .users()
                        .labels_get("me", label_id)
                        .add_scope(READ_SCOPE)
                        .doit(),
                )
                .await?;
            let total = label.messages_total.unwrap_or(0).max(0) as u64;
            debug!("Label {} has {} messages", label_id, total);
            Ok(total)
        })
        .await
    }
}

#[async_trait]
impl MailClient for ProductionGmailClient {
    async fn inbox_count(&self) -> Result<u64> {
        self.label_total("INBOX").await
    }

    async fn unread_count(&self) -> Result<u64> {
        self.label_total("UNREAD").await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        Self::with_retry("threads.get", 3, || async {
            let (_, thread) = self
                .limited(
                    self.hub
                        .users()
                        .threads_get("me", thread_id)
                        .format("metadata")
                        .add_metadata_headers("From")
                        .add_metadata_headers("To")
                        .add_metadata_headers("Subject")
                        .add_metadata_headers("Date")
                        .add_scope(READ_SCOPE)
                        .doit(),
                )
                .await?;
            parse_thread(thread)
        })
        .await
    }

    async fn get_threads_by_ids(&self, thread_ids: &[String]) -> Result<Vec<Thread>> {
        let results: Vec<Result<Thread>> = stream::iter(thread_ids.iter().cloned())
            .map(|id| async move { self.get_thread(&id).await })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut threads = Vec::with_capacity(results.len());
        for (id, result) in thread_ids.iter().zip(results) {
            match result {
                Ok(thread) => threads.push(thread),
                Err(TriageError::NotFound(_)) => {
                    warn!("Thread {} no longer exists, skipping", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(threads)
    }
}

/// Parse a Gmail API thread into our Thread structure
fn parse_thread(thread: GmailThread) -> Result<Thread> {
    let id = thread
        .id
        .ok_or_else(|| TriageError::InvalidMessageFormat("Missing thread ID".to_string()))?;

    let messages = thread
        .messages
        .unwrap_or_default()
        .into_iter()
        .map(|m| parse_message(m, &id))
        .collect::<Result<Vec<_>>>()?;

    Ok(Thread { id, messages })
}

fn parse_message(msg: Message, thread_id: &str) -> Result<ParsedMessage> {
    let id = msg
        .id
        .ok_or_else(|| TriageError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let mut headers = MessageHeaders::default();
    let parts = msg
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_ref())
        .map(|h| h.as_slice())
        .unwrap_or_default();

    for header in parts {
        if let (Some(name), Some(value)) = (&header.name, &header.value) {
            match name.to_lowercase().as_str() {
                "from" => headers.from = value.clone(),
                "to" => headers.to = value.clone(),
                "subject" => headers.subject = value.clone(),
                "date" => headers.date = value.clone(),
                _ => {}
            }
        }
    }

    Ok(ParsedMessage {
        id,
        thread_id: msg.thread_id.unwrap_or_else(|| thread_id.to_string()),
        headers,
        snippet: decode_snippet(msg.snippet.as_deref().unwrap_or("")),
        internal_date: internal_date_to_datetime(msg.internal_date),
    })
}

/// Gmail returns snippets HTML-escaped
fn decode_snippet(snippet: &str) -> String {
    snippet
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
