//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mail_triage::auth::{Session, StaticAuth};
use mail_triage::client::MailClient;
use mail_triage::error::{Result, TriageError};
use mail_triage::hydration::{ThreadCache, ThreadHydrator};
use mail_triage::models::{MessageHeaders, ParsedMessage, Thread, ThreadTracker, ThreadTrackerType};
use mail_triage::notify::CollectingNotifier;
use mail_triage::pages::ReplyTrackerPage;
use mail_triage::refresh::RefreshControl;
use mail_triage::resolution::ResolutionAction;
use mail_triage::store::InMemoryTrackerStore;
use mockall::mock;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const USER_ID: &str = "me@example.com";
pub const USER_EMAIL: &str = "me@example.com";

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn signed_in() -> StaticAuth {
    StaticAuth::signed_in(Session::new(USER_ID, USER_EMAIL))
}

/// Create a tracker created `minutes` after the base time
pub fn create_tracker(thread_id: &str, tracker_type: ThreadTrackerType, minutes: i64) -> ThreadTracker {
    let mut tracker = ThreadTracker::new(USER_ID, thread_id, tracker_type);
    tracker.created_at = base_time() + Duration::minutes(minutes);
    tracker
}

/// Create a message sent `minutes` after the base time
pub fn create_message(thread_id: &str, id: &str, from: &str, minutes: i64) -> ParsedMessage {
    ParsedMessage {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        headers: MessageHeaders {
            from: from.to_string(),
            subject: format!("Subject of {}", thread_id),
            to: USER_EMAIL.to_string(),
            date: String::new(),
        },
        snippet: format!("Snippet of {}", id),
        internal_date: base_time() + Duration::minutes(minutes),
    }
}

/// Create a single-message thread whose last activity is `minutes` after the base time
pub fn create_thread(thread_id: &str, minutes: i64) -> Thread {
    Thread {
        id: thread_id.to_string(),
        messages: vec![create_message(
            thread_id,
            &format!("{}-last", thread_id),
            "Alice Example <alice@example.com>",
            minutes,
        )],
    }
}

/// In-memory mail client serving a fixed set of threads
#[derive(Default)]
pub struct FakeMailClient {
    pub inbox: u64,
    pub unread: u64,
    pub threads: HashMap<String, Thread>,
    pub thread_fetches: AtomicUsize,
}

impl FakeMailClient {
    pub fn new(threads: Vec<Thread>) -> Self {
        Self {
            threads: threads.into_iter().map(|t| (t.id.clone(), t)).collect(),
            ..Self::default()
        }
    }

    pub fn fetches(&self) -> usize {
        self.thread_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailClient for FakeMailClient {
    async fn inbox_count(&self) -> Result<u64> {
        Ok(self.inbox)
    }

    async fn unread_count(&self) -> Result<u64> {
        Ok(self.unread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        self.threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| TriageError::NotFound(thread_id.to_string()))
    }

    async fn get_threads_by_ids(&self, thread_ids: &[String]) -> Result<Vec<Thread>> {
        self.thread_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(thread_ids
            .iter()
            .filter_map(|id| self.threads.get(id).cloned())
            .collect())
    }
}

// Mock implementation of MailClient for expectation-style tests
mock! {
    pub Mail {}

    #[async_trait]
    impl MailClient for Mail {
        async fn inbox_count(&self) -> Result<u64>;
        async fn unread_count(&self) -> Result<u64>;
        async fn get_thread(&self, thread_id: &str) -> Result<Thread>;
        async fn get_threads_by_ids(&self, thread_ids: &[String]) -> Result<Vec<Thread>>;
    }
}

/// Everything a reply tracker test needs to drive and inspect a page
pub struct TrackerHarness {
    pub page: ReplyTrackerPage,
    pub store: Arc<InMemoryTrackerStore>,
    pub notifier: Arc<CollectingNotifier>,
}

pub fn tracker_harness(
    auth: StaticAuth,
    trackers: Vec<ThreadTracker>,
    client: Arc<dyn MailClient>,
) -> TrackerHarness {
    let store = Arc::new(InMemoryTrackerStore::with_trackers(trackers));
    let notifier = Arc::new(CollectingNotifier::new());
    let cache = ThreadCache::new(
        NonZeroUsize::new(16).unwrap(),
        std::time::Duration::from_secs(30),
    );
    let hydrator = Arc::new(ThreadHydrator::new(client, cache, true));
    let resolution = ResolutionAction::new(store.clone(), notifier.clone());

    let page = ReplyTrackerPage::new(
        Arc::new(auth),
        store.clone(),
        hydrator,
        resolution,
        RefreshControl::new(std::time::Duration::from_secs(1)),
        20,
    );

    TrackerHarness {
        page,
        store,
        notifier,
    }
}
