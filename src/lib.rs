//! Mail Triage
//!
//! Backend for two inbox-management features on top of Gmail:
//!
//! - **Clean wizard**: a stateless, URL-driven step machine that walks a user
//!   through archiving or marking read the mail they have not handled yet
//! - **Reply tracker**: lists threads awaiting a reply or an action, lets the
//!   user mark them done, and opens a thread viewer to nudge or reply
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use mail_triage::{auth, client::ProductionGmailClient, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".mail-triage/token.json".as_ref(),
//!     )
//!     .await?;
//!
//!     let client = ProductionGmailClient::new(
//!         Arc::new(hub),
//!         config.tracker.max_concurrent_requests,
//!     );
//!     // Wire the client into CleanPage / ReplyTrackerPage
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - Session lookup and OAuth2 Gmail hub setup
//! - [`client`] - Gmail client with retries, timeouts and concurrency limits
//! - [`counters`] - Inbox/unread counters
//! - [`wizard`] - Clean wizard steps
//! - [`store`] - Thread tracker persistence
//! - [`hydration`] - Stale-while-revalidate thread cache
//! - [`resolution`] - Mark done / not done with per-row in-flight guard
//! - [`tracker`] - Reply tracker list view model
//! - [`refresh`] - Refresh control for the analyzing state
//! - [`pages`] - Page orchestration
//! - [`cli`] - Command-line interface and terminal rendering

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod counters;
pub mod error;
pub mod hydration;
pub mod models;
pub mod notify;
pub mod pages;
pub mod refresh;
pub mod resolution;
pub mod store;
pub mod tracker;
pub mod wizard;

// Re-export commonly used types for convenience
pub use error::{Result, TriageError};

pub use models::{ParsedMessage, SelectedEmail, Thread, ThreadTracker, ThreadTrackerType};

pub use config::{Config, StoreBackend, StoreConfig, TrackerConfig};

pub use auth::{AuthProvider, Session};
pub use client::{MailClient, MailClientFactory, ProductionGmailClient};

pub use wizard::{CleanAction, CleanStep, StepView};

pub use store::{InMemoryTrackerStore, ThreadTrackerStore, TrackerPage, TrackerQuery};
#[cfg(feature = "sqlite")]
pub use store::SqliteTrackerStore;

pub use hydration::{HydrationSnapshot, ThreadCache, ThreadHydrator};
pub use resolution::{ResolutionAction, ResolutionOutcome};
pub use tracker::{RowControl, ThreadSelection, TrackerListView};

pub use pages::{CleanPage, CleanPageView, ReplyTrackerPage, TrackerPageRequest, TrackerPageView};

pub use cli::{Cli, Commands};
