//! Mailbox counters used to size the cleanup wizard

use tracing::debug;

use crate::client::MailClient;
use crate::error::Result;

/// Inbox and unread totals for one mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxCounts {
    pub inbox: u64,
    pub unread: u64,
}

impl MailboxCounts {
    /// Approximation of messages needing attention
    pub fn unhandled(&self) -> u64 {
        unhandled_count(self.unread, self.inbox)
    }
}

pub fn unhandled_count(unread: u64, inbox: u64) -> u64 {
    unread.min(inbox)
}

pub async fn get_inbox_count(client: &dyn MailClient) -> Result<u64> {
    client.inbox_count().await
}

pub async fn get_unread_count(client: &dyn MailClient) -> Result<u64> {
    client.unread_count().await
}

/// Fetch both counters, one after the other
pub async fn fetch_counts(client: &dyn MailClient) -> Result<MailboxCounts> {
    let inbox = get_inbox_count(client).await?;
    let unread = get_unread_count(client).await?;
    debug!("Mailbox counts: inbox={}, unread={}", inbox, unread);
    Ok(MailboxCounts { inbox, unread })
}
