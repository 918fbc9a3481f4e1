//! Manual refresh control shown while emails are still being analyzed

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Busy flag for the refresh button
///
/// Pressing it triggers a full reload and shows as busy for a fixed delay.
/// The delay is cosmetic: the reload itself is not awaited.
#[derive(Debug, Clone)]
pub struct RefreshControl {
    refreshing: Arc<AtomicBool>,
    reset_after: Duration,
}

impl RefreshControl {
    pub fn new(reset_after: Duration) -> Self {
        Self {
            refreshing: Arc::new(AtomicBool::new(false)),
            reset_after,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Mark busy, run `reload`, and clear the busy flag after the delay
    pub fn trigger<F>(&self, reload: F) -> JoinHandle<()>
    where
        F: FnOnce(),
    {
        self.refreshing.store(true, Ordering::SeqCst);
        reload();
        debug!("Refresh triggered, resetting in {:?}", self.reset_after);

        let refreshing = Arc::clone(&self.refreshing);
        let delay = self.reset_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            refreshing.store(false, Ordering::SeqCst);
        })
    }
}
