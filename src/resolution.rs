//! Marking tracked threads done or not done
//!
//! Each row's control runs at most one request at a time. The in-flight
//! check happens at the start of the handler, so a second press while the
//! first request is outstanding does nothing. The list itself is not updated
//! optimistically; rows change once the trackers are queried again.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::Result;
use crate::notify::Notifier;
use crate::store::ThreadTrackerStore;

/// Result of pressing a resolve/unresolve control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The store accepted the change
    Succeeded,
    /// The store reported an error; carries its message
    Failed(String),
    /// A request for this thread was already in flight; nothing was sent
    Skipped,
}

pub fn success_message(resolved: bool) -> &'static str {
    if resolved {
        "Marked as done!"
    } else {
        "Marked as not done!"
    }
}

/// Runs resolution requests with a per-thread in-flight guard
pub struct ResolutionAction {
    store: Arc<dyn ThreadTrackerStore>,
    notifier: Arc<dyn Notifier>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Clears a thread's in-flight flag when dropped, whatever the outcome
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    thread_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = match self.set.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.thread_id);
    }
}

impl ResolutionAction {
    pub fn new(store: Arc<dyn ThreadTrackerStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn try_acquire(&self, thread_id: &str) -> Option<InFlightGuard> {
        let mut set = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !set.insert(thread_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            thread_id: thread_id.to_string(),
        })
    }

    /// Whether the control for this thread should show as loading
    pub fn is_loading(&self, thread_id: &str) -> bool {
        match self.in_flight.lock() {
            Ok(set) => set.contains(thread_id),
            Err(poisoned) => poisoned.into_inner().contains(thread_id),
        }
    }

    /// Set the resolved flag for a user's thread and notify the outcome
    pub async fn run(&self, user_id: &str, thread_id: &str, resolved: bool) -> ResolutionOutcome {
        let Some(_guard) = self.try_acquire(thread_id) else {
            debug!("Resolution for thread {} already in flight, ignoring", thread_id);
            return ResolutionOutcome::Skipped;
        };

        let result: Result<usize> = self.store.resolve(user_id, thread_id, resolved).await;
        match result {
            Ok(updated) => {
                info!(
                    "Thread {} marked resolved={} ({} tracker(s))",
                    thread_id, resolved, updated
                );
                self.notifier.success("Success", success_message(resolved));
                ResolutionOutcome::Succeeded
            }
            Err(e) => {
                let message = e.to_string();
                self.notifier.error("Error", &message);
                ResolutionOutcome::Failed(message)
            }
        }
    }

    pub async fn resolve(&self, user_id: &str, thread_id: &str) -> ResolutionOutcome {
        self.run(user_id, thread_id, true).await
    }

    pub async fn unresolve(&self, user_id: &str, thread_id: &str) -> ResolutionOutcome {
        self.run(user_id, thread_id, false).await
    }
}
