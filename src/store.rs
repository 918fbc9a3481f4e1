//! Thread tracker persistence
//!
//! Trackers are created by upstream classification and only ever have their
//! `resolved` flag changed from here. Nothing in this crate deletes them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::models::{ThreadTracker, ThreadTrackerType};

/// Filter and page selection for a tracker listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerQuery {
    pub user_id: String,
    pub resolved: bool,
    pub tracker_type: Option<ThreadTrackerType>,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
}

impl TrackerQuery {
    pub fn new(user_id: &str, resolved: bool, tracker_type: Option<ThreadTrackerType>) -> Self {
        Self {
            user_id: user_id.to_string(),
            resolved,
            tracker_type,
            page: 1,
            page_size: 20,
        }
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page.max(1);
        self.page_size = page_size.max(1);
        self
    }

    /// Records to skip, `None` when the page lies beyond any addressable offset
    fn offset(&self) -> Option<usize> {
        (self.page.max(1) - 1).checked_mul(self.page_size)
    }

    fn matches(&self, tracker: &ThreadTracker) -> bool {
        tracker.user_id == self.user_id
            && tracker.resolved == self.resolved
            && self.tracker_type.map_or(true, |t| t == tracker.tracker_type)
    }
}

/// One page of trackers, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerPage {
    pub records: Vec<ThreadTracker>,
    pub total_pages: usize,
}

pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

#[async_trait]
pub trait ThreadTrackerStore: Send + Sync {
    /// Trackers matching the query, ordered by creation time descending
    async fn find_page(&self, query: &TrackerQuery) -> Result<TrackerPage>;

    /// Set `resolved` on every tracker for this user's thread
    ///
    /// Returns the number of records touched. Setting a value the record
    /// already has is not an error.
    async fn resolve(&self, user_id: &str, thread_id: &str, resolved: bool) -> Result<usize>;

    async fn insert(&self, tracker: ThreadTracker) -> Result<()>;
}

/// Store holding trackers in memory, optionally mirrored to a JSON file
#[derive(Debug, Default)]
pub struct InMemoryTrackerStore {
    trackers: Mutex<Vec<ThreadTracker>>,
    persist_path: Option<PathBuf>,
}

impl InMemoryTrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trackers(trackers: Vec<ThreadTracker>) -> Self {
        Self {
            trackers: Mutex::new(trackers),
            persist_path: None,
        }
    }

    /// Load trackers from a JSON file and write every change back to it
    pub async fn open(path: &Path) -> Result<Self> {
        let trackers = if path.exists() {
            let json = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&json)?
        } else {
            Vec::new()
        };

        tracing::info!("Loaded {} tracker(s) from {:?}", trackers.len(), path);
        Ok(Self {
            trackers: Mutex::new(trackers),
            persist_path: Some(path.to_path_buf()),
        })
    }

    async fn persist(&self, trackers: &[ThreadTracker]) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(trackers)?;
        tokio::fs::write(path, json).await?;
        debug!("Saved {} tracker(s) to {:?}", trackers.len(), path);
        Ok(())
    }

    pub async fn snapshot(&self) -> Vec<ThreadTracker> {
        self.trackers.lock().await.clone()
    }
}

#[async_trait]
impl ThreadTrackerStore for InMemoryTrackerStore {
    async fn find_page(&self, query: &TrackerQuery) -> Result<TrackerPage> {
        let trackers = self.trackers.lock().await;

        let mut matching: Vec<&ThreadTracker> = trackers.iter().filter(|t| query.matches(t)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len();
        let records = match query.offset() {
            Some(offset) => matching
                .into_iter()
                .skip(offset)
                .take(query.page_size)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        Ok(TrackerPage {
            records,
            total_pages: total_pages(total, query.page_size),
        })
    }

    async fn resolve(&self, user_id: &str, thread_id: &str, resolved: bool) -> Result<usize> {
        let mut trackers = self.trackers.lock().await;

        // Changes only become visible once they are on disk
        let mut updated_trackers = trackers.clone();
        let mut updated = 0;
        for tracker in updated_trackers
            .iter_mut()
            .filter(|t| t.user_id == user_id && t.thread_id == thread_id)
        {
            tracker.resolved = resolved;
            updated += 1;
        }
        if updated > 0 {
            self.persist(&updated_trackers).await?;
            *trackers = updated_trackers;
        }
        debug!(
            "Set resolved={} on {} tracker(s) for thread {}",
            resolved, updated, thread_id
        );
        Ok(updated)
    }

    async fn insert(&self, tracker: ThreadTracker) -> Result<()> {
        let mut trackers = self.trackers.lock().await;
        let mut updated_trackers = trackers.clone();
        updated_trackers.push(tracker);
        self.persist(&updated_trackers).await?;
        *trackers = updated_trackers;
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteTrackerStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use crate::error::TriageError;
    use chrono::DateTime;
    use rusqlite::{params, Connection};
    use std::path::Path;
    use std::sync::{Arc, Mutex as StdMutex};

    /// Store persisting trackers to a SQLite file
    pub struct SqliteTrackerStore {
        conn: Arc<StdMutex<Connection>>,
    }

    impl SqliteTrackerStore {
        pub fn open(path: &Path) -> Result<Self> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            Self::from_connection(conn)
        }

        pub fn open_in_memory() -> Result<Self> {
            Self::from_connection(Connection::open_in_memory()?)
        }

        fn from_connection(conn: Connection) -> Result<Self> {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS thread_trackers (
                    id          TEXT PRIMARY KEY,
                    user_id     TEXT NOT NULL,
                    thread_id   TEXT NOT NULL,
                    type        TEXT NOT NULL,
                    resolved    INTEGER NOT NULL DEFAULT 0,
                    created_at  INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS thread_trackers_listing
                    ON thread_trackers (user_id, resolved, type, created_at);
                "#,
            )?;
            Ok(Self {
                conn: Arc::new(StdMutex::new(conn)),
            })
        }

        async fn with_conn<T, F>(&self, f: F) -> Result<T>
        where
            T: Send + 'static,
            F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        {
            let conn = Arc::clone(&self.conn);
            tokio::task::spawn_blocking(move || {
                let mut guard = conn
                    .lock()
                    .map_err(|_| TriageError::StoreError("connection mutex poisoned".to_string()))?;
                f(&mut guard)
            })
            .await
            .map_err(|e| TriageError::StoreError(format!("store task failed: {}", e)))?
        }
    }

    fn row_to_tracker(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadTracker> {
        let tracker_type: String = row.get(3)?;
        let created_at: i64 = row.get(5)?;
        Ok(ThreadTracker {
            id: row.get(0)?,
            user_id: row.get(1)?,
            thread_id: row.get(2)?,
            tracker_type: tracker_type.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            resolved: row.get(4)?,
            created_at: DateTime::from_timestamp_millis(created_at).unwrap_or(DateTime::UNIX_EPOCH),
        })
    }

    #[async_trait]
    impl ThreadTrackerStore for SqliteTrackerStore {
        async fn find_page(&self, query: &TrackerQuery) -> Result<TrackerPage> {
            let query = query.clone();
            self.with_conn(move |conn| {
                let type_filter = query.tracker_type.map(|t| t.as_str().to_string());

                let total: i64 = conn.query_row(
                    r#"
                    SELECT COUNT(*) FROM thread_trackers
                    WHERE user_id = ?1 AND resolved = ?2 AND (?3 IS NULL OR type = ?3)
                    "#,
                    params![query.user_id, query.resolved, type_filter],
                    |row| row.get(0),
                )?;

                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, user_id, thread_id, type, resolved, created_at
                    FROM thread_trackers
                    WHERE user_id = ?1 AND resolved = ?2 AND (?3 IS NULL OR type = ?3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?4 OFFSET ?5
                    "#,
                )?;
                let total_pages = total_pages(usize::try_from(total).unwrap_or(0), query.page_size);

                let Some(offset) = query.offset().and_then(|o| i64::try_from(o).ok()) else {
                    return Ok(TrackerPage {
                        records: Vec::new(),
                        total_pages,
                    });
                };
                let limit = i64::try_from(query.page_size).unwrap_or(i64::MAX);

                let records = stmt
                    .query_map(
                        params![query.user_id, query.resolved, type_filter, limit, offset],
                        row_to_tracker,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(TrackerPage {
                    records,
                    total_pages,
                })
            })
            .await
        }

        async fn resolve(&self, user_id: &str, thread_id: &str, resolved: bool) -> Result<usize> {
            let user_id = user_id.to_string();
            let thread_id = thread_id.to_string();
            self.with_conn(move |conn| {
                let updated = conn.execute(
                    "UPDATE thread_trackers SET resolved = ?1 WHERE user_id = ?2 AND thread_id = ?3",
                    params![resolved, user_id, thread_id],
                )?;
                debug!(
                    "Set resolved={} on {} tracker(s) for thread {}",
                    resolved, updated, thread_id
                );
                Ok(updated)
            })
            .await
        }

        async fn insert(&self, tracker: ThreadTracker) -> Result<()> {
            self.with_conn(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO thread_trackers (id, user_id, thread_id, type, resolved, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        tracker.id,
                        tracker.user_id,
                        tracker.thread_id,
                        tracker.tracker_type.as_str(),
                        tracker.resolved,
                        tracker.created_at.timestamp_millis()
                    ],
                )?;
                Ok(())
            })
            .await
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn tracker(user: &str, thread: &str, kind: ThreadTrackerType, minutes_ago: i64) -> ThreadTracker {
        let mut t = ThreadTracker::new(user, thread, kind);
        t.created_at = Utc::now() - Duration::minutes(minutes_ago);
        t
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
    }

    #[tokio::test]
    async fn test_find_page_filters_and_orders() {
        let store = InMemoryTrackerStore::with_trackers(vec![
            tracker("u1", "a", ThreadTrackerType::NeedsAction, 30),
            tracker("u1", "b", ThreadTrackerType::NeedsAction, 10),
            tracker("u1", "c", ThreadTrackerType::Awaiting, 5),
            tracker("u2", "d", ThreadTrackerType::NeedsAction, 1),
        ]);

        let query = TrackerQuery::new("u1", false, Some(ThreadTrackerType::NeedsAction));
        let page = store.find_page(&query).await.unwrap();
        let ids: Vec<_> = page.records.iter().map(|t| t.thread_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_find_page_paginates() {
        let trackers = (0..5)
            .map(|i| tracker("u1", &format!("t{}", i), ThreadTrackerType::Awaiting, i))
            .collect();
        let store = InMemoryTrackerStore::with_trackers(trackers);

        let query = TrackerQuery::new("u1", false, None).with_page(2, 2);
        let page = store.find_page(&query).await.unwrap();
        let ids: Vec<_> = page.records.iter().map(|t| t.thread_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3"]);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn test_find_page_beyond_addressable_offset_is_empty() {
        let store = InMemoryTrackerStore::with_trackers(vec![tracker(
            "u1",
            "a",
            ThreadTrackerType::Awaiting,
            1,
        )]);

        let query = TrackerQuery::new("u1", false, None).with_page(usize::MAX, 20);
        let page = store.find_page(&query).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_trackers_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let path = blocker.join("trackers.json");

        let store = InMemoryTrackerStore::open(&path).await.unwrap();
        assert!(store
            .insert(tracker("u1", "a", ThreadTrackerType::Awaiting, 1))
            .await
            .is_err());
        assert!(store.snapshot().await.is_empty());

        // Seed through the in-memory state only, then fail the resolve write
        store
            .trackers
            .lock()
            .await
            .push(tracker("u1", "a", ThreadTrackerType::Awaiting, 1));
        assert!(store.resolve("u1", "a", true).await.is_err());

        let query = TrackerQuery::new("u1", false, None);
        let page = store.find_page(&query).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(!page.records[0].resolved);
    }

    #[tokio::test]
    async fn test_json_store_persists_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/trackers.json");

        let store = InMemoryTrackerStore::open(&path).await.unwrap();
        store
            .insert(tracker("u1", "a", ThreadTrackerType::Awaiting, 1))
            .await
            .unwrap();
        store.resolve("u1", "a", true).await.unwrap();

        let reopened = InMemoryTrackerStore::open(&path).await.unwrap();
        let trackers = reopened.snapshot().await;
        assert_eq!(trackers.len(), 1);
        assert!(trackers[0].resolved);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let store = InMemoryTrackerStore::with_trackers(vec![tracker(
            "u1",
            "a",
            ThreadTrackerType::Awaiting,
            1,
        )]);

        assert_eq!(store.resolve("u1", "a", true).await.unwrap(), 1);
        assert_eq!(store.resolve("u1", "a", true).await.unwrap(), 1);
        assert!(store.snapshot().await[0].resolved);

        // Other users' trackers are untouched
        assert_eq!(store.resolve("u2", "a", false).await.unwrap(), 0);
        assert!(store.snapshot().await[0].resolved);
    }
}
