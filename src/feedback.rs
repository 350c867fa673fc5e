use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::models::{FeedbackEntry, NewFeedback, generate_id};
use crate::repository::RepositoryError;
use crate::store::{FEEDBACK_KEY, KeyValueStore, load_json, save_json};
use crate::validation::validate_feedback;

/// Append-only feedback log, newest entry first.
#[derive(Clone)]
pub struct FeedbackLog {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    write_lock: Arc<Mutex<()>>,
}

impl FeedbackLog {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// An absent or unreadable log reads as empty.
    pub async fn list_feedback(&self) -> Vec<FeedbackEntry> {
        self.read_entries().await
    }

    pub async fn add_feedback(&self, new: NewFeedback) -> Result<FeedbackEntry, RepositoryError> {
        validate_feedback(&new)?;

        let entry = FeedbackEntry {
            id: generate_id(),
            user_email: new.user_email,
            text: new.text,
            rating: new.rating,
            created_at: self.clock.now(),
        };

        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await;
        entries.insert(0, entry.clone());
        save_json(&self.store, FEEDBACK_KEY, &entries).await?;

        debug!(id = %entry.id, rating = entry.rating, "feedback recorded");
        Ok(entry)
    }

    async fn read_entries(&self) -> Vec<FeedbackEntry> {
        match load_json(&self.store, FEEDBACK_KEY).await {
            Ok(entries) => entries.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "feedback log unreadable, treating as empty");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn log() -> (FeedbackLog, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let log = FeedbackLog::new(store.clone(), Arc::new(clock.clone()));
        (log, store, clock)
    }

    fn feedback(text: &str, rating: u8) -> NewFeedback {
        NewFeedback {
            user_email: "a@x.com".to_string(),
            text: text.to_string(),
            rating,
        }
    }

    #[tokio::test]
    async fn test_empty_log() {
        let (log, _store, _clock) = log();
        assert!(log.list_feedback().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_feedback_newest_first() {
        let (log, _store, clock) = log();

        let first = log.add_feedback(feedback("good", 4)).await.unwrap();
        clock.advance(chrono::Duration::seconds(5));
        let second = log.add_feedback(feedback("better", 5)).await.unwrap();

        let entries = log.list_feedback().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second.id);
        assert_eq!(entries[1].id, first.id);
        assert!(entries[0].created_at > entries[1].created_at);
    }

    #[tokio::test]
    async fn test_add_feedback_rejects_bad_rating() {
        let (log, _store, _clock) = log();

        let err = log.add_feedback(feedback("meh", 0)).await.unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidArgument(_)));
        assert!(log.list_feedback().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_log_reads_empty_and_is_replaced() {
        let (log, store, _clock) = log();
        store.set(FEEDBACK_KEY, "{oops").unwrap();

        assert!(log.list_feedback().await.is_empty());
        log.add_feedback(feedback("fixed", 3)).await.unwrap();
        assert_eq!(log.list_feedback().await.len(), 1);
    }
}
