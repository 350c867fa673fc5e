// Class repository.
// Serves the class list cache-first from the on-device store, revalidates it
// against the remote in the background, and applies enrollment and edits to
// the persisted list under a single writer lock.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{DEFAULT_TTL, TtlCache};
use crate::clock::Clock;
use crate::models::{
    Category, ClassRecord, ClassUpdate, NewClass, RemoteClassDraft, generate_id,
};
use crate::remote::{ClassesClient, RemoteError};
use crate::store::{CLASSES_KEY, KeyValueStore, StoreError, load_json, save_json};
use crate::validation::{validate_class_update, validate_email, validate_new_class};

pub const CLASS_LIST_CACHE_KEY: &str = "classes:list";
pub const DEFAULT_REVALIDATE_THROTTLE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Class {0} not found")]
    NotFound(String),
    #[error("No slots left in this class")]
    CapacityExceeded,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of one background refresh against the remote.
#[derive(Debug)]
pub enum Revalidation {
    Applied(Vec<ClassRecord>),
    /// A newer revalidation already landed; this response was dropped.
    Stale { ticket: u64 },
    Failed(RemoteError),
}

#[derive(Debug, Clone, Copy)]
pub struct RepositoryConfig {
    pub cache_ttl: Duration,
    pub revalidate_throttle: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            revalidate_throttle: DEFAULT_REVALIDATE_THROTTLE,
        }
    }
}

/// State guarded by the writer lock.
struct BlobState {
    /// Ticket of the newest revalidation written to cache and store.
    applied_ticket: u64,
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    remote: ClassesClient,
    clock: Arc<dyn Clock>,
    cache: TtlCache<Vec<ClassRecord>>,
    blob: tokio::sync::Mutex<BlobState>,
    next_ticket: AtomicU64,
    last_focus_refresh: Mutex<Option<DateTime<Utc>>>,
    revalidate_throttle: Duration,
}

#[derive(Clone)]
pub struct ClassRepository {
    inner: Arc<Inner>,
}

/// Classes written on first run.
pub fn default_classes() -> Vec<ClassRecord> {
    let class = |id: &str,
                 name: &str,
                 teacher: &str,
                 schedule: &str,
                 weekdays: &[&str],
                 description: &str,
                 category: Category,
                 level: &str,
                 slots: u32| ClassRecord {
        id: id.to_string(),
        name: name.to_string(),
        teacher_name: teacher.to_string(),
        schedule: schedule.to_string(),
        weekdays: weekdays.iter().map(|d| d.to_string()).collect(),
        description: description.to_string(),
        category,
        level: level.to_string(),
        remaining_slots: slots,
        enrolled_emails: BTreeSet::new(),
    };

    vec![
        class(
            "1",
            "Strength Training",
            "João Silva",
            "08:00 - 09:00",
            &["Monday", "Wednesday", "Friday"],
            "Strength and endurance training with professional guidance.",
            Category::Strength,
            "all levels",
            12,
        ),
        class(
            "2",
            "Yoga",
            "Maria Souza",
            "10:00 - 11:00",
            &["Tuesday", "Thursday"],
            "Yoga for relaxation, flexibility and balance.",
            Category::Yoga,
            "intermediate",
            8,
        ),
        class(
            "3",
            "Pilates",
            "Carlos Lima",
            "14:00 - 15:00",
            &["Monday", "Thursday"],
            "Mat pilates for core strength and posture.",
            Category::Pilates,
            "all levels",
            10,
        ),
    ]
}

impl ClassRepository {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        remote: ClassesClient,
        clock: Arc<dyn Clock>,
        config: RepositoryConfig,
    ) -> Self {
        let cache = TtlCache::new(clock.clone(), config.cache_ttl);
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                clock,
                cache,
                blob: tokio::sync::Mutex::new(BlobState { applied_ticket: 0 }),
                next_ticket: AtomicU64::new(0),
                last_focus_refresh: Mutex::new(None),
                revalidate_throttle: config.revalidate_throttle,
            }),
        }
    }

    /// Cache-first class list. Never fails and never waits on the network:
    /// on a cache miss the persisted list is returned and a revalidation is
    /// started in the background.
    pub async fn list_classes(&self) -> Vec<ClassRecord> {
        if let Some(cached) = self.inner.cache.get(CLASS_LIST_CACHE_KEY) {
            return cached;
        }

        let local = {
            let _blob = self.inner.blob.lock().await;
            self.load_local().await
        };

        let classes = match local {
            Ok(classes) => {
                self.inner.cache.set(CLASS_LIST_CACHE_KEY, classes.clone());
                classes
            }
            Err(err) => {
                warn!(error = %err, "failed to read stored classes");
                Vec::new()
            }
        };

        self.spawn_revalidation();
        classes
    }

    pub async fn get_class_by_id(&self, id: &str) -> Option<ClassRecord> {
        if let Some(hit) = self
            .inner
            .cache
            .get(CLASS_LIST_CACHE_KEY)
            .and_then(|classes| classes.into_iter().find(|c| c.id == id))
        {
            return Some(hit);
        }

        if let Some(hit) = self.list_classes().await.into_iter().find(|c| c.id == id) {
            return Some(hit);
        }

        let Ok(remote_id) = id.parse::<i64>() else {
            return None;
        };
        match self.inner.remote.get_class(remote_id).await {
            Ok(remote) => Some(ClassRecord::from_remote(remote)),
            Err(err) => {
                debug!(id, error = %err, "class not available on remote");
                None
            }
        }
    }

    /// Adds `email` to the class and takes one slot. Enrolling twice is a no-op.
    pub async fn enroll(
        &self,
        class_id: &str,
        email: &str,
    ) -> Result<ClassRecord, RepositoryError> {
        let email = validate_email(email)?;
        let updated = self
            .modify_class(class_id, |class| {
                if class.enrolled_emails.contains(email) {
                    return Ok(false);
                }
                if class.remaining_slots == 0 {
                    return Err(RepositoryError::CapacityExceeded);
                }
                class.enrolled_emails.insert(email.to_string());
                class.remaining_slots -= 1;
                Ok(true)
            })
            .await?;

        debug!(class_id, remaining = updated.remaining_slots, "enrolled");
        Ok(updated)
    }

    /// Removes `email` from the class and frees its slot. Unknown emails are a no-op.
    pub async fn unenroll(
        &self,
        class_id: &str,
        email: &str,
    ) -> Result<ClassRecord, RepositoryError> {
        let email = email.trim();
        let updated = self
            .modify_class(class_id, |class| {
                if !class.enrolled_emails.remove(email) {
                    return Ok(false);
                }
                // Slots saturate at the largest storable count.
                class.remaining_slots = class.remaining_slots.saturating_add(1);
                Ok(true)
            })
            .await?;

        debug!(class_id, remaining = updated.remaining_slots, "unenrolled");
        Ok(updated)
    }

    /// Replaces the descriptive fields of a stored class. Capacity and
    /// membership are left alone.
    pub async fn update_class(
        &self,
        class_id: &str,
        update: ClassUpdate,
    ) -> Result<ClassRecord, RepositoryError> {
        let update = validate_class_update(update)?;
        self.modify_class(class_id, move |class| {
            class.name = update.name;
            class.teacher_name = update.teacher_name;
            class.schedule = update.schedule;
            class.weekdays = update.weekdays;
            class.description = update.description;
            Ok(true)
        })
        .await
    }

    /// Remote first. If the remote refuses, the class is kept on this device
    /// under a freshly generated id.
    pub async fn create_class(&self, new: NewClass) -> Result<ClassRecord, RepositoryError> {
        validate_new_class(&new)?;

        let draft = RemoteClassDraft::from(&new);
        let err = match self.inner.remote.create_class(&draft).await {
            Ok(created) => {
                info!(id = created.id, "class created on remote");
                return Ok(ClassRecord::from_created(created, new));
            }
            Err(err) => err,
        };

        warn!(error = %err, "remote create failed, storing class locally");
        let _blob = self.inner.blob.lock().await;
        let mut classes = self.load_local().await?;
        let mut id = generate_id();
        while classes.iter().any(|c| c.id == id) {
            id = generate_id();
        }
        let record = ClassRecord::from_new(id, new);
        classes.push(record.clone());
        self.persist(&classes).await?;

        Ok(record)
    }

    /// Remote first; falls back to dropping the class from the stored list.
    pub async fn delete_class(&self, class_id: &str) -> Result<(), RepositoryError> {
        let remote_result = match class_id.parse::<i64>() {
            Ok(remote_id) => self.inner.remote.delete_class(remote_id).await,
            // Ids generated on this device never reach the remote.
            Err(_) => Err(RemoteError::NotFound),
        };

        let err = match remote_result {
            Ok(()) => {
                info!(class_id, "class deleted on remote");
                return Ok(());
            }
            Err(err) => err,
        };

        warn!(class_id, error = %err, "remote delete failed, removing class locally");
        let _blob = self.inner.blob.lock().await;
        let mut classes = self.load_local().await?;
        classes.retain(|c| c.id != class_id);
        self.persist(&classes).await?;
        Ok(())
    }

    /// View-focus hook. Starts a background revalidation unless one was
    /// triggered within the throttle window. Returns whether one started.
    pub fn refresh_on_focus(&self) -> bool {
        let now = self.inner.clock.now();
        {
            let mut last = self
                .inner
                .last_focus_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let due = match *last {
                None => true,
                Some(previous) => now
                    .signed_duration_since(previous)
                    .to_std()
                    .is_ok_and(|elapsed| elapsed > self.inner.revalidate_throttle),
            };
            if !due {
                return false;
            }
            *last = Some(now);
        }

        self.spawn_revalidation();
        true
    }

    /// Fetches the remote list and, unless a newer revalidation already
    /// landed, replaces the cached and stored list with it.
    pub async fn revalidate(&self) -> Revalidation {
        let ticket = self.next_ticket();
        match self.inner.remote.list_classes().await {
            Ok(remote) => {
                let classes = remote.into_iter().map(ClassRecord::from_remote).collect();
                self.apply_revalidation(ticket, classes).await
            }
            Err(err) => {
                warn!(ticket, error = %err, "class revalidation failed, keeping local view");
                Revalidation::Failed(err)
            }
        }
    }

    fn spawn_revalidation(&self) {
        let repository = self.clone();
        tokio::spawn(async move {
            repository.revalidate().await;
        });
    }

    fn next_ticket(&self) -> u64 {
        self.inner.next_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn apply_revalidation(
        &self,
        ticket: u64,
        classes: Vec<ClassRecord>,
    ) -> Revalidation {
        let mut blob = self.inner.blob.lock().await;
        if ticket <= blob.applied_ticket {
            debug!(ticket, applied = blob.applied_ticket, "dropping stale revalidation");
            return Revalidation::Stale { ticket };
        }
        blob.applied_ticket = ticket;

        self.inner.cache.set(CLASS_LIST_CACHE_KEY, classes.clone());
        if let Err(err) = save_json(&self.inner.store, CLASSES_KEY, &classes).await {
            warn!(error = %err, "failed to store revalidated classes");
        }
        info!(ticket, count = classes.len(), "class list revalidated");
        Revalidation::Applied(classes)
    }

    /// Read-modify-write of one class. `apply` returns whether it changed
    /// anything; unchanged classes are returned without a write.
    async fn modify_class<F>(
        &self,
        class_id: &str,
        apply: F,
    ) -> Result<ClassRecord, RepositoryError>
    where
        F: FnOnce(&mut ClassRecord) -> Result<bool, RepositoryError>,
    {
        let _blob = self.inner.blob.lock().await;
        let mut classes = self.load_local().await?;
        let class = classes
            .iter_mut()
            .find(|c| c.id == class_id)
            .ok_or_else(|| RepositoryError::NotFound(class_id.to_string()))?;

        if !apply(class)? {
            return Ok(class.clone());
        }
        let updated = class.clone();
        self.persist(&classes).await?;
        Ok(updated)
    }

    /// Stored list with defaults applied, seeding it on first run. Records
    /// that cannot be read are skipped so the rest stay usable.
    /// Callers hold the writer lock.
    async fn load_local(&self) -> Result<Vec<ClassRecord>, StoreError> {
        match load_json::<Vec<Value>>(&self.inner.store, CLASSES_KEY).await? {
            Some(raw) => Ok(decode_classes(raw)),
            None => {
                let seed = default_classes();
                save_json(&self.inner.store, CLASSES_KEY, &seed).await?;
                info!(count = seed.len(), "seeded default classes");
                Ok(seed)
            }
        }
    }

    async fn persist(&self, classes: &[ClassRecord]) -> Result<(), StoreError> {
        save_json(&self.inner.store, CLASSES_KEY, classes).await?;
        self.inner.cache.set(CLASS_LIST_CACHE_KEY, classes.to_vec());
        Ok(())
    }
}

fn decode_classes(raw: Vec<Value>) -> Vec<ClassRecord> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(class) => Some(class),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable stored class");
                None
            }
        })
        .collect()
}
