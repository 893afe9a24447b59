//! In-memory translation cache with change notification.
//!
//! Records live under two kinds of keys: the bare text id (the original
//! text, always renderable) and the composite `<id>_<lang>` key holding a
//! resolved translation. Only `TranslationService` mutates the store; any
//! number of readers can subscribe to changes.

use crate::identity::{identify, TextId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;

/// Cached state of one text, or of one text in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    /// Key the record is stored under
    pub id: String,
    pub original_text: String,
    /// `None` until something renderable is known
    pub translated_text: Option<String>,
    /// A translation request for this text is outstanding
    pub in_flight: bool,
    /// Target language, set on composite records only
    pub language: Option<String>,
}

impl TranslationRecord {
    /// Base record for a freshly registered text.
    fn registered(id: &TextId, original_text: &str) -> Self {
        Self {
            id: id.to_string(),
            original_text: original_text.to_string(),
            translated_text: Some(original_text.to_string()),
            in_flight: false,
            language: None,
        }
    }

    /// Whether the record carries a usable translation.
    pub fn has_translation(&self) -> bool {
        self.translated_text
            .as_deref()
            .is_some_and(|text| !text.is_empty())
    }
}

/// What changed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Updated { key: String },
    Cleared,
}

/// Handle returned by [`TranslationStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

pub struct TranslationStore {
    records: RwLock<HashMap<String, TranslationRecord>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    revision: watch::Sender<u64>,
}

impl TranslationStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            records: RwLock::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            revision,
        }
    }

    /// Register `original_text` and return its id.
    ///
    /// Idempotent: an existing record for the same identity is left as is.
    pub fn register(&self, original_text: &str) -> TextId {
        let id = identify(original_text);

        let inserted = {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            if records.contains_key(id.as_str()) {
                false
            } else {
                records.insert(
                    id.to_string(),
                    TranslationRecord::registered(&id, original_text),
                );
                true
            }
        };

        if inserted {
            self.notify(StoreEvent::Updated { key: id.to_string() });
        }
        id
    }

    /// Look up a record, preferring the translation into `language_code`.
    ///
    /// Falls back to the base record so callers always have the original
    /// text to render while a translation is missing or pending.
    pub fn get(&self, id: &TextId, language_code: Option<&str>) -> Option<TranslationRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(code) = language_code {
            let key = id.composite(code);
            if let Some(record) = records.get(key.as_str()) {
                return Some(record.clone());
            }
        }

        records.get(id.as_str()).cloned()
    }

    /// Exact lookup by raw key, with no fallback.
    pub fn get_exact(&self, key: impl AsRef<str>) -> Option<TranslationRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_ref())
            .cloned()
    }

    pub fn set(&self, key: impl AsRef<str>, record: TranslationRecord) {
        let key = key.as_ref().to_string();
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), record);
        self.notify(StoreEvent::Updated { key });
    }

    /// Flip the in-flight flag of an existing record. Returns false if the
    /// key is unknown.
    pub fn set_in_flight(&self, key: impl AsRef<str>, in_flight: bool) -> bool {
        let key = key.as_ref();
        let updated = {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            match records.get_mut(key) {
                Some(record) => {
                    record.in_flight = in_flight;
                    true
                }
                None => false,
            }
        };

        if updated {
            self.notify(StoreEvent::Updated {
                key: key.to_string(),
            });
        }
        updated
    }

    /// Snapshot of every record, base and composite.
    pub fn all(&self) -> Vec<TranslationRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.notify(StoreEvent::Cleared);
    }

    /// Call `listener` after every mutation.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Revision counter bumped on every mutation, for async consumers.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: StoreEvent) {
        self.revision.send_modify(|revision| *revision += 1);

        // Listeners run outside the lock so they may read the store or unsubscribe
        let listeners: Vec<Listener> = self
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Default for TranslationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TranslationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationStore")
            .field("records", &self.len())
            .field("listeners", &self.listeners().len())
            .finish()
    }
}
