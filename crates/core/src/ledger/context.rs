//! Shared mutable state for the three collections.
//!
//! The context is the single serialization point of the engine: every
//! mutation — including every push completion — goes through one
//! `tokio::sync::Mutex`, so two concurrent completions can never interleave
//! a read-modify-write on the same collection. The touched collection is
//! persisted as a full overwrite before the lock is released. Persist
//! failures are logged and swallowed; the in-memory state stays
//! authoritative for the rest of the process lifetime.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::store::{Collection, LedgerStore};
use crate::transactions::Transaction;

#[derive(Debug, Default)]
struct Collections {
    ledger: Vec<Transaction>,
    schedule: Vec<Transaction>,
    failed: Vec<Transaction>,
}

/// Owner of the ledger, schedule queue, and failure queue.
pub struct LedgerContext {
    store: Arc<dyn LedgerStore>,
    collections: Mutex<Collections>,
    revision: watch::Sender<u64>,
}

impl LedgerContext {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store,
            collections: Mutex::new(Collections::default()),
            revision,
        }
    }

    /// Subscribe to collection changes. The value is a revision counter;
    /// observers re-read the snapshots they care about when it moves.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Load all three collections from the store, replacing in-memory
    /// state. A collection that fails to load is treated as empty.
    pub async fn load_all(&self) {
        let mut collections = self.collections.lock().await;
        collections.ledger = self.load_collection(Collection::Ledger);
        collections.schedule = self.load_collection(Collection::Schedule);
        collections.failed = self.load_collection(Collection::Failed);
        drop(collections);
        self.bump();
    }

    fn load_collection(&self, collection: Collection) -> Vec<Transaction> {
        match self.store.load(collection) {
            Ok(entries) => {
                debug!("Loaded {} entries from '{}'", entries.len(), collection.key());
                entries
            }
            Err(err) => {
                warn!("Failed to load '{}', starting empty: {}", collection.key(), err);
                Vec::new()
            }
        }
    }

    /// Confirmed entries, most recent first.
    pub async fn ledger(&self) -> Vec<Transaction> {
        let mut entries = self.collections.lock().await.ledger.clone();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }

    /// Confirmed entries filtered by direction and kind, most recent first.
    pub async fn ledger_matching(&self, is_income: bool, is_recurring: bool) -> Vec<Transaction> {
        let mut entries: Vec<Transaction> = self
            .collections
            .lock()
            .await
            .ledger
            .iter()
            .filter(|entry| entry.is_income == is_income && entry.is_recurring == is_recurring)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }

    /// Pending future occurrences.
    pub async fn schedule(&self) -> Vec<Transaction> {
        self.collections.lock().await.schedule.clone()
    }

    /// Entries awaiting a retry of their remote push.
    pub async fn failed(&self) -> Vec<Transaction> {
        self.collections.lock().await.failed.clone()
    }

    /// Commit a successfully pushed entry to the ledger.
    pub async fn commit_confirmed(&self, mut entry: Transaction, external_id: String) {
        entry.external_id = Some(external_id);
        let mut collections = self.collections.lock().await;
        collections.ledger.push(entry);
        self.persist(Collection::Ledger, &collections.ledger);
        drop(collections);
        self.bump();
    }

    /// Divert an entry whose push failed into the failure queue, unchanged.
    pub async fn commit_failed(&self, entry: Transaction) {
        let mut collections = self.collections.lock().await;
        collections.failed.push(entry);
        self.persist(Collection::Failed, &collections.failed);
        drop(collections);
        self.bump();
    }

    /// Move a retried entry out of the failure queue into the ledger.
    pub async fn resolve_retry(&self, mut entry: Transaction, external_id: String) {
        entry.external_id = Some(external_id);
        let mut collections = self.collections.lock().await;
        collections.failed.retain(|failed| failed.id != entry.id);
        collections.ledger.push(entry);
        self.persist(Collection::Failed, &collections.failed);
        self.persist(Collection::Ledger, &collections.ledger);
        drop(collections);
        self.bump();
    }

    /// Add one pending occurrence to the schedule queue.
    pub async fn enqueue_scheduled(&self, entry: Transaction) {
        let mut collections = self.collections.lock().await;
        collections.schedule.push(entry);
        self.persist(Collection::Schedule, &collections.schedule);
        drop(collections);
        self.bump();
    }

    /// Replace the schedule queue wholesale. The replacement is persisted
    /// even when identical to the current queue.
    pub async fn replace_schedule(&self, entries: Vec<Transaction>) {
        let mut collections = self.collections.lock().await;
        collections.schedule = entries;
        self.persist(Collection::Schedule, &collections.schedule);
        drop(collections);
        self.bump();
    }

    /// Remove one entry from the ledger and, if a pending twin shares its
    /// id, from the schedule queue. Returns the removed ledger entry.
    pub async fn remove_entry(&self, id: Uuid) -> Option<Transaction> {
        let mut collections = self.collections.lock().await;
        let position = collections.ledger.iter().position(|entry| entry.id == id);
        let removed = position.map(|index| collections.ledger.remove(index));
        if removed.is_some() {
            self.persist(Collection::Ledger, &collections.ledger);
        }
        let scheduled_before = collections.schedule.len();
        collections.schedule.retain(|entry| entry.id != id);
        let schedule_changed = collections.schedule.len() != scheduled_before;
        if schedule_changed {
            self.persist(Collection::Schedule, &collections.schedule);
        }
        drop(collections);
        if removed.is_some() || schedule_changed {
            self.bump();
        }
        removed
    }

    /// Remove every ledger and schedule entry of a recurring group.
    /// Returns the removed ledger entries.
    pub async fn remove_group(&self, group: Uuid) -> Vec<Transaction> {
        let mut collections = self.collections.lock().await;
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut collections.ledger)
            .into_iter()
            .partition(|entry| entry.recurring_group_id == Some(group));
        collections.ledger = kept;
        collections
            .schedule
            .retain(|entry| entry.recurring_group_id != Some(group));
        self.persist(Collection::Ledger, &collections.ledger);
        self.persist(Collection::Schedule, &collections.schedule);
        drop(collections);
        self.bump();
        removed
    }

    /// Remove the pending occurrences of a recurring group, leaving its
    /// ledger history untouched. Returns how many entries were dropped.
    pub async fn cancel_group_schedule(&self, group: Uuid) -> usize {
        let mut collections = self.collections.lock().await;
        let before = collections.schedule.len();
        collections
            .schedule
            .retain(|entry| entry.recurring_group_id != Some(group));
        let dropped = before - collections.schedule.len();
        self.persist(Collection::Schedule, &collections.schedule);
        drop(collections);
        self.bump();
        dropped
    }

    fn persist(&self, collection: Collection, entries: &[Transaction]) {
        if let Err(err) = self.store.save(collection, entries) {
            warn!("Failed to persist '{}': {}", collection.key(), err);
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}
