//! End-to-end tests of the ledger engine against a scripted remote and an
//! in-memory store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use crate::errors::Error;
use crate::ledger::{LaunchPhase, LedgerService};
use crate::remote::{PushError, RemoteLedgerClient};
use crate::store::{Collection, LedgerStore, StoreError};
use crate::transactions::Transaction;

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<HashMap<&'static str, Vec<Transaction>>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    fn saved(&self, collection: Collection) -> Vec<Transaction> {
        self.saved
            .lock()
            .unwrap()
            .get(collection.key())
            .cloned()
            .unwrap_or_default()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self, collection: Collection) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.saved(collection))
    }

    fn save(&self, collection: Collection, entries: &[Transaction]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Encode("scripted encode failure".to_string()));
        }
        self.saved
            .lock()
            .unwrap()
            .insert(collection.key(), entries.to_vec());
        Ok(())
    }
}

/// Remote that fails pushes for scripted occurrence dates and records
/// every call.
#[derive(Default)]
struct MockRemote {
    fail_dates: Mutex<HashSet<NaiveDate>>,
    fail_all: AtomicBool,
    pushes: Mutex<Vec<Transaction>>,
    archived: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl MockRemote {
    fn fail_on(&self, date: DateTime<Utc>) {
        self.fail_dates.lock().unwrap().insert(date.date_naive());
    }

    fn clear_failures(&self) {
        self.fail_dates.lock().unwrap().clear();
        self.fail_all.store(false, Ordering::SeqCst);
    }

    fn pushed(&self) -> Vec<Transaction> {
        self.pushes.lock().unwrap().clone()
    }

    fn archived(&self) -> Vec<String> {
        self.archived.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteLedgerClient for MockRemote {
    async fn create_entry(&self, entry: &Transaction) -> Result<String, PushError> {
        self.pushes.lock().unwrap().push(entry.clone());
        let failing = self.fail_all.load(Ordering::SeqCst)
            || self.fail_dates.lock().unwrap().contains(&entry.date.date_naive());
        if failing {
            return Err(PushError::Transport("connection reset".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("rec-{}", n))
    }

    async fn archive_entry(&self, external_id: &str) -> Result<(), PushError> {
        self.archived.lock().unwrap().push(external_id.to_string());
        Ok(())
    }
}

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn service(store: &Arc<MemoryStore>, remote: &Arc<MockRemote>) -> LedgerService {
    LedgerService::new(
        Arc::clone(store) as Arc<dyn LedgerStore>,
        Arc::clone(remote) as Arc<dyn RemoteLedgerClient>,
    )
}

fn monthly_gym(start: DateTime<Utc>) -> Transaction {
    Transaction::recurring(dec!(1000), "gym", start, vec!["health".to_string()], false, 1)
}

#[tokio::test]
async fn backfill_pushes_past_occurrences_and_schedules_next() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();

    let definition = monthly_gym(date(2024, 1, 1));
    let group = definition.recurring_group_id;
    svc.record_at(definition, date(2024, 3, 15)).await.unwrap();

    let ledger = svc.context().ledger().await;
    let mut ledger_dates: Vec<_> = ledger.iter().map(|t| t.date).collect();
    ledger_dates.sort();
    assert_eq!(
        ledger_dates,
        vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]
    );
    assert!(ledger.iter().all(|t| t.external_id.is_some()));
    assert!(ledger.iter().all(|t| t.recurring_group_id == group));

    let schedule = svc.context().schedule().await;
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].date, date(2024, 4, 1));
    assert_eq!(schedule[0].external_id, None);

    assert!(svc.context().failed().await.is_empty());
    // Collections were persisted as-is.
    assert_eq!(store.saved(Collection::Ledger).len(), 3);
    assert_eq!(store.saved(Collection::Schedule).len(), 1);
}

#[tokio::test]
async fn future_definition_is_scheduled_without_any_push() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();

    let definition = monthly_gym(date(2024, 4, 1));
    svc.record_at(definition.clone(), date(2024, 3, 15)).await.unwrap();

    assert!(remote.pushed().is_empty());
    assert!(svc.context().ledger().await.is_empty());
    let schedule = svc.context().schedule().await;
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].id, definition.id);
}

#[tokio::test]
async fn failed_push_is_queued_and_drained_by_next_launch() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    remote.fail_on(date(2024, 2, 1));

    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
    svc.record_at(monthly_gym(date(2024, 1, 1)), date(2024, 3, 15))
        .await
        .unwrap();

    let ledger_dates: HashSet<_> = svc.context().ledger().await.iter().map(|t| t.date).collect();
    assert_eq!(
        ledger_dates,
        HashSet::from([date(2024, 1, 1), date(2024, 3, 1)])
    );
    let failed = svc.context().failed().await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].date, date(2024, 2, 1));
    assert_eq!(failed[0].external_id, None);

    // Next process start with a healthy transport.
    remote.clear_failures();
    let svc2 = service(&store, &remote);
    svc2.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();

    assert!(svc2.context().failed().await.is_empty());
    let ledger = svc2.context().ledger().await;
    assert_eq!(ledger.len(), 3);
    assert!(ledger.iter().all(|t| t.external_id.is_some()));
    assert!(store.saved(Collection::Failed).is_empty());
}

#[tokio::test]
async fn entry_still_failing_stays_queued_exactly_once() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    remote.fail_all.store(true, Ordering::SeqCst);

    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
    svc.record_at(
        Transaction::one_off(dec!(480), "coffee", date(2024, 3, 10), vec![], false),
        date(2024, 3, 15),
    )
    .await
    .unwrap();
    assert_eq!(svc.context().failed().await.len(), 1);

    // Two more launches while the remote keeps failing.
    for _ in 0..2 {
        let next = service(&store, &remote);
        next.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
        assert_eq!(next.context().failed().await.len(), 1);
        assert!(next.context().ledger().await.is_empty());
    }
}

#[tokio::test]
async fn due_promotion_rearms_and_second_run_is_a_noop() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());

    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
    let definition = monthly_gym(date(2024, 4, 1));
    svc.record_at(definition.clone(), date(2024, 3, 15)).await.unwrap();

    // Relaunch after the due date has arrived.
    let svc2 = service(&store, &remote);
    svc2.run_startup_sequence_at(date(2024, 4, 2)).await.unwrap();

    let ledger = svc2.context().ledger().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].date, date(2024, 4, 1));
    assert!(ledger[0].external_id.is_some());

    let schedule = svc2.context().schedule().await;
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].date, date(2024, 5, 1));
    assert_eq!(schedule[0].external_id, None);

    // No elapsed time: nothing is due twice.
    let pushes_before = remote.pushed().len();
    let svc3 = service(&store, &remote);
    svc3.run_startup_sequence_at(date(2024, 4, 2)).await.unwrap();
    assert_eq!(remote.pushed().len(), pushes_before);
    assert_eq!(svc3.context().ledger().await.len(), 1);
    assert_eq!(svc3.context().schedule().await[0].date, date(2024, 5, 1));
}

#[tokio::test]
async fn delete_entry_removes_pending_twin_and_archives_remote_record() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());

    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
    let definition = monthly_gym(date(2024, 4, 1));
    svc.record_at(definition, date(2024, 3, 15)).await.unwrap();

    // Promote so the ledger entry and its re-armed twin share an id.
    let svc2 = service(&store, &remote);
    svc2.run_startup_sequence_at(date(2024, 4, 2)).await.unwrap();
    let promoted = svc2.context().ledger().await.remove(0);
    assert_eq!(svc2.context().schedule().await[0].id, promoted.id);

    svc2.delete_entry(promoted.id).await;

    assert!(svc2.context().ledger().await.is_empty());
    assert!(svc2.context().schedule().await.is_empty());
    assert_eq!(remote.archived(), vec![promoted.external_id.unwrap()]);
}

#[tokio::test]
async fn delete_recurring_group_empties_both_collections_and_archives() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    remote.fail_on(date(2024, 2, 1));

    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
    let definition = monthly_gym(date(2024, 1, 1));
    let group = definition.recurring_group_id.unwrap();
    svc.record_at(definition, date(2024, 3, 15)).await.unwrap();

    svc.delete_recurring_group(group).await;

    assert!(svc.context().ledger().await.is_empty());
    assert!(svc.context().schedule().await.is_empty());
    // One archive per removed ledger entry that had a remote id; the
    // failed 02-01 occurrence never got one.
    assert_eq!(remote.archived().len(), 2);
}

#[tokio::test]
async fn cancel_future_leaves_ledger_history_untouched() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());

    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
    let definition = monthly_gym(date(2024, 1, 1));
    let group = definition.recurring_group_id.unwrap();
    svc.record_at(definition, date(2024, 3, 15)).await.unwrap();

    svc.cancel_future_occurrences(group).await;

    assert_eq!(svc.context().ledger().await.len(), 3);
    assert!(svc.context().schedule().await.is_empty());
    assert!(remote.archived().is_empty());
}

#[tokio::test]
async fn startup_sequence_runs_exactly_once_per_process() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    let svc = service(&store, &remote);

    assert_eq!(svc.launch_phase(), LaunchPhase::Idle);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();
    assert_eq!(svc.launch_phase(), LaunchPhase::Ready);

    let second = svc.run_startup_sequence_at(date(2024, 3, 15)).await;
    assert!(matches!(second, Err(Error::StartupAlreadyRan)));
}

#[tokio::test]
async fn persist_failure_keeps_in_memory_state() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();

    store.fail_saves.store(true, Ordering::SeqCst);
    svc.record_at(
        Transaction::one_off(dec!(480), "coffee", date(2024, 3, 10), vec![], false),
        date(2024, 3, 15),
    )
    .await
    .unwrap();

    // The write is abandoned silently; memory is unaffected.
    assert_eq!(svc.context().ledger().await.len(), 1);
    assert!(store.saved(Collection::Ledger).is_empty());
}

#[tokio::test]
async fn malformed_entry_is_rejected_before_any_push() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();

    let mut entry = Transaction::one_off(dec!(480), "coffee", date(2024, 3, 10), vec![], false);
    entry.period_months = Some(1);

    assert!(matches!(
        svc.record_at(entry, date(2024, 3, 15)).await,
        Err(Error::Validation(_))
    ));
    assert!(remote.pushed().is_empty());
}

#[tokio::test]
async fn subscribers_observe_collection_changes() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();

    let mut changes = svc.context().subscribe();
    let revision = *changes.borrow_and_update();
    svc.record_at(
        Transaction::one_off(dec!(480), "coffee", date(2024, 3, 10), vec![], false),
        date(2024, 3, 15),
    )
    .await
    .unwrap();
    assert!(changes.has_changed().unwrap());
    assert_ne!(*changes.borrow_and_update(), revision);
}

#[tokio::test]
async fn ledger_reads_are_most_recent_first_and_filterable() {
    let store = Arc::new(MemoryStore::default());
    let remote = Arc::new(MockRemote::default());
    let svc = service(&store, &remote);
    svc.run_startup_sequence_at(date(2024, 3, 15)).await.unwrap();

    svc.record_at(
        Transaction::one_off(dec!(480), "coffee", date(2024, 3, 10), vec![], false),
        date(2024, 3, 15),
    )
    .await
    .unwrap();
    svc.record_at(
        Transaction::one_off(dec!(250000), "salary", date(2024, 2, 25), vec![], true),
        date(2024, 3, 15),
    )
    .await
    .unwrap();
    svc.record_at(monthly_gym(date(2024, 3, 1)), date(2024, 3, 15))
        .await
        .unwrap();

    let all = svc.context().ledger().await;
    let dates: Vec<_> = all.iter().map(|t| t.date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 3, 10), date(2024, 3, 1), date(2024, 2, 25)]
    );

    let expenses = svc.context().ledger_matching(false, false).await;
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].memo, "coffee");

    let subscriptions = svc.context().ledger_matching(false, true).await;
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].memo, "gym");
}
