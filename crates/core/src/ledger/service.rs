//! User-facing ledger operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, warn};
use uuid::Uuid;

use crate::errors::Result;
use crate::ledger::launch::{LaunchCoordinator, LaunchPhase};
use crate::ledger::push::push_entry;
use crate::ledger::recurrence::expand_recurring;
use crate::ledger::LedgerContext;
use crate::remote::RemoteLedgerClient;
use crate::store::LedgerStore;
use crate::transactions::Transaction;

/// Facade over the ledger engine.
///
/// Every user-initiated write appears to succeed immediately: local state
/// commits whether or not the remote push does, and failed pushes surface
/// only as failure-queue membership.
pub struct LedgerService {
    context: Arc<LedgerContext>,
    client: Arc<dyn RemoteLedgerClient>,
    launch: LaunchCoordinator,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, client: Arc<dyn RemoteLedgerClient>) -> Self {
        Self {
            context: Arc::new(LedgerContext::new(store)),
            client,
            launch: LaunchCoordinator::new(),
        }
    }

    /// The shared collection context, for readers and subscribers.
    pub fn context(&self) -> Arc<LedgerContext> {
        Arc::clone(&self.context)
    }

    pub fn launch_phase(&self) -> LaunchPhase {
        self.launch.phase()
    }

    /// Run the startup sequence. Must be invoked exactly once per process
    /// start, before any reader accesses the collections.
    pub async fn run_startup_sequence(&self) -> Result<()> {
        self.run_startup_sequence_at(Utc::now()).await
    }

    /// Startup sequence with an explicit observation instant.
    pub async fn run_startup_sequence_at(&self, now: DateTime<Utc>) -> Result<()> {
        self.launch
            .run_startup_sequence(&self.context, self.client.as_ref(), now)
            .await
    }

    /// Record a new entry.
    ///
    /// One-off entries are pushed directly. Recurring definitions are
    /// expanded: past occurrences are pushed concurrently and the single
    /// next occurrence is scheduled without a push.
    pub async fn record(&self, entry: Transaction) -> Result<()> {
        self.record_at(entry, Utc::now()).await
    }

    /// [`record`](Self::record) with an explicit observation instant.
    pub async fn record_at(&self, entry: Transaction, now: DateTime<Utc>) -> Result<()> {
        entry.validate()?;

        if entry.is_recurring {
            let expansion = expand_recurring(&entry, now)?;
            self.context.enqueue_scheduled(expansion.next).await;
            join_all(
                expansion
                    .backfill
                    .into_iter()
                    .map(|occurrence| push_entry(&self.context, self.client.as_ref(), occurrence)),
            )
            .await;
        } else {
            push_entry(&self.context, self.client.as_ref(), entry).await;
        }
        Ok(())
    }

    /// Delete one entry: drop it from the ledger (and its pending twin
    /// from the schedule queue), then request remote archival if it was
    /// ever pushed.
    pub async fn delete_entry(&self, id: Uuid) {
        let Some(removed) = self.context.remove_entry(id).await else {
            return;
        };
        if let Some(external_id) = removed.external_id {
            self.archive_remote(vec![external_id]).await;
        }
    }

    /// Terminate a subscription entirely: every ledger entry and pending
    /// occurrence of the group goes, with one archive request per removed
    /// entry that had reached the remote store.
    pub async fn delete_recurring_group(&self, group: Uuid) {
        let removed = self.context.remove_group(group).await;
        let external_ids: Vec<String> = removed
            .into_iter()
            .filter_map(|entry| entry.external_id)
            .collect();
        self.archive_remote(external_ids).await;
    }

    /// Stop future billing for a group; ledger history stays.
    pub async fn cancel_future_occurrences(&self, group: Uuid) {
        let dropped = self.context.cancel_group_schedule(group).await;
        debug!("Cancelled {} pending occurrence(s) of group {}", dropped, group);
    }

    /// Best-effort remote archival. Outcomes are logged and forgotten;
    /// local deletion has already committed and is never rolled back.
    async fn archive_remote(&self, external_ids: Vec<String>) {
        join_all(external_ids.into_iter().map(|external_id| async move {
            match self.client.archive_entry(&external_id).await {
                Ok(()) => debug!("Archived remote record {}", external_id),
                Err(err) => {
                    warn!("Failed to archive remote record {}: {}", external_id, err)
                }
            }
        }))
        .await;
    }
}
