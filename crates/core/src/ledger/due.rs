//! Promotion of scheduled entries whose due date has arrived.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info};

use crate::ledger::push::push_entry;
use crate::ledger::LedgerContext;
use crate::remote::RemoteLedgerClient;
use crate::transactions::Transaction;

/// Promote every scheduled entry with `date <= now` into a confirmed
/// entry and re-arm its next occurrence.
///
/// The schedule queue is replaced wholesale — the not-yet-due entries plus
/// one successor per promoted entry — and persisted before the promoted
/// entries are pushed, so exactly one pending occurrence per recurring
/// group exists at all times. Push outcomes land in the ledger or the
/// failure queue independently. With nothing due, the call still rewrites
/// the queue to itself.
pub async fn promote_due_entries(
    context: &LedgerContext,
    client: &dyn RemoteLedgerClient,
    now: DateTime<Utc>,
) {
    let schedule = context.schedule().await;
    let (due, pending): (Vec<_>, Vec<_>) =
        schedule.into_iter().partition(|entry| entry.date <= now);

    if !due.is_empty() {
        info!("Promoting {} due scheduled entries", due.len());
    }

    let mut replacement = pending;
    for entry in &due {
        if let Some(successor) = successor_of(entry) {
            debug!(
                "Re-armed group {:?} for {}",
                entry.recurring_group_id, successor.date
            );
            replacement.push(successor);
        }
    }
    context.replace_schedule(replacement).await;

    join_all(
        due.into_iter()
            .map(|entry| push_entry(context, client, entry)),
    )
    .await;
}

/// The occurrence that replaces a promoted entry: same chain id, date
/// advanced by one period, remote id cleared.
fn successor_of(entry: &Transaction) -> Option<Transaction> {
    let next_date = entry.next_occurrence_date()?;
    let mut successor = entry.clone();
    successor.date = next_date;
    successor.external_id = None;
    Some(successor)
}
