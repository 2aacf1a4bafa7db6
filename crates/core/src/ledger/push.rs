//! Single-attempt push with outcome routing.

use log::{debug, warn};

use crate::ledger::LedgerContext;
use crate::remote::RemoteLedgerClient;
use crate::transactions::Transaction;

/// Push one entry and commit the outcome: the ledger on success, the
/// failure queue on any failure. The failure never propagates to the
/// caller; queue membership is the only record of it.
pub(crate) async fn push_entry(
    context: &LedgerContext,
    client: &dyn RemoteLedgerClient,
    entry: Transaction,
) {
    match client.create_entry(&entry).await {
        Ok(external_id) => {
            debug!("Pushed entry {} as remote record {}", entry.id, external_id);
            context.commit_confirmed(entry, external_id).await;
        }
        Err(err) => {
            warn!("Push failed for entry {}, queueing for retry: {}", entry.id, err);
            context.commit_failed(entry).await;
        }
    }
}
