//! Retry sweep over the failure queue.

use futures::future::join_all;
use log::{debug, info};

use crate::ledger::LedgerContext;
use crate::remote::RemoteLedgerClient;

/// Re-attempt every entry currently in the failure queue, once each.
///
/// Attempts run concurrently and independently. A success moves the entry
/// into the ledger with its newly assigned remote id; a failure leaves it
/// queued, untouched, for the next process start. There is no backoff and
/// no attempt cutoff.
pub async fn retry_failed_entries(context: &LedgerContext, client: &dyn RemoteLedgerClient) {
    let failed = context.failed().await;
    if failed.is_empty() {
        return;
    }
    info!("Retrying {} queued push(es)", failed.len());

    join_all(failed.into_iter().map(|entry| async move {
        match client.create_entry(&entry).await {
            Ok(external_id) => {
                debug!("Retry succeeded for entry {} as {}", entry.id, external_id);
                context.resolve_retry(entry, external_id).await;
            }
            Err(err) => {
                debug!("Retry failed for entry {}, keeping it queued: {}", entry.id, err);
            }
        }
    }))
    .await;
}
