//! Expansion of a recurring definition into dated occurrences.

use chrono::{DateTime, Months, Utc};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::transactions::Transaction;

/// Result of expanding one recurring definition.
#[derive(Debug, Clone)]
pub struct ExpandedRecurrence {
    /// Occurrences whose date already passed; each must be pushed.
    pub backfill: Vec<Transaction>,
    /// The single pending occurrence for this group. Not pushed.
    pub next: Transaction,
}

/// Expand a recurring definition observed at `now`.
///
/// Occurrence dates run `D, D+P, D+2P, ...` by calendar month addition.
/// Every date strictly before `now` becomes a backfill occurrence with a
/// fresh id; the first date at or past `now` becomes the pending entry.
/// When the definition's own date is not in the past, the definition
/// itself is the pending entry. All results share one recurring group id,
/// assigned here if the definition has none yet.
pub fn expand_recurring(definition: &Transaction, now: DateTime<Utc>) -> Result<ExpandedRecurrence> {
    let period = definition
        .period_months
        .filter(|period| *period >= 1)
        .ok_or_else(|| Error::validation("recurring definition requires a positive period"))?;

    let mut definition = definition.clone();
    definition
        .recurring_group_id
        .get_or_insert_with(Uuid::new_v4);

    let mut backfill = Vec::new();
    let mut cursor = definition.date;
    while cursor < now {
        backfill.push(definition.occurrence_at(cursor));
        cursor = cursor
            .checked_add_months(Months::new(period))
            .ok_or_else(|| Error::validation("occurrence date out of range"))?;
    }

    let next = if backfill.is_empty() {
        definition
    } else {
        definition.occurrence_at(cursor)
    };

    Ok(ExpandedRecurrence { backfill, next })
}
