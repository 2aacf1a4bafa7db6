//! The financial entry record: one-off entries and dated occurrences of
//! recurring definitions share this shape.

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, Result};

/// One financial record.
///
/// `period_months` and `recurring_group_id` are present if and only if
/// `is_recurring` is set; every occurrence expanded from one recurring
/// definition shares the same `recurring_group_id`. `external_id` is the
/// remote record id and is only ever assigned after a successful push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub amount: Decimal,
    pub memo: String,
    pub date: DateTime<Utc>,
    pub tags: Vec<String>,
    pub is_income: bool,
    pub is_recurring: bool,
    pub period_months: Option<u32>,
    pub recurring_group_id: Option<Uuid>,
}

impl Transaction {
    /// Create a one-off entry.
    pub fn one_off(
        amount: Decimal,
        memo: impl Into<String>,
        date: DateTime<Utc>,
        tags: Vec<String>,
        is_income: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            amount,
            memo: memo.into(),
            date,
            tags,
            is_income,
            is_recurring: false,
            period_months: None,
            recurring_group_id: None,
        }
    }

    /// Create a recurring definition with a fresh recurring group.
    pub fn recurring(
        amount: Decimal,
        memo: impl Into<String>,
        date: DateTime<Utc>,
        tags: Vec<String>,
        is_income: bool,
        period_months: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            amount,
            memo: memo.into(),
            date,
            tags,
            is_income,
            is_recurring: true,
            period_months: Some(period_months),
            recurring_group_id: Some(Uuid::new_v4()),
        }
    }

    /// Check the structural invariants of an entry handed to the engine.
    pub fn validate(&self) -> Result<()> {
        if self.amount.is_sign_negative() {
            return Err(Error::validation("amount must not be negative"));
        }
        match (self.is_recurring, self.period_months, self.recurring_group_id) {
            (true, Some(period), Some(_)) if period >= 1 => Ok(()),
            (true, Some(_), Some(_)) => {
                Err(Error::validation("period_months must be at least 1"))
            }
            (true, _, _) => Err(Error::validation(
                "recurring entry requires period_months and recurring_group_id",
            )),
            (false, None, None) => Ok(()),
            (false, _, _) => Err(Error::validation(
                "one-off entry must not carry recurrence fields",
            )),
        }
    }

    /// Date of the occurrence after this one, using calendar month
    /// arithmetic (month-end days clamp). None for one-off entries.
    pub fn next_occurrence_date(&self) -> Option<DateTime<Utc>> {
        let period = self.period_months?;
        self.date.checked_add_months(Months::new(period))
    }

    /// A fresh occurrence of this entry at `date`: new id, no remote id,
    /// same recurring group.
    pub fn occurrence_at(&self, date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            date,
            ..self.clone()
        }
    }
}
