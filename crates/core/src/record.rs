use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::money::Money;
use super::validate::ValidationError;

pub type TransactionId = i64;

/// The fixed column set of every stored transaction file, in order.
pub const HEADER: [&str; 5] = ["transaction_id", "bank", "date", "amount", "description"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub bank: String,
    pub date: NaiveDate,
    pub amount: Money,
    pub description: String,
}

/// Equality key used to pair records across two files. The transaction id is
/// not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    bank: String,
    date: NaiveDate,
    amount: String,
    description: String,
}

impl TransactionRecord {
    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey {
            bank: self.bank.clone(),
            date: self.date,
            amount: self.amount.to_string(),
            description: self.description.clone(),
        }
    }

    /// Canonical CSV fields in `HEADER` order.
    pub fn to_fields(&self) -> [String; 5] {
        [
            self.transaction_id.to_string(),
            self.bank.clone(),
            self.date.format("%Y-%m-%d").to_string(),
            self.amount.to_string(),
            self.description.clone(),
        ]
    }
}

/// `max(existing) + 1`, or 1 for an empty file. Fails once `max` is
/// `i64::MAX`; ids are never reused or wrapped.
pub fn next_transaction_id(records: &[TransactionRecord]) -> Result<TransactionId, ValidationError> {
    match records.iter().map(|r| r.transaction_id).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or(ValidationError::IdSpaceExhausted),
    }
}
