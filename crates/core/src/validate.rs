//! Field rules shared by every path that turns caller text into a stored
//! record: single-row add/update and bulk upload.
//!
//! Checks always run in the same order (required fields, text length, date,
//! amount, id format) so the first reported error is reproducible.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::Money;
use super::record::{TransactionId, TransactionRecord};

/// Longest accepted `bank` or `description`, in characters.
pub const MAX_TEXT_CHARS: usize = 49;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("All fields must be provided: missing {0}")]
    MissingField(&'static str),
    #[error("{0} must be between 1 and 49 characters")]
    FieldLength(&'static str),
    #[error("{field} must be in the format yyyy-mm-dd, got '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("Amount must be a number, got '{0}'")]
    InvalidAmount(String),
    #[error("Transaction ID must be an integer, got '{0}'")]
    InvalidTransactionId(String),
    #[error("No transaction ID left to assign after {max}; supply transaction_id explicitly", max = i64::MAX)]
    IdSpaceExhausted,
    #[error("At least one field (bank, date, amount, description) must be provided for update")]
    EmptyUpdate,
    #[error("sort_by must be one of 'bank', 'amount', 'description', or 'date', got '{0}'")]
    InvalidSortField(String),
    #[error("order must be either 'ascending' or 'descending', got '{0}'")]
    InvalidSortOrder(String),
}

pub fn check_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len == 0 || len > MAX_TEXT_CHARS {
        return Err(ValidationError::FieldLength(field));
    }
    Ok(())
}

pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

pub fn parse_amount(value: &str) -> Result<Money, ValidationError> {
    value
        .parse::<Money>()
        .map_err(|_| ValidationError::InvalidAmount(value.to_string()))
}

/// Surrounding whitespace, a leading `+` and leading zeros are accepted;
/// the stored form is always the plain integer.
pub fn parse_transaction_id(value: &str) -> Result<TransactionId, ValidationError> {
    value
        .trim()
        .parse::<TransactionId>()
        .map_err(|_| ValidationError::InvalidTransactionId(value.to_string()))
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Unvalidated text for a new record. `transaction_id` is optional; when it is
/// absent the row store assigns the next id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub transaction_id: Option<String>,
    pub bank: Option<String>,
    pub date: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub transaction_id: Option<TransactionId>,
    pub bank: String,
    pub date: NaiveDate,
    pub amount: Money,
    pub description: String,
}

impl RecordDraft {
    pub fn validate(&self) -> Result<ValidDraft, ValidationError> {
        let bank = required("bank", &self.bank)?;
        let date = required("date", &self.date)?;
        let amount = required("amount", &self.amount)?;
        let description = required("description", &self.description)?;

        check_text("bank", bank)?;
        check_text("description", description)?;
        let date = parse_date("date", date)?;
        let amount = parse_amount(amount)?;
        let transaction_id = self
            .transaction_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(parse_transaction_id)
            .transpose()?;

        Ok(ValidDraft {
            transaction_id,
            bank: bank.to_string(),
            date,
            amount,
            description: description.to_string(),
        })
    }
}

impl ValidDraft {
    pub fn into_record(self, transaction_id: TransactionId) -> TransactionRecord {
        TransactionRecord {
            transaction_id,
            bank: self.bank,
            date: self.date,
            amount: self.amount,
            description: self.description,
        }
    }
}

/// Partial update. Only the supplied fields are validated and overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub bank: Option<String>,
    pub date: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidPatch {
    pub bank: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Money>,
    pub description: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.bank.is_none() && self.date.is_none() && self.amount.is_none() && self.description.is_none()
    }

    pub fn validate(&self) -> Result<ValidPatch, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(bank) = &self.bank {
            check_text("bank", bank)?;
        }
        if let Some(description) = &self.description {
            check_text("description", description)?;
        }
        let date = self.date.as_deref().map(|d| parse_date("date", d)).transpose()?;
        let amount = self.amount.as_deref().map(parse_amount).transpose()?;

        Ok(ValidPatch {
            bank: self.bank.clone(),
            date,
            amount,
            description: self.description.clone(),
        })
    }
}

impl ValidPatch {
    pub fn apply(&self, record: &mut TransactionRecord) {
        if let Some(bank) = &self.bank {
            record.bank = bank.clone();
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
    }
}
