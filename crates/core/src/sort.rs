use std::cmp::Ordering;
use std::str::FromStr;

use super::record::TransactionRecord;
use super::validate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Bank,
    Amount,
    Description,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" => Ok(SortField::Bank),
            "amount" => Ok(SortField::Amount),
            "description" => Ok(SortField::Description),
            "date" => Ok(SortField::Date),
            other => Err(ValidationError::InvalidSortField(other.to_string())),
        }
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(SortOrder::Ascending),
            "descending" => Ok(SortOrder::Descending),
            other => Err(ValidationError::InvalidSortOrder(other.to_string())),
        }
    }
}

impl SortField {
    fn compare(self, a: &TransactionRecord, b: &TransactionRecord) -> Ordering {
        match self {
            SortField::Bank => a.bank.cmp(&b.bank),
            SortField::Amount => a.amount.cmp(&b.amount),
            SortField::Description => a.description.cmp(&b.description),
            SortField::Date => a.date.cmp(&b.date),
        }
    }
}

/// Stable in both directions: ties keep their original relative order even
/// when descending, so this is not the reverse of the ascending result.
pub fn sort_records(records: &mut [TransactionRecord], field: SortField, order: SortOrder) {
    match order {
        SortOrder::Ascending => records.sort_by(|a, b| field.compare(a, b)),
        SortOrder::Descending => records.sort_by(|a, b| field.compare(b, a)),
    }
}
