//! Reading and writing transaction files.
//!
//! A stored file is UTF-8, comma-delimited, with the exact header
//! `transaction_id,bank,date,amount,description`. Parsing runs every row
//! through the same validator as single-row mutations, so a stored file and
//! an accepted upload obey identical rules.

use std::collections::HashSet;

use flatfile_core::{RecordDraft, TransactionRecord, ValidationError, HEADER};
use thiserror::Error;

use crate::match_engine::Reconciliation;

/// Extra column appended to reconciliation exports.
pub const MATCH_COLUMN: &str = "match";
/// Tag written in `MATCH_COLUMN` for rows present in both files.
pub const MATCHED_TAG: &str = "match";

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("File must be a csv: '{0}'")]
    NotCsv(String),
    #[error("CSV headers must be: transaction_id, bank, date, amount, description")]
    Header { found: Vec<String> },
    #[error("Expected 5 fields at row {row}, found {found}")]
    FieldCount { row: usize, found: usize },
    #[error("{source} at row {row}")]
    InvalidRow {
        row: usize,
        #[source]
        source: ValidationError,
    },
    #[error("Duplicate Transaction ID {id} at row {row}")]
    DuplicateId { row: usize, id: i64 },
}

/// Parses a whole transaction file. Row numbers in errors are 1-based and
/// count data rows only.
pub fn parse_document(data: &[u8]) -> Result<Vec<TransactionRecord>, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?;
    if headers.iter().ne(HEADER.iter().copied()) {
        return Err(CsvError::Header {
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (index, result) in reader.records().enumerate() {
        let row = index + 1;
        let fields = result?;

        if fields.is_empty() {
            continue;
        }
        if fields.len() != HEADER.len() {
            return Err(CsvError::FieldCount {
                row,
                found: fields.len(),
            });
        }

        let field = |i: usize| fields.get(i).map(str::to_string);
        let draft = RecordDraft {
            transaction_id: field(0),
            bank: field(1),
            date: field(2),
            amount: field(3),
            description: field(4),
        };
        let valid = draft
            .validate()
            .map_err(|source| CsvError::InvalidRow { row, source })?;
        let id = valid.transaction_id.ok_or(CsvError::InvalidRow {
            row,
            source: ValidationError::MissingField("transaction_id"),
        })?;

        if !seen.insert(id) {
            return Err(CsvError::DuplicateId { row, id });
        }
        records.push(valid.into_record(id));
    }

    Ok(records)
}

/// Gate for bulk uploads: the key must name a `.csv` file and the content
/// must parse cleanly. Nothing is stored by this function.
pub fn validate_upload(file_name: &str, data: &[u8]) -> Result<Vec<TransactionRecord>, CsvError> {
    if !file_name.ends_with(".csv") {
        return Err(CsvError::NotCsv(file_name.to_string()));
    }
    parse_document(data)
}

pub fn write_document(records: &[TransactionRecord]) -> Result<Vec<u8>, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for record in records {
        writer.write_record(record.to_fields())?;
    }
    writer.into_inner().map_err(|e| CsvError::IoError(e.into_error()))
}

/// Matched rows first, then file-1-only, then file-2-only. Each row carries
/// `match` or the key of the file it came from.
pub fn write_export(report: &Reconciliation, key1: &str, key2: &str) -> Result<String, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = HEADER.to_vec();
    header.push(MATCH_COLUMN);
    writer.write_record(&header)?;

    let tagged = report
        .matched
        .iter()
        .map(|r| (r, MATCHED_TAG))
        .chain(report.file1_only.iter().map(|r| (r, key1)))
        .chain(report.file2_only.iter().map(|r| (r, key2)));

    for (record, tag) in tagged {
        let fields = record.to_fields();
        writer.write_record(fields.iter().map(String::as_str).chain(std::iter::once(tag)))?;
    }

    let bytes = writer.into_inner().map_err(|e| CsvError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
