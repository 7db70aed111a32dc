pub mod csv;
pub mod match_engine;

pub use csv::{parse_document, validate_upload, write_document, write_export, CsvError, MATCH_COLUMN};
pub use match_engine::{reconcile, MatchStatus, Reconciliation};
