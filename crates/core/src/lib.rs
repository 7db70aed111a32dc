pub mod money;
pub mod period;
pub mod record;
pub mod sort;
pub mod validate;

pub use money::Money;
pub use period::DateRange;
pub use record::{next_transaction_id, CompositeKey, TransactionId, TransactionRecord, HEADER};
pub use sort::{sort_records, SortField, SortOrder};
pub use validate::{RecordDraft, TransactionPatch, ValidDraft, ValidPatch, ValidationError};
