//! Row-level CRUD over whole-file CSV objects.
//!
//! Every operation reads the complete file through the gateway and parses it.
//! Mutations go through [`RowStore::replace`], which applies a closure to the
//! parsed records and writes the full result back with exactly one put.
//!
//! Known consistency gap: the object store has no compare-and-swap, so two
//! concurrent mutations of one key race and the later put silently discards
//! the earlier one (a stale read can even resurrect a deleted row). `replace`
//! is the single place a conditional put would go.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use flatfile_core::validate::parse_date;
use flatfile_core::{
    next_transaction_id, sort_records, DateRange, RecordDraft, SortField, SortOrder, TransactionId,
    TransactionPatch, TransactionRecord, ValidationError,
};
use flatfile_import::{parse_document, validate_upload, write_document, CsvError};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::gateway::{GatewayError, ObjectGateway};

pub const CSV_SUFFIX: &str = ".csv";

#[derive(Debug, Error)]
pub enum RowStoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    NotFound(String),
    #[error("Transaction ID {0} already exists")]
    Conflict(TransactionId),
    #[error("Stored file '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: CsvError,
    },
    #[error(transparent)]
    InvalidUpload(CsvError),
    #[error("Failed to serialize transactions: {0}")]
    Serialize(#[source] CsvError),
    #[error(transparent)]
    Store(GatewayError),
}

impl From<GatewayError> for RowStoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { key } => RowStoreError::NotFound(format!("File not found: {key}")),
            other => RowStoreError::Store(other),
        }
    }
}

pub type RowResult<T> = Result<T, RowStoreError>;

#[derive(Clone)]
pub struct RowStore {
    gateway: Arc<dyn ObjectGateway>,
}

impl RowStore {
    pub fn new(gateway: Arc<dyn ObjectGateway>) -> Self {
        Self { gateway }
    }

    // ── files ─────────────────────────────────────────────────────────────────

    pub async fn list_files(&self) -> RowResult<Vec<String>> {
        Ok(self.gateway.list(CSV_SUFFIX).await?)
    }

    /// Raw stored bytes, unparsed.
    pub async fn download(&self, key: &str) -> RowResult<Bytes> {
        Ok(self.gateway.read(key).await?)
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn delete_file(&self, key: &str) -> RowResult<()> {
        self.gateway.delete(key).await?;
        info!("file deleted");
        Ok(())
    }

    /// Validates a whole upload before anything reaches the store, then writes
    /// its canonical form. Returns the number of records stored.
    #[instrument(skip_all, fields(key = %key, bytes = data.len()))]
    pub async fn upload(&self, key: &str, data: &[u8]) -> RowResult<usize> {
        let records = validate_upload(key, data).map_err(|e| {
            warn!(error = %e, "upload rejected");
            RowStoreError::InvalidUpload(e)
        })?;
        self.store(key, &records).await?;
        Ok(records.len())
    }

    // ── reads ─────────────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(key = %key))]
    pub async fn list_all(&self, key: &str) -> RowResult<Vec<TransactionRecord>> {
        let data = self.gateway.read(key).await?;
        parse_document(&data).map_err(|source| {
            warn!(error = %source, "stored file failed to parse");
            RowStoreError::Malformed {
                key: key.to_string(),
                source,
            }
        })
    }

    pub async fn get_by_id(&self, key: &str, id: TransactionId) -> RowResult<TransactionRecord> {
        self.list_all(key)
            .await?
            .into_iter()
            .find(|r| r.transaction_id == id)
            .ok_or_else(|| RowStoreError::NotFound(format!("No transaction found with ID {id}")))
    }

    /// Exact match. An empty result is `NotFound`.
    pub async fn filter_by_description(&self, key: &str, description: &str) -> RowResult<Vec<TransactionRecord>> {
        let matches: Vec<_> = self
            .list_all(key)
            .await?
            .into_iter()
            .filter(|r| r.description == description)
            .collect();
        if matches.is_empty() {
            return Err(RowStoreError::NotFound(format!(
                "No transactions with description '{description}'"
            )));
        }
        Ok(matches)
    }

    /// Inclusive on both ends; `end` defaults to `today`. An empty result is
    /// `NotFound`.
    pub async fn filter_by_date_range(
        &self,
        key: &str,
        start: &str,
        end: Option<&str>,
        today: NaiveDate,
    ) -> RowResult<Vec<TransactionRecord>> {
        let start = parse_date("start_date", start)?;
        let end = match end {
            Some(end) if !end.is_empty() => parse_date("end_date", end)?,
            _ => today,
        };
        let range = DateRange::new(start, end);

        let matches: Vec<_> = self
            .list_all(key)
            .await?
            .into_iter()
            .filter(|r| range.contains(r.date))
            .collect();
        if matches.is_empty() {
            return Err(RowStoreError::NotFound(format!(
                "No transactions found between {} and {}",
                range.start, range.end
            )));
        }
        Ok(matches)
    }

    pub async fn sort(&self, key: &str, field: &str, order: &str) -> RowResult<Vec<TransactionRecord>> {
        let field: SortField = field.parse()?;
        let order: SortOrder = order.parse()?;
        let mut records = self.list_all(key).await?;
        sort_records(&mut records, field, order);
        Ok(records)
    }

    // ── mutations ─────────────────────────────────────────────────────────────

    /// Read, transform, write back. The closure sees the full parsed record
    /// set; if it fails nothing is written.
    pub async fn replace<T, F>(&self, key: &str, f: F) -> RowResult<T>
    where
        F: FnOnce(&mut Vec<TransactionRecord>) -> RowResult<T> + Send,
        T: Send,
    {
        let mut records = self.list_all(key).await?;
        let out = f(&mut records)?;
        self.store(key, &records).await?;
        Ok(out)
    }

    async fn store(&self, key: &str, records: &[TransactionRecord]) -> RowResult<()> {
        let data = write_document(records).map_err(RowStoreError::Serialize)?;
        let size = data.len();
        self.gateway.write(key, Bytes::from(data)).await?;
        info!(key, records = records.len(), bytes = size, "file written");
        Ok(())
    }

    /// Appends one record and returns the full updated set. Without an
    /// explicit id the record gets `max(existing) + 1`.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn add(&self, key: &str, draft: RecordDraft) -> RowResult<Vec<TransactionRecord>> {
        let valid = draft.validate()?;
        self.replace(key, move |records| {
            let id = match valid.transaction_id {
                Some(id) if records.iter().any(|r| r.transaction_id == id) => {
                    return Err(RowStoreError::Conflict(id));
                }
                Some(id) => id,
                None => next_transaction_id(records)?,
            };
            records.push(valid.into_record(id));
            Ok(records.clone())
        })
        .await
    }

    #[instrument(skip_all, fields(key = %key, id = id))]
    pub async fn update(&self, key: &str, id: TransactionId, patch: TransactionPatch) -> RowResult<TransactionRecord> {
        let valid = patch.validate()?;
        self.replace(key, move |records| {
            let record = records
                .iter_mut()
                .find(|r| r.transaction_id == id)
                .ok_or_else(|| RowStoreError::NotFound(format!("Transaction ID {id} not found")))?;
            valid.apply(record);
            Ok(record.clone())
        })
        .await
    }

    /// Removes one record. Deleting the last record leaves a header-only file.
    #[instrument(skip_all, fields(key = %key, id = id))]
    pub async fn delete(&self, key: &str, id: TransactionId) -> RowResult<TransactionRecord> {
        self.replace(key, move |records| {
            let index = records
                .iter()
                .position(|r| r.transaction_id == id)
                .ok_or_else(|| RowStoreError::NotFound(format!("Transaction ID {id} not found")))?;
            Ok(records.remove(index))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayResult, ObjectStoreGateway};
    use async_trait::async_trait;
    use flatfile_core::Money;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const HEADER_LINE: &str = "transaction_id,bank,date,amount,description\n";

    /// Wraps the in-memory gateway, counting puts and optionally failing them.
    struct Instrumented {
        inner: ObjectStoreGateway,
        writes: AtomicUsize,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl ObjectGateway for Instrumented {
        async fn list(&self, suffix: &str) -> GatewayResult<Vec<String>> {
            self.inner.list(suffix).await
        }

        async fn read(&self, key: &str) -> GatewayResult<Bytes> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, data: Bytes) -> GatewayResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(GatewayError::Write {
                    key: key.to_string(),
                    message: "injected failure".to_string(),
                });
            }
            self.inner.write(key, data).await
        }

        async fn delete(&self, key: &str) -> GatewayResult<()> {
            self.inner.delete(key).await
        }
    }

    async fn setup(content: &str) -> (RowStore, Arc<Instrumented>) {
        let inner = ObjectStoreGateway::in_memory();
        inner
            .write("t.csv", Bytes::copy_from_slice(content.as_bytes()))
            .await
            .unwrap();
        let gateway = Arc::new(Instrumented {
            inner,
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        });
        (RowStore::new(gateway.clone()), gateway)
    }

    fn draft(bank: &str, date: &str, amount: &str, description: &str) -> RecordDraft {
        RecordDraft {
            transaction_id: None,
            bank: Some(bank.to_string()),
            date: Some(date.to_string()),
            amount: Some(amount.to_string()),
            description: Some(description.to_string()),
        }
    }

    fn sample() -> String {
        format!(
            "{HEADER_LINE}1,Chase,2024-01-10,25.00,Groceries\n2,Wells,2024-02-15,-4.50,Coffee\n3,Ally,2024-03-01,1200.00,Rent\n"
        )
    }

    fn ids(records: &[TransactionRecord]) -> Vec<i64> {
        records.iter().map(|r| r.transaction_id).collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // ── reads ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_all_preserves_order() {
        let (rows, _) = setup(&sample()).await;
        assert_eq!(ids(&rows.list_all("t.csv").await.unwrap()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (rows, _) = setup(HEADER_LINE).await;
        assert!(matches!(rows.list_all("nope.csv").await, Err(RowStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_stored_file_is_reported() {
        let (rows, _) = setup("id,name\n1,x\n").await;
        assert!(matches!(rows.list_all("t.csv").await, Err(RowStoreError::Malformed { .. })));
    }

    #[tokio::test]
    async fn get_by_id_found_and_missing() {
        let (rows, _) = setup(&sample()).await;
        assert_eq!(rows.get_by_id("t.csv", 2).await.unwrap().bank, "Wells");
        assert!(matches!(rows.get_by_id("t.csv", 9).await, Err(RowStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn description_filter_is_exact() {
        let (rows, _) = setup(&sample()).await;
        assert_eq!(ids(&rows.filter_by_description("t.csv", "Coffee").await.unwrap()), vec![2]);
        assert!(matches!(
            rows.filter_by_description("t.csv", "coffee").await,
            Err(RowStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn date_range_is_inclusive() {
        let (rows, _) = setup(&sample()).await;
        let found = rows
            .filter_by_date_range("t.csv", "2024-01-10", Some("2024-02-15"), date("2030-01-01"))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1, 2]);
    }

    #[tokio::test]
    async fn date_range_end_defaults_to_today() {
        let (rows, _) = setup(&sample()).await;
        let found = rows
            .filter_by_date_range("t.csv", "2024-02-01", None, date("2024-02-20"))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![2]);
    }

    #[tokio::test]
    async fn date_range_rejects_bad_start() {
        let (rows, _) = setup(&sample()).await;
        assert!(matches!(
            rows.filter_by_date_range("t.csv", "2024/01/01", None, date("2024-12-31")).await,
            Err(RowStoreError::Validation(ValidationError::InvalidDate { field: "start_date", .. }))
        ));
    }

    #[tokio::test]
    async fn date_range_empty_is_not_found() {
        let (rows, _) = setup(&sample()).await;
        assert!(matches!(
            rows.filter_by_date_range("t.csv", "2025-01-01", None, date("2025-06-01")).await,
            Err(RowStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sort_validates_before_reading() {
        let (rows, _) = setup(&sample()).await;
        // The key doesn't exist, but the bad field is reported first.
        assert!(matches!(
            rows.sort("nope.csv", "transaction_id", "ascending").await,
            Err(RowStoreError::Validation(ValidationError::InvalidSortField(_)))
        ));
        assert!(matches!(
            rows.sort("t.csv", "amount", "up").await,
            Err(RowStoreError::Validation(ValidationError::InvalidSortOrder(_)))
        ));
    }

    #[tokio::test]
    async fn sort_by_amount_both_directions() {
        let (rows, gateway) = setup(&sample()).await;
        let asc = rows.sort("t.csv", "amount", "ascending").await.unwrap();
        let desc = rows.sort("t.csv", "amount", "descending").await.unwrap();
        assert_eq!(ids(&asc), vec![2, 1, 3]);
        assert_eq!(ids(&desc), vec![3, 1, 2]);
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 0);
    }

    // ── add ───────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_assigns_sequential_ids_from_empty() {
        let (rows, _) = setup(HEADER_LINE).await;
        for n in 1..=4 {
            let all = rows
                .add("t.csv", draft("Chase", "2024-01-01", &n.to_string(), "x"))
                .await
                .unwrap();
            assert_eq!(all.last().unwrap().transaction_id, n);
        }
        assert_eq!(ids(&rows.list_all("t.csv").await.unwrap()), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn add_then_get_returns_same_fields() {
        let (rows, _) = setup(&sample()).await;
        let mut d = draft("Chase", "2024-05-05", "19.999", "Books");
        d.transaction_id = Some("40".to_string());
        rows.add("t.csv", d).await.unwrap();

        let got = rows.get_by_id("t.csv", 40).await.unwrap();
        assert_eq!(
            got,
            TransactionRecord {
                transaction_id: 40,
                bank: "Chase".to_string(),
                date: date("2024-05-05"),
                amount: Money::from_cents(2000),
                description: "Books".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn add_returns_full_set_and_writes_once() {
        let (rows, gateway) = setup(&sample()).await;
        let all = rows.add("t.csv", draft("Ally", "2024-04-01", "3", "Fee")).await.unwrap();
        assert_eq!(ids(&all), vec![1, 2, 3, 4]);
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn add_duplicate_id_conflicts_without_writing() {
        let (rows, gateway) = setup(&sample()).await;
        let mut d = draft("Ally", "2024-04-01", "3", "Fee");
        d.transaction_id = Some("2".to_string());
        assert!(matches!(rows.add("t.csv", d).await, Err(RowStoreError::Conflict(2))));
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn add_after_max_id_fails_without_writing() {
        let (rows, gateway) = setup(&format!("{HEADER_LINE}9223372036854775807,X,2024-01-01,1,a\n")).await;
        assert!(matches!(
            rows.add("t.csv", draft("Ally", "2024-04-01", "3", "Fee")).await,
            Err(RowStoreError::Validation(ValidationError::IdSpaceExhausted))
        ));
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 0);

        // An explicit id still goes in.
        let mut d = draft("Ally", "2024-04-01", "3", "Fee");
        d.transaction_id = Some("-1".to_string());
        assert_eq!(ids(&rows.add("t.csv", d).await.unwrap()), vec![i64::MAX, -1]);
    }

    #[tokio::test]
    async fn add_validation_precedes_file_lookup() {
        let (rows, _) = setup(&sample()).await;
        assert!(matches!(
            rows.add("nope.csv", draft("Ally", "2024-13-01", "3", "Fee")).await,
            Err(RowStoreError::Validation(ValidationError::InvalidDate { .. }))
        ));
    }

    #[tokio::test]
    async fn add_to_missing_file_is_not_found() {
        let (rows, gateway) = setup(&sample()).await;
        assert!(matches!(
            rows.add("nope.csv", draft("Ally", "2024-01-01", "3", "Fee")).await,
            Err(RowStoreError::NotFound(_))
        ));
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 0);
    }

    // ── update ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_amount_leaves_everything_else() {
        let (rows, _) = setup(&sample()).await;
        let before = rows.list_all("t.csv").await.unwrap();
        let patch = TransactionPatch {
            amount: Some("99.5".to_string()),
            ..Default::default()
        };
        let updated = rows.update("t.csv", 2, patch).await.unwrap();
        assert_eq!(updated.amount, Money::from_cents(9950));

        let after = rows.list_all("t.csv").await.unwrap();
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[1].bank, before[1].bank);
        assert_eq!(after[1].date, before[1].date);
        assert_eq!(after[1].description, before[1].description);
    }

    #[tokio::test]
    async fn update_requires_a_field() {
        let (rows, _) = setup(&sample()).await;
        assert!(matches!(
            rows.update("t.csv", 1, TransactionPatch::default()).await,
            Err(RowStoreError::Validation(ValidationError::EmptyUpdate))
        ));
    }

    #[tokio::test]
    async fn update_missing_id_is_not_found_and_not_written() {
        let (rows, gateway) = setup(&sample()).await;
        let patch = TransactionPatch {
            bank: Some("Citi".to_string()),
            ..Default::default()
        };
        assert!(matches!(rows.update("t.csv", 77, patch).await, Err(RowStoreError::NotFound(_))));
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 0);
    }

    // ── delete ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn delete_then_get_is_not_found_and_order_kept() {
        let (rows, _) = setup(&sample()).await;
        let before = rows.list_all("t.csv").await.unwrap();
        let removed = rows.delete("t.csv", 2).await.unwrap();
        assert_eq!(removed, before[1]);

        assert!(matches!(rows.get_by_id("t.csv", 2).await, Err(RowStoreError::NotFound(_))));
        let after = rows.list_all("t.csv").await.unwrap();
        assert_eq!(after, vec![before[0].clone(), before[2].clone()]);
    }

    #[tokio::test]
    async fn deleting_last_record_leaves_header_only() {
        let (rows, gateway) = setup(&format!("{HEADER_LINE}5,X,2024-01-01,1.00,a\n")).await;
        rows.delete("t.csv", 5).await.unwrap();
        assert_eq!(gateway.inner.read("t.csv").await.unwrap(), HEADER_LINE.as_bytes());
        assert!(matches!(rows.delete("t.csv", 5).await, Err(RowStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_write_surfaces_and_keeps_prior_content() {
        let (rows, gateway) = setup(&sample()).await;
        gateway.fail_writes.store(true, Ordering::SeqCst);

        let err = rows.delete("t.csv", 1).await.unwrap_err();
        assert!(matches!(err, RowStoreError::Store(GatewayError::Write { .. })));
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 1);
        assert_eq!(
            gateway.inner.read("t.csv").await.unwrap(),
            Bytes::copy_from_slice(sample().as_bytes())
        );
    }

    // ── files ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn upload_stores_canonical_form() {
        let (rows, gateway) = setup(HEADER_LINE).await;
        let data = format!("{HEADER_LINE}1,Chase,2024-01-10,25,Groceries\n");
        assert_eq!(rows.upload("new.csv", data.as_bytes()).await.unwrap(), 1);
        assert_eq!(
            gateway.inner.read("new.csv").await.unwrap(),
            format!("{HEADER_LINE}1,Chase,2024-01-10,25.00,Groceries\n").as_bytes()
        );
        assert_eq!(rows.list_files().await.unwrap(), vec!["new.csv", "t.csv"]);
    }

    #[tokio::test]
    async fn upload_with_bad_header_stores_nothing() {
        let (rows, gateway) = setup(HEADER_LINE).await;
        let data = "transaction_id,bank,date,amount\n1,Chase,2024-01-10,25\n";
        assert!(matches!(
            rows.upload("bad.csv", data.as_bytes()).await,
            Err(RowStoreError::InvalidUpload(CsvError::Header { .. }))
        ));
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 0);
        assert!(matches!(rows.download("bad.csv").await, Err(RowStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_file_then_missing() {
        let (rows, _) = setup(HEADER_LINE).await;
        rows.delete_file("t.csv").await.unwrap();
        assert!(matches!(rows.delete_file("t.csv").await, Err(RowStoreError::NotFound(_))));
    }
}
