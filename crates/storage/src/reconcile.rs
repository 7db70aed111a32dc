use flatfile_import::{reconcile, write_export, Reconciliation};
use tracing::{info, instrument};

use crate::rows::{RowResult, RowStore, RowStoreError};

/// Loads two files through the row store's read path and partitions them.
#[derive(Clone)]
pub struct ReconciliationEngine {
    rows: RowStore,
}

impl ReconciliationEngine {
    pub fn new(rows: RowStore) -> Self {
        Self { rows }
    }

    #[instrument(skip_all, fields(file_1 = %key1, file_2 = %key2))]
    pub async fn compare(&self, key1: &str, key2: &str) -> RowResult<Reconciliation> {
        let (file1, file2) = tokio::try_join!(self.rows.list_all(key1), self.rows.list_all(key2))?;
        let report = reconcile(&file1, &file2);
        info!(
            status = %report.status,
            matched = report.matched.len(),
            file1_only = report.file1_only.len(),
            file2_only = report.file2_only.len(),
            "files reconciled"
        );
        Ok(report)
    }

    /// CSV text of every partition, each row tagged `match` or with its
    /// source key.
    pub async fn export(&self, key1: &str, key2: &str) -> RowResult<String> {
        let report = self.compare(key1, key2).await?;
        write_export(&report, key1, key2).map_err(RowStoreError::Serialize)
    }
}
