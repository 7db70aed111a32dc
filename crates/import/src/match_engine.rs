use std::collections::{HashMap, VecDeque};
use std::fmt;

use flatfile_core::{CompositeKey, TransactionRecord};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStatus {
    #[serde(rename = "files match")]
    Match,
    #[serde(rename = "files do not match")]
    Mismatch,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Match => write!(f, "files match"),
            MatchStatus::Mismatch => write!(f, "files do not match"),
        }
    }
}

/// Partition of two files' records. `matched` holds the file-1 side of each
/// pair; all three partitions keep their source file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub status: MatchStatus,
    pub matched: Vec<TransactionRecord>,
    pub file1_only: Vec<TransactionRecord>,
    pub file2_only: Vec<TransactionRecord>,
}

/// Pairs records by composite key as a multiset: a key that appears `n` times
/// in one file and `m` times in the other yields `min(n, m)` matches. The
/// first unmatched record in file 1 takes the first unmatched equal record in
/// file 2.
pub fn reconcile(file1: &[TransactionRecord], file2: &[TransactionRecord]) -> Reconciliation {
    let mut pending: HashMap<CompositeKey, VecDeque<usize>> = HashMap::new();
    for (index, record) in file2.iter().enumerate() {
        pending.entry(record.composite_key()).or_default().push_back(index);
    }

    let mut claimed = vec![false; file2.len()];
    let mut matched = Vec::new();
    let mut file1_only = Vec::new();

    for record in file1 {
        match pending
            .get_mut(&record.composite_key())
            .and_then(VecDeque::pop_front)
        {
            Some(index) => {
                claimed[index] = true;
                matched.push(record.clone());
            }
            None => file1_only.push(record.clone()),
        }
    }

    let file2_only: Vec<TransactionRecord> = file2
        .iter()
        .zip(&claimed)
        .filter(|(_, taken)| !**taken)
        .map(|(record, _)| record.clone())
        .collect();

    let status = if file1_only.is_empty() && file2_only.is_empty() {
        MatchStatus::Match
    } else {
        MatchStatus::Mismatch
    };

    Reconciliation {
        status,
        matched,
        file1_only,
        file2_only,
    }
}
