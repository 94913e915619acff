use serde::Serialize;

/// A lookup index the ledger relies on. The storage migration must create
/// every entry of [`LEDGER_INDEXES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    /// Columns in key order; `true` marks a descending column
    pub columns: &'static [(&'static str, bool)],
    pub unique: bool,
}

/// The four access patterns the ledger optimises: by sender and recency,
/// by receiver and recency, by transaction id, by status.
pub const LEDGER_INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_transactions_from_created",
        columns: &[("from_account_id", false), ("created_at", true)],
        unique: false,
    },
    IndexSpec {
        name: "idx_transactions_to_created",
        columns: &[("to_account_id", false), ("created_at", true)],
        unique: false,
    },
    IndexSpec {
        name: "idx_transactions_transaction_id",
        columns: &[("transaction_id", false)],
        unique: true,
    },
    IndexSpec {
        name: "idx_transactions_status",
        columns: &[("status", false)],
        unique: false,
    },
];

/// Raw counters gathered from storage for an integrity check.
#[derive(Debug, Clone, Default)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub transaction_count: i64,
    pub has_sequence_gaps: bool,
    pub invalid_account_refs: i64,
    pub self_transfers: i64,
    pub invalid_amounts: i64,
    pub negative_fees: i64,
    pub unnormalized_ids: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub transaction_count: i64,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Turn storage counters into a report listing every violated invariant.
pub fn build_integrity_report(stats: &IntegrityStats) -> IntegrityReport {
    let mut issues = Vec::new();

    if stats.has_sequence_gaps {
        issues.push("Sequence numbers have gaps".to_string());
    }
    if stats.invalid_account_refs > 0 {
        issues.push(format!(
            "{} transaction(s) reference unknown accounts",
            stats.invalid_account_refs
        ));
    }
    if stats.self_transfers > 0 {
        issues.push(format!(
            "{} transaction(s) have identical source and destination",
            stats.self_transfers
        ));
    }
    if stats.invalid_amounts > 0 {
        issues.push(format!(
            "{} transaction(s) have a non-positive amount",
            stats.invalid_amounts
        ));
    }
    if stats.negative_fees > 0 {
        issues.push(format!(
            "{} transaction(s) have a negative fee",
            stats.negative_fees
        ));
    }
    if stats.unnormalized_ids > 0 {
        issues.push(format!(
            "{} transaction id(s) are not upper-case",
            stats.unnormalized_ids
        ));
    }

    IntegrityReport {
        account_count: stats.account_count,
        transaction_count: stats.transaction_count,
        issues,
    }
}
