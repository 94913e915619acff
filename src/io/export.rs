use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{AccountLookup, LedgerStore};
use crate::domain::{Account, TransactionRecord, format_cents};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<TransactionRecord>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a, A> {
    store: &'a LedgerStore<A>,
}

impl<'a, A: AccountLookup> Exporter<'a, A> {
    pub fn new(store: &'a LedgerStore<A>) -> Self {
        Self { store }
    }

    /// Export every ledger entry to CSV, in insertion order.
    pub async fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transactions = self.store.list_all().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "transaction_id",
            "sequence",
            "created_at",
            "updated_at",
            "from",
            "to",
            "amount",
            "fee",
            "type",
            "status",
            "note",
            "description",
        ])?;

        for record in &transactions {
            csv_writer.write_record([
                record.transaction_id.clone(),
                record.sequence.to_string(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
                record.from.to_string(),
                record.to.to_string(),
                format_cents(record.amount_cents),
                format_cents(record.fee_cents),
                record.transaction_type.to_string(),
                record.status.to_string(),
                record.note.clone().unwrap_or_default(),
                record.description.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export accounts and ledger entries as one JSON document.
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts: self.store.list_accounts().await?,
            transactions: self.store.list_all().await?,
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(snapshot.transactions.len())
    }
}
