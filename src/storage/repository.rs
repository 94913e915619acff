use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, Direction, IntegrityStats, TransactionRecord, TransactionStatus,
    TransactionType,
};

use super::MIGRATION_001_INITIAL;

const TRANSACTION_COLUMNS: &str = "id, sequence, from_account_id, to_account_id, amount_cents, transaction_type, status, note, description, transaction_id, fee_cents, created_at, updated_at";

/// Outcome of inserting a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The unique index on `transaction_id` rejected the row.
    DuplicateTransactionId,
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so that lexical order matches chronological order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Repository for persisting and querying accounts and ledger entries.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Names of the indexes defined on the transactions table.
    pub async fn transaction_index_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'transactions' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list indexes")?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account. Returns false if the name is already taken.
    pub async fn save_account(&self, account: &Account) -> Result<bool> {
        let result = sqlx::query("INSERT INTO accounts (id, name, created_at) VALUES (?, ?, ?)")
            .bind(account.id.to_string())
            .bind(&account.name)
            .bind(format_timestamp(account.created_at))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to save account"),
        }
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, name, created_at FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn get_account_by_name(&self, name: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, name, created_at FROM accounts WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account by name")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM accounts ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    pub async fn account_exists(&self, id: AccountId) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?) as found")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to check account")?;

        Ok(row.get::<i64, _>("found") != 0)
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: AccountId::from_uuid(Uuid::parse_str(&id_str).context("Invalid account ID")?),
            name: row.get("name"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Insert a ledger entry, assigning the next sequence number.
    ///
    /// The sequence draw and the insert share one SQL transaction, so a
    /// rejected insert leaves no gap.
    pub async fn insert_transaction(&self, record: &mut TransactionRecord) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let sequence: i64 = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *tx)
        .await
        .context("Failed to get next sequence number")?
        .get("value");

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, from_account_id, to_account_id, amount_cents, transaction_type, status, note, description, transaction_id, fee_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(sequence)
        .bind(record.from.to_string())
        .bind(record.to.to_string())
        .bind(record.amount_cents)
        .bind(record.transaction_type.as_str())
        .bind(record.status.as_str())
        .bind(&record.note)
        .bind(&record.description)
        .bind(&record.transaction_id)
        .bind(record.fee_cents)
        .bind(format_timestamp(record.created_at))
        .bind(format_timestamp(record.updated_at))
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {
                tx.commit().await.context("Failed to commit transaction")?;
                record.sequence = sequence;
                Ok(InsertOutcome::Inserted)
            }
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await.context("Failed to roll back transaction")?;
                Ok(InsertOutcome::DuplicateTransactionId)
            }
            Err(err) => Err(err).context("Failed to save transaction"),
        }
    }

    /// Look up an entry by its (already normalized) external id.
    pub async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransactionRecord>> {
        let query = format!(
            "SELECT {} FROM transactions WHERE transaction_id = ?",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    pub async fn transaction_id_exists(&self, transaction_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE transaction_id = ?) as found",
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check transaction id")?;

        Ok(row.get::<i64, _>("found") != 0)
    }

    /// Entries where `account` is on the `direction` side, most recent first.
    pub async fn list_by_account(
        &self,
        account: AccountId,
        direction: Direction,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TransactionRecord>> {
        let column = match direction {
            Direction::From => "from_account_id",
            Direction::To => "to_account_id",
        };
        let query = format!(
            "SELECT {} FROM transactions WHERE {} = ? ORDER BY created_at DESC, sequence DESC LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS, column
        );

        let rows = sqlx::query(&query)
            .bind(account.to_string())
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions for account")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Entries in `status`, in insertion order.
    pub async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<TransactionRecord>> {
        let query = format!(
            "SELECT {} FROM transactions WHERE status = ? ORDER BY sequence",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions by status")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// All entries, in insertion order.
    pub async fn list_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let query = format!(
            "SELECT {} FROM transactions ORDER BY sequence",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Set `status` only if it still equals `expected`.
    /// Returns false if the row was missing or changed underneath us.
    pub async fn compare_and_set_status(
        &self,
        transaction_id: &str,
        expected: TransactionStatus,
        status: TransactionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET status = ?, updated_at = ? WHERE transaction_id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(format_timestamp(updated_at))
        .bind(transaction_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update transaction status")?;

        Ok(result.rows_affected() == 1)
    }

    /// Returns false if no entry has this transaction id.
    pub async fn update_description(
        &self,
        transaction_id: &str,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET description = ?, updated_at = ? WHERE transaction_id = ?",
        )
        .bind(description)
        .bind(format_timestamp(updated_at))
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .context("Failed to update transaction description")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as count,
                MIN(sequence) as min_seq,
                MAX(sequence) as max_seq,
                COALESCE(SUM(CASE WHEN amount_cents <= 0 THEN 1 ELSE 0 END), 0) as invalid_amounts,
                COALESCE(SUM(CASE WHEN fee_cents < 0 THEN 1 ELSE 0 END), 0) as negative_fees,
                COALESCE(SUM(CASE WHEN from_account_id = to_account_id THEN 1 ELSE 0 END), 0) as self_transfers,
                COALESCE(SUM(CASE WHEN transaction_id <> UPPER(transaction_id) THEN 1 ELSE 0 END), 0) as unnormalized_ids
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to gather transaction statistics")?;

        let transaction_count: i64 = row.get("count");
        let min_seq: Option<i64> = row.get("min_seq");
        let max_seq: Option<i64> = row.get("max_seq");
        let has_sequence_gaps = match (min_seq, max_seq) {
            (Some(min), Some(max)) => min != 1 || (max - min + 1) != transaction_count,
            _ => false,
        };

        let invalid_account_refs: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.from_account_id)
               OR NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.to_account_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to check account references")?
        .get("count");

        Ok(IntegrityStats {
            account_count,
            transaction_count,
            has_sequence_gaps,
            invalid_account_refs,
            self_transfers: row.get("self_transfers"),
            invalid_amounts: row.get("invalid_amounts"),
            negative_fees: row.get("negative_fees"),
            unnormalized_ids: row.get("unnormalized_ids"),
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord> {
        let id_str: String = row.get("id");
        let from_str: String = row.get("from_account_id");
        let to_str: String = row.get("to_account_id");
        let type_str: String = row.get("transaction_type");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(TransactionRecord {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            from: AccountId::from_uuid(
                Uuid::parse_str(&from_str).context("Invalid from_account ID")?,
            ),
            to: AccountId::from_uuid(Uuid::parse_str(&to_str).context("Invalid to_account ID")?),
            amount_cents: row.get("amount_cents"),
            transaction_type: TransactionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid status: {}", status_str))?,
            note: row.get("note"),
            description: row.get("description"),
            transaction_id: row.get("transaction_id"),
            fee_cents: row.get("fee_cents"),
            created_at: parse_timestamp(&created_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-15T09:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let a = format_timestamp(earlier);
        let b = format_timestamp(later);
        assert_eq!(a, "2024-01-15T09:00:00.500000Z");
        assert_eq!(b, "2024-01-15T10:00:00.000000Z");
        assert!(a < b);
    }

    #[test]
    fn test_timestamp_roundtrip_keeps_precision() {
        let ts = now();
        assert_eq!(parse_timestamp(&format_timestamp(ts)).unwrap(), ts);
    }
}
