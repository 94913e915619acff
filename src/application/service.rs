use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, Direction, IntegrityReport, Pagination, TransactionDraft,
    TransactionRecord, TransactionStatus, TransitionPolicy, ValidationError,
    build_integrity_report, identify_draft, normalize_transaction_id, validate_description,
};
use crate::storage::{InsertOutcome, Repository, now};

use super::{AccountLookup, LedgerError};

/// The ledger entry validator and store.
///
/// Every write is validated in full before storage is touched, and every
/// storage round-trip runs under the configured deadline.
pub struct LedgerStore<A = Repository> {
    repo: Repository,
    accounts: A,
    policy: TransitionPolicy,
    storage_timeout: Duration,
    default_page_size: u32,
}

impl LedgerStore<Repository> {
    /// Create (if needed) and migrate the database, using its own account
    /// table for account lookups.
    pub async fn init(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let repo = Repository::init(&config.database_url(true)).await?;
        info!(database = %config.database_path, "Ledger database initialized");
        Ok(Self::new(repo.clone(), repo, config))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let repo = Repository::connect(&config.database_url(false)).await?;
        Ok(Self::new(repo.clone(), repo, config))
    }
}

impl<A: AccountLookup> LedgerStore<A> {
    pub fn new(repo: Repository, accounts: A, config: &LedgerConfig) -> Self {
        Self {
            repo,
            accounts,
            policy: config.transition_policy,
            storage_timeout: config.storage_timeout,
            default_page_size: config.default_page_size,
        }
    }

    /// Override the storage deadline for calls made through this store.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    async fn guarded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(result) => result.map_err(LedgerError::Storage),
            Err(_) => {
                warn!(operation, limit = ?self.storage_timeout, "Storage deadline exceeded");
                Err(LedgerError::Timeout {
                    operation,
                    limit: self.storage_timeout,
                })
            }
        }
    }

    // ========================
    // Transaction operations
    // ========================

    /// Validate and persist a new ledger entry.
    ///
    /// The returned record has status `pending`, an upper-case transaction
    /// id and matching `created_at`/`updated_at`.
    pub async fn create(&self, draft: TransactionDraft) -> Result<TransactionRecord, LedgerError> {
        let identified = identify_draft(draft).inspect_err(|err| {
            debug!(field = err.field(), "Rejected transaction: {err}");
        })?;

        if self
            .guarded(
                "transaction_id_exists",
                self.repo.transaction_id_exists(&identified.transaction_id),
            )
            .await?
        {
            debug!(transaction_id = %identified.transaction_id, "Rejected duplicate transaction id");
            return Err(ValidationError::DuplicateTransactionId(identified.transaction_id).into());
        }

        let valid = identified.complete().inspect_err(|err| {
            debug!(field = err.field(), "Rejected transaction: {err}");
        })?;

        for (field, id) in [("from", valid.from), ("to", valid.to)] {
            if !self
                .guarded("account_exists", self.accounts.account_exists(id))
                .await?
            {
                return Err(ValidationError::UnknownAccount { field, id }.into());
            }
        }

        let timestamp = now();
        let mut record = TransactionRecord {
            id: Uuid::new_v4(),
            sequence: 0, // Assigned by the repository
            from: valid.from,
            to: valid.to,
            amount_cents: valid.amount_cents,
            transaction_type: valid.transaction_type,
            status: TransactionStatus::Pending,
            note: valid.note,
            description: valid.description,
            transaction_id: valid.transaction_id,
            fee_cents: valid.fee_cents,
            created_at: timestamp,
            updated_at: timestamp,
        };

        match self
            .guarded("insert_transaction", self.repo.insert_transaction(&mut record))
            .await?
        {
            InsertOutcome::Inserted => {
                info!(
                    transaction_id = %record.transaction_id,
                    sequence = record.sequence,
                    amount_cents = record.amount_cents,
                    "Recorded transaction"
                );
                Ok(record)
            }
            InsertOutcome::DuplicateTransactionId => {
                warn!(transaction_id = %record.transaction_id, "Lost insert race on transaction id");
                Err(LedgerError::Conflict(format!(
                    "transactionId {} was recorded concurrently",
                    record.transaction_id
                )))
            }
        }
    }

    /// Entries where `account` is on the `direction` side, most recent first.
    pub async fn find_by_account(
        &self,
        account: AccountId,
        direction: Direction,
        pagination: Pagination,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let limit = pagination.effective_limit(self.default_page_size);
        debug!(%account, direction = direction.as_str(), limit, offset = pagination.offset, "Listing transactions for account");

        self.guarded(
            "list_by_account",
            self.repo
                .list_by_account(account, direction, limit, pagination.offset),
        )
        .await
    }

    /// Case-insensitive lookup by external transaction id.
    pub async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        let normalized = normalize_transaction_id(transaction_id);
        if normalized.is_empty() {
            return Ok(None);
        }
        self.guarded(
            "find_by_transaction_id",
            self.repo.find_by_transaction_id(&normalized),
        )
        .await
    }

    /// Like [`find_by_transaction_id`](Self::find_by_transaction_id), but a
    /// missing entry is an error.
    pub async fn get_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        self.find_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "transaction {}",
                    normalize_transaction_id(transaction_id)
                ))
            })
    }

    /// All entries in `status`, in insertion order.
    pub async fn find_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        debug!(status = status.as_str(), "Listing transactions by status");
        self.guarded("list_by_status", self.repo.list_by_status(status))
            .await
    }

    /// Every entry, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.guarded("list_transactions", self.repo.list_transactions())
            .await
    }

    /// Move an entry to `new_status`. Only `status` and `updated_at` change.
    ///
    /// Setting the current status again returns the record untouched.
    pub async fn update_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = self.get_by_transaction_id(transaction_id).await?;
        self.transition(record, new_status).await
    }

    /// Move a record the caller already holds to `new_status`.
    ///
    /// Fails with [`LedgerError::Conflict`] if the stored status no longer
    /// matches `record.status`.
    pub async fn transition(
        &self,
        mut record: TransactionRecord,
        new_status: TransactionStatus,
    ) -> Result<TransactionRecord, LedgerError> {
        let current = record.status;

        if current == new_status {
            return Ok(record);
        }
        if !self.policy.allows(current, new_status) {
            return Err(LedgerError::IllegalTransition {
                transaction_id: record.transaction_id,
                from: current,
                to: new_status,
            });
        }

        let timestamp = now();
        let updated = self
            .guarded(
                "compare_and_set_status",
                self.repo.compare_and_set_status(
                    &record.transaction_id,
                    current,
                    new_status,
                    timestamp,
                ),
            )
            .await?;

        if !updated {
            warn!(transaction_id = %record.transaction_id, "Status changed concurrently");
            return Err(LedgerError::Conflict(format!(
                "status of {} changed concurrently",
                record.transaction_id
            )));
        }

        info!(
            transaction_id = %record.transaction_id,
            from = current.as_str(),
            to = new_status.as_str(),
            "Updated transaction status"
        );
        record.status = new_status;
        record.updated_at = timestamp;
        Ok(record)
    }

    /// Populate or clear the description of an existing entry.
    pub async fn update_description(
        &self,
        transaction_id: &str,
        description: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        if let Some(desc) = &description {
            validate_description(desc)?;
        }

        let mut record = self.get_by_transaction_id(transaction_id).await?;
        let timestamp = now();
        let updated = self
            .guarded(
                "update_description",
                self.repo.update_description(
                    &record.transaction_id,
                    description.as_deref(),
                    timestamp,
                ),
            )
            .await?;

        if !updated {
            return Err(LedgerError::NotFound(format!(
                "transaction {}",
                record.transaction_id
            )));
        }

        debug!(transaction_id = %record.transaction_id, "Updated transaction description");
        record.description = description;
        record.updated_at = timestamp;
        Ok(record)
    }

    /// Audit stored entries against the ledger invariants.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let stats = self
            .guarded("get_integrity_stats", self.repo.get_integrity_stats())
            .await?;
        let report = build_integrity_report(&stats);
        if !report.is_healthy() {
            warn!(issues = report.issues.len(), "Ledger integrity check found issues");
        }
        Ok(report)
    }

    // ========================
    // Account registry
    // ========================

    /// Register a new account in the local account table.
    pub async fn register_account(&self, name: &str) -> Result<Account, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidAccountName(name.to_string()));
        }

        let account = Account::new(name);
        if !self
            .guarded("save_account", self.repo.save_account(&account))
            .await?
        {
            return Err(LedgerError::AccountAlreadyExists(name.to_string()));
        }

        info!(account = %account.id, name, "Registered account");
        Ok(account)
    }

    pub async fn get_account(&self, name: &str) -> Result<Account, LedgerError> {
        self.guarded("get_account_by_name", self.repo.get_account_by_name(name))
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", name)))
    }

    pub async fn get_account_by_id(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.guarded("get_account", self.repo.get_account(id))
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", id)))
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.guarded("list_accounts", self.repo.list_accounts())
            .await
    }
}
