// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use tempfile::TempDir;
use txledger::application::LedgerStore;
use txledger::config::LedgerConfig;
use txledger::domain::{AccountId, TransactionDraft};

/// Helper to create a test store with a temporary database
pub async fn test_store() -> Result<(LedgerStore, TempDir)> {
    test_store_with(|config| config).await
}

/// Like [`test_store`], with a chance to adjust the configuration first
pub async fn test_store_with(
    configure: impl FnOnce(LedgerConfig) -> LedgerConfig,
) -> Result<(LedgerStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = configure(LedgerConfig::new(db_path.to_str().unwrap()));
    let store = LedgerStore::init(&config).await?;
    Ok((store, temp_dir))
}

/// Test fixture: three registered accounts
pub struct StandardAccounts {
    pub alice: AccountId,
    pub bob: AccountId,
    pub carol: AccountId,
}

impl StandardAccounts {
    pub async fn create(store: &LedgerStore) -> Result<Self> {
        Ok(Self {
            alice: store.register_account("Alice").await?.id,
            bob: store.register_account("Bob").await?.id,
            carol: store.register_account("Carol").await?.id,
        })
    }
}

/// A valid "sent" draft between two accounts
pub fn sent(from: AccountId, to: AccountId, amount_cents: i64, id: &str) -> TransactionDraft {
    TransactionDraft::new(from, to, amount_cents, "sent", id)
}
