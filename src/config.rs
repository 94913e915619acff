use std::time::Duration;

use crate::domain::{DEFAULT_PAGE_SIZE, TransitionPolicy};

pub const DEFAULT_DATABASE_PATH: &str = "txledger.db";
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for opening a [`LedgerStore`](crate::application::LedgerStore).
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// SQLite database file
    pub database_path: String,
    /// Deadline applied to every storage round-trip
    pub storage_timeout: Duration,
    pub transition_policy: TransitionPolicy,
    /// Page size for account queries that do not set a limit
    pub default_page_size: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            transition_policy: TransitionPolicy::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl LedgerConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub fn with_transition_policy(mut self, policy: TransitionPolicy) -> Self {
        self.transition_policy = policy;
        self
    }

    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    /// SQLite URL for the database file. `create` allows the file to be created.
    pub fn database_url(&self, create: bool) -> String {
        if create {
            format!("sqlite:{}?mode=rwc", self.database_path)
        } else {
            format!("sqlite:{}", self.database_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.database_path, "txledger.db");
        assert_eq!(config.storage_timeout, Duration::from_secs(5));
        assert_eq!(config.transition_policy, TransitionPolicy::Strict);
        assert_eq!(config.default_page_size, 50);
    }

    #[test]
    fn test_database_url() {
        let config = LedgerConfig::new("/tmp/ledger.db");
        assert_eq!(config.database_url(true), "sqlite:/tmp/ledger.db?mode=rwc");
        assert_eq!(config.database_url(false), "sqlite:/tmp/ledger.db");
    }
}
