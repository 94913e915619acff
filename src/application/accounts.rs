use std::collections::HashSet;
use std::future::Future;

use anyhow::Result;

use crate::domain::AccountId;
use crate::storage::Repository;

/// Resolves whether an account exists. The ledger never embeds account
/// rules of its own; it asks whatever implementation it was built with.
pub trait AccountLookup: Send + Sync {
    fn account_exists(&self, id: AccountId) -> impl Future<Output = Result<bool>> + Send;
}

impl AccountLookup for Repository {
    fn account_exists(&self, id: AccountId) -> impl Future<Output = Result<bool>> + Send {
        Repository::account_exists(self, id)
    }
}

/// A fixed set of known accounts, for embedding the ledger where accounts
/// live in another system.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts {
    ids: HashSet<AccountId>,
}

impl StaticAccounts {
    pub fn new(ids: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, id: AccountId) {
        self.ids.insert(id);
    }
}

impl AccountLookup for StaticAccounts {
    fn account_exists(&self, id: AccountId) -> impl Future<Output = Result<bool>> + Send {
        let found = self.ids.contains(&id);
        async move { Ok(found) }
    }
}
