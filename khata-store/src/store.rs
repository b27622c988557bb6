use khata_core::{CounterpartyAccount, CounterpartyId, OwnerId, Standing};

use crate::{AccountWatcher, StoreResult};

/// Abstraction over durable account storage engines.
///
/// `save` is a full-document replace. When `expected_version` is given the
/// write only succeeds if the stored document still carries that version;
/// the backend bumps the version on every successful save and returns the
/// document as persisted. An unconditional save (`None`) upserts and is the
/// path used for first writes and imports.
pub trait AccountStore: Send + Sync {
    fn load(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
    ) -> StoreResult<CounterpartyAccount>;

    fn save(
        &self,
        owner: &OwnerId,
        account: &CounterpartyAccount,
        expected_version: Option<u64>,
    ) -> StoreResult<CounterpartyAccount>;

    fn delete(&self, owner: &OwnerId, counterparty: CounterpartyId) -> StoreResult<()>;

    /// Accounts for one owner, most recently touched first.
    fn list(&self, owner: &OwnerId, query: AccountQuery) -> StoreResult<Vec<CounterpartyAccount>>;

    /// Push feed of every change committed through this store.
    fn subscribe(&self) -> AccountWatcher;
}

/// Filter describing which accounts to load from storage.
#[derive(Clone, Debug, Default)]
pub struct AccountQuery {
    pub standing: Option<Standing>,
    pub name_contains: Option<String>,
    pub limit: Option<usize>,
}

impl AccountQuery {
    pub fn with_standing(mut self, standing: Standing) -> Self {
        self.standing = Some(standing);
        self
    }

    pub fn with_name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an account passes the standing and name filters. The limit is
    /// applied by the backend after filtering.
    pub fn matches(&self, account: &CounterpartyAccount) -> bool {
        if let Some(standing) = self.standing {
            if account.standing() != standing {
                return false;
            }
        }
        if let Some(fragment) = &self.name_contains {
            if !account
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use khata_core::Direction;
    use rust_decimal_macros::dec;

    #[test]
    fn query_filters_by_standing_and_name() {
        let mut owed = CounterpartyAccount::new("Rahim Uddin", Utc::now());
        owed.apply(Direction::Gave, dec!(100), Utc::now()).unwrap();
        let fresh = CounterpartyAccount::new("Karim", Utc::now());

        let query = AccountQuery::default().with_standing(Standing::Receivable);
        assert!(query.matches(&owed));
        assert!(!query.matches(&fresh));

        let query = AccountQuery::default().with_name_contains("rahim");
        assert!(query.matches(&owed));
        assert!(!query.matches(&fresh));
    }
}
