use std::collections::HashMap;

use khata_core::{CounterpartyAccount, CounterpartyId, OwnerId};
use parking_lot::RwLock;

use crate::{
    AccountChange, AccountFeed, AccountQuery, AccountStore, AccountWatcher, StoreError, StoreResult,
};

/// In-memory account store used by tests and embedded callers.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<(OwnerId, CounterpartyId), CounterpartyAccount>>,
    feed: AccountFeed,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    fn load(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
    ) -> StoreResult<CounterpartyAccount> {
        self.accounts
            .read()
            .get(&(owner.clone(), counterparty))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                owner: owner.clone(),
                counterparty,
            })
    }

    fn save(
        &self,
        owner: &OwnerId,
        account: &CounterpartyAccount,
        expected_version: Option<u64>,
    ) -> StoreResult<CounterpartyAccount> {
        let key = (owner.clone(), account.id);
        let mut accounts = self.accounts.write();
        let stored = accounts.get(&key).map(|existing| existing.version);
        if let Some(expected) = expected_version {
            match stored {
                None => {
                    return Err(StoreError::NotFound {
                        owner: owner.clone(),
                        counterparty: account.id,
                    })
                }
                Some(actual) if actual != expected => {
                    return Err(StoreError::Stale {
                        counterparty: account.id,
                        expected,
                        stored: actual,
                    })
                }
                Some(_) => {}
            }
        }
        let mut persisted = account.clone();
        persisted.version = stored.unwrap_or(0) + 1;
        accounts.insert(key, persisted.clone());
        drop(accounts);
        self.feed.publish(AccountChange::Saved {
            owner: owner.clone(),
            account: persisted.clone(),
        });
        Ok(persisted)
    }

    fn delete(&self, owner: &OwnerId, counterparty: CounterpartyId) -> StoreResult<()> {
        let removed = self
            .accounts
            .write()
            .remove(&(owner.clone(), counterparty));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                owner: owner.clone(),
                counterparty,
            });
        }
        self.feed.publish(AccountChange::Deleted {
            owner: owner.clone(),
            counterparty,
        });
        Ok(())
    }

    fn list(&self, owner: &OwnerId, query: AccountQuery) -> StoreResult<Vec<CounterpartyAccount>> {
        let accounts = self.accounts.read();
        let mut matching: Vec<CounterpartyAccount> = accounts
            .iter()
            .filter(|((account_owner, _), _)| account_owner == owner)
            .map(|(_, account)| account.clone())
            .filter(|account| query.matches(account))
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    fn subscribe(&self) -> AccountWatcher {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use khata_core::{Direction, Standing};
    use rust_decimal_macros::dec;

    fn sample_store() -> (MemoryAccountStore, OwnerId) {
        (MemoryAccountStore::new(), OwnerId::from("owner-1"))
    }

    #[test]
    fn save_then_load_round_trips() {
        let (store, owner) = sample_store();
        let account = CounterpartyAccount::new("Rahim", Utc::now());
        let saved = store.save(&owner, &account, None).unwrap();
        assert_eq!(saved.version, 1);

        let loaded = store.load(&owner, account.id).unwrap();
        assert_eq!(loaded.name, "Rahim");
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn version_check_rejects_stale_snapshots() {
        let (store, owner) = sample_store();
        let account = CounterpartyAccount::new("Karim", Utc::now());
        let first = store.save(&owner, &account, None).unwrap();

        // Another writer lands a save between our load and our write.
        store.save(&owner, &first, Some(first.version)).unwrap();

        let err = store.save(&owner, &first, Some(first.version)).unwrap_err();
        assert!(matches!(err, StoreError::Stale { expected: 1, stored: 2, .. }));
    }

    #[test]
    fn conditional_save_on_missing_account_is_not_found() {
        let (store, owner) = sample_store();
        let account = CounterpartyAccount::new("Ghost", Utc::now());
        let err = store.save(&owner, &account, Some(1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn delete_is_irreversible_and_checked() {
        let (store, owner) = sample_store();
        let account = CounterpartyAccount::new("Salma", Utc::now());
        store.save(&owner, &account, None).unwrap();
        store.delete(&owner, account.id).unwrap();
        assert!(matches!(
            store.load(&owner, account.id),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete(&owner, account.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn list_is_scoped_to_the_owner_and_ordered_by_recency() {
        let (store, owner) = sample_store();
        let other = OwnerId::from("owner-2");
        let now = Utc::now();

        let mut old = CounterpartyAccount::new("Old", now - Duration::hours(2));
        old.updated_at = now - Duration::hours(2);
        let recent = CounterpartyAccount::new("Recent", now);
        let foreign = CounterpartyAccount::new("Foreign", now);

        store.save(&owner, &old, None).unwrap();
        store.save(&owner, &recent, None).unwrap();
        store.save(&other, &foreign, None).unwrap();

        let listed = store.list(&owner, AccountQuery::default()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Recent");
        assert_eq!(listed[1].name, "Old");
    }

    #[test]
    fn list_applies_standing_filter_and_limit() {
        let (store, owner) = sample_store();
        let mut debtor = CounterpartyAccount::new("Debtor", Utc::now());
        debtor.apply(Direction::Gave, dec!(100), Utc::now()).unwrap();
        let mut creditor = CounterpartyAccount::new("Creditor", Utc::now());
        creditor.apply(Direction::Took, dec!(50), Utc::now()).unwrap();

        store.save(&owner, &debtor, None).unwrap();
        store.save(&owner, &creditor, None).unwrap();

        let receivable = store
            .list(&owner, AccountQuery::default().with_standing(Standing::Receivable))
            .unwrap();
        assert_eq!(receivable.len(), 1);
        assert_eq!(receivable[0].name, "Debtor");

        let limited = store
            .list(&owner, AccountQuery::default().with_limit(1))
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn subscribers_observe_saves_and_deletes_in_order() {
        let (store, owner) = sample_store();
        let mut watcher = store.subscribe();
        let account = CounterpartyAccount::new("Watched", Utc::now());

        store.save(&owner, &account, None).unwrap();
        store.delete(&owner, account.id).unwrap();

        match watcher.try_recv().unwrap() {
            AccountChange::Saved { account: saved, .. } => assert_eq!(saved.id, account.id),
            other => panic!("expected save, got {other:?}"),
        }
        match watcher.try_recv().unwrap() {
            AccountChange::Deleted { counterparty, .. } => assert_eq!(counterparty, account.id),
            other => panic!("expected delete, got {other:?}"),
        }
        assert!(watcher.try_recv().is_err());
    }
}
