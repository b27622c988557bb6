//! Transaction recording and account management on top of khata storage.
//!
//! The original product ran this sequence inline in its UI handlers. Here it
//! is the one place that loads an account snapshot, runs the reconciler, and
//! persists the result with a version-checked write, retrying the whole step
//! when a concurrent writer got there first.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use khata_core::{
    audit, AuditReport, CounterpartyAccount, CounterpartyId, Direction, LedgerError, LedgerEvent,
    OwnerId,
};
use khata_store::{AccountQuery, AccountStore, AccountWatcher, StoreError};

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error type surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("gave up on account {counterparty} after {attempts} conflicting writes")]
    ConflictRetriesExhausted {
        counterparty: CounterpartyId,
        attempts: u32,
    },
}

/// How many times one logical write is attempted before a conflict is
/// surfaced to the caller.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Contact details captured when a counterparty is added to the ledger.
#[derive(Clone, Debug, Default)]
pub struct ContactDetails {
    pub name: String,
    pub mobile: String,
    pub address: String,
}

/// Partial update to a counterparty's contact details.
#[derive(Clone, Debug, Default)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
}

/// Result of recording one transaction.
#[derive(Clone, Debug)]
pub struct RecordOutcome {
    pub account: CounterpartyAccount,
    /// Events appended by this transaction, repayment portion first.
    pub events: Vec<LedgerEvent>,
}

/// Ledger operations for counterparty accounts, shared across owners.
pub struct LedgerService {
    store: Arc<dyn AccountStore>,
    retry: RetryPolicy,
}

impl LedgerService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Add a counterparty with a settled balance and no history.
    pub fn create(
        &self,
        owner: &OwnerId,
        contact: ContactDetails,
    ) -> ServiceResult<CounterpartyAccount> {
        let account = CounterpartyAccount::new(contact.name, Utc::now())
            .with_mobile(contact.mobile)
            .with_address(contact.address);
        let saved = self.store.save(owner, &account, None)?;
        info!(counterparty = %saved.id, name = %saved.name, "counterparty added");
        Ok(saved)
    }

    /// Record one transaction against an existing account.
    pub fn record(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
        direction: Direction,
        amount: Decimal,
    ) -> ServiceResult<RecordOutcome> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount).into());
        }
        let outcome = self.persist_with_retry(owner, counterparty, |account| {
            Ok(account.apply(direction, amount, Utc::now())?.events)
        })?;
        info!(
            counterparty = %counterparty,
            %direction,
            %amount,
            balance = %outcome.account.balance,
            "transaction recorded"
        );
        Ok(outcome)
    }

    /// Add a counterparty and record its first transaction in one step, the
    /// quick-entry path of the original product.
    pub fn record_new(
        &self,
        owner: &OwnerId,
        contact: ContactDetails,
        direction: Direction,
        amount: Decimal,
    ) -> ServiceResult<RecordOutcome> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount).into());
        }
        let now = Utc::now();
        let mut account = CounterpartyAccount::new(contact.name, now)
            .with_mobile(contact.mobile)
            .with_address(contact.address);
        let outcome = account.apply(direction, amount, now)?;
        let saved = self.store.save(owner, &account, None)?;
        info!(
            counterparty = %saved.id,
            name = %saved.name,
            balance = %saved.balance,
            "counterparty added with first transaction"
        );
        Ok(RecordOutcome {
            account: saved,
            events: outcome.events,
        })
    }

    /// Update contact details, leaving balance and history untouched.
    pub fn update_contact(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
        patch: ContactPatch,
    ) -> ServiceResult<CounterpartyAccount> {
        let outcome = self.persist_with_retry(owner, counterparty, |account| {
            if let Some(name) = &patch.name {
                account.name = name.clone();
            }
            if let Some(mobile) = &patch.mobile {
                account.mobile = mobile.clone();
            }
            if let Some(address) = &patch.address {
                account.address = address.clone();
            }
            account.updated_at = Utc::now();
            Ok(Vec::new())
        })?;
        Ok(outcome.account)
    }

    /// Delete the account and its whole history, irreversibly.
    pub fn remove(&self, owner: &OwnerId, counterparty: CounterpartyId) -> ServiceResult<()> {
        self.store.delete(owner, counterparty)?;
        info!(counterparty = %counterparty, "counterparty removed");
        Ok(())
    }

    pub fn get(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
    ) -> ServiceResult<CounterpartyAccount> {
        Ok(self.store.load(owner, counterparty)?)
    }

    pub fn list(
        &self,
        owner: &OwnerId,
        query: AccountQuery,
    ) -> ServiceResult<Vec<CounterpartyAccount>> {
        Ok(self.store.list(owner, query)?)
    }

    pub fn history(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
    ) -> ServiceResult<Vec<LedgerEvent>> {
        Ok(self.store.load(owner, counterparty)?.history)
    }

    /// Replay one account's history against its stored balance.
    pub fn audit_account(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
    ) -> ServiceResult<AuditReport> {
        Ok(audit(&self.store.load(owner, counterparty)?))
    }

    /// Replay every account the owner holds.
    pub fn audit_all(&self, owner: &OwnerId) -> ServiceResult<Vec<AuditReport>> {
        let accounts = self.store.list(owner, AccountQuery::default())?;
        Ok(accounts.iter().map(audit).collect())
    }

    /// Push feed of every change committed through the underlying store.
    pub fn subscribe(&self) -> AccountWatcher {
        self.store.subscribe()
    }

    /// Load-mutate-save with the version check, reloading a fresh snapshot
    /// after each stale write until the attempt budget runs out.
    fn persist_with_retry<F>(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
        mutate: F,
    ) -> ServiceResult<RecordOutcome>
    where
        F: Fn(&mut CounterpartyAccount) -> ServiceResult<Vec<LedgerEvent>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut account = self.store.load(owner, counterparty)?;
            let snapshot_version = account.version;
            let events = mutate(&mut account)?;
            match self.store.save(owner, &account, Some(snapshot_version)) {
                Ok(saved) => {
                    return Ok(RecordOutcome {
                        account: saved,
                        events,
                    })
                }
                Err(StoreError::Stale { .. }) if attempts < self.retry.max_attempts => {
                    warn!(%counterparty, attempts, "conflicting write, reloading and retrying");
                }
                Err(StoreError::Stale { .. }) => {
                    return Err(ServiceError::ConflictRetriesExhausted {
                        counterparty,
                        attempts,
                    })
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
