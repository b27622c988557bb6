use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use khata_core::{CounterpartyAccount, CounterpartyId, LedgerEvent, OwnerId};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    AccountChange, AccountFeed, AccountQuery, AccountStore, AccountWatcher, StoreError, StoreResult,
};

const ACCOUNT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    owner TEXT NOT NULL,
    counterparty TEXT NOT NULL,
    name TEXT NOT NULL,
    mobile TEXT NOT NULL,
    address TEXT NOT NULL,
    due_amount TEXT NOT NULL,
    history TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL,
    PRIMARY KEY (owner, counterparty)
);
CREATE INDEX IF NOT EXISTS accounts_idx_owner_updated
    ON accounts(owner, updated_at);
"#;

/// SQLite-backed account store used for durable single-node deployments.
///
/// Each save replaces the whole document inside one transaction, so a failed
/// write leaves the previously persisted row untouched.
#[derive(Debug)]
pub struct SqliteAccountStore {
    path: PathBuf,
    feed: AccountFeed,
}

impl SqliteAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self {
            path: path.into(),
            feed: AccountFeed::default(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(ACCOUNT_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> StoreResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Ok(conn)
    }

    fn stored_version(
        conn: &Connection,
        owner: &OwnerId,
        counterparty: CounterpartyId,
    ) -> StoreResult<Option<u64>> {
        let version: Option<i64> = conn
            .query_row(
                "SELECT version FROM accounts WHERE owner = ?1 AND counterparty = ?2",
                params![owner.as_str(), counterparty.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.map(|value| value as u64))
    }
}

impl AccountStore for SqliteAccountStore {
    fn load(
        &self,
        owner: &OwnerId,
        counterparty: CounterpartyId,
    ) -> StoreResult<CounterpartyAccount> {
        let conn = self.connect()?;
        let account = conn
            .query_row(
                "SELECT counterparty, name, mobile, address, due_amount, history,
                        created_at, updated_at, version
                 FROM accounts WHERE owner = ?1 AND counterparty = ?2",
                params![owner.as_str(), counterparty.to_string()],
                row_to_account,
            )
            .optional()?;
        account.ok_or_else(|| StoreError::NotFound {
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
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let stored = Self::stored_version(&tx, owner, account.id)?;
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
        let history = serde_json::to_string(&persisted.history)?;
        tx.execute(
            "INSERT OR REPLACE INTO accounts (
                owner, counterparty, name, mobile, address, due_amount, history,
                created_at, updated_at, version
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                owner.as_str(),
                persisted.id.to_string(),
                persisted.name,
                persisted.mobile,
                persisted.address,
                persisted.balance.to_string(),
                history,
                persisted.created_at.to_rfc3339(),
                persisted.updated_at.to_rfc3339(),
                persisted.version as i64,
            ],
        )?;
        tx.commit()?;
        debug!(counterparty = %persisted.id, version = persisted.version, "account saved");
        self.feed.publish(AccountChange::Saved {
            owner: owner.clone(),
            account: persisted.clone(),
        });
        Ok(persisted)
    }

    fn delete(&self, owner: &OwnerId, counterparty: CounterpartyId) -> StoreResult<()> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM accounts WHERE owner = ?1 AND counterparty = ?2",
            params![owner.as_str(), counterparty.to_string()],
        )?;
        if removed == 0 {
            return Err(StoreError::NotFound {
                owner: owner.clone(),
                counterparty,
            });
        }
        debug!(counterparty = %counterparty, "account deleted");
        self.feed.publish(AccountChange::Deleted {
            owner: owner.clone(),
            counterparty,
        });
        Ok(())
    }

    fn list(&self, owner: &OwnerId, query: AccountQuery) -> StoreResult<Vec<CounterpartyAccount>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT counterparty, name, mobile, address, due_amount, history,
                    created_at, updated_at, version
             FROM accounts WHERE owner = ?1
             ORDER BY updated_at DESC",
        )?;
        let mut rows = stmt.query(params![owner.as_str()])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            let account = row_to_account(row)?;
            // Standing is a sign test on a decimal stored as text, so the
            // standing and name filters run here rather than in SQL.
            if !query.matches(&account) {
                continue;
            }
            accounts.push(account);
            if query.limit.is_some_and(|limit| accounts.len() >= limit) {
                break;
            }
        }
        Ok(accounts)
    }

    fn subscribe(&self) -> AccountWatcher {
        self.feed.subscribe()
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<CounterpartyAccount> {
    let counterparty: String = row.get(0)?;
    let name: String = row.get(1)?;
    let mobile: String = row.get(2)?;
    let address: String = row.get(3)?;
    let due_amount: String = row.get(4)?;
    let history: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    let version: i64 = row.get(8)?;

    let id = CounterpartyId::from_str(&counterparty)
        .map_err(|err| invalid_column(0, format!("invalid account id {counterparty}: {err}")))?;
    let balance = Decimal::from_str(&due_amount)
        .map_err(|err| invalid_column(4, format!("invalid decimal {due_amount}: {err}")))?;
    let history: Vec<LedgerEvent> = serde_json::from_str(&history)
        .map_err(|err| invalid_column(5, format!("invalid history payload: {err}")))?;
    let created_at = parse_timestamp(&created_at, 6)?;
    let updated_at = parse_timestamp(&updated_at, 7)?;

    Ok(CounterpartyAccount {
        id,
        name,
        mobile,
        address,
        balance,
        history,
        created_at,
        updated_at,
        version: version as u64,
    })
}

fn parse_timestamp(raw: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| invalid_column(column, format!("invalid timestamp {raw}: {err}")))
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        message.into(),
    )
}
