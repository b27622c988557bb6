use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{reconcile, Direction, LedgerEvent, LedgerResult, Reconciliation};

/// Identifier of the ledger owner, issued by the hosting auth provider.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Unique identifier of a counterparty account, assigned at creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterpartyId(Uuid);

impl CounterpartyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CounterpartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CounterpartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CounterpartyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Which side of the ledger an account currently sits on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    /// The owner is owed money.
    Receivable,
    /// The owner owes money.
    Payable,
    /// Nothing outstanding either way.
    Settled,
}

impl Standing {
    pub fn as_str(self) -> &'static str {
        match self {
            Standing::Receivable => "receivable",
            Standing::Payable => "payable",
            Standing::Settled => "settled",
        }
    }
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Standing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receivable" => Ok(Standing::Receivable),
            "payable" => Ok(Standing::Payable),
            "settled" => Ok(Standing::Settled),
            other => Err(format!("unknown standing: {other}")),
        }
    }
}

/// One counterparty record in an owner's ledger.
///
/// `balance` is the single source of truth for who owes whom: positive means
/// the counterparty owes the owner, negative means the owner owes the
/// counterparty. The serialized field names (`dueAmount`, `history`,
/// `createdAt`, `updatedAt`) match the documents written by earlier releases
/// and must not change.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartyAccount {
    pub id: CounterpartyId,
    pub name: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "dueAmount")]
    pub balance: Decimal,
    #[serde(default)]
    pub history: Vec<LedgerEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Write counter used by version-checked saves; 0 until first persisted.
    /// Absent in documents written before conditional saves existed.
    #[serde(default)]
    pub version: u64,
}

impl CounterpartyAccount {
    /// Create a settled account with no history.
    pub fn new(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: CounterpartyId::new(),
            name: name.into(),
            mobile: String::new(),
            address: String::new(),
            balance: Decimal::ZERO,
            history: Vec::new(),
            created_at: at,
            updated_at: at,
            version: 0,
        }
    }

    pub fn with_mobile(mut self, mobile: impl Into<String>) -> Self {
        self.mobile = mobile.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Current side of the ledger this account sits on.
    pub fn standing(&self) -> Standing {
        if self.balance > Decimal::ZERO {
            Standing::Receivable
        } else if self.balance < Decimal::ZERO {
            Standing::Payable
        } else {
            Standing::Settled
        }
    }

    /// True once the account has transacted and come back to zero. A zero
    /// balance with an empty history is a brand-new account, not a settled one.
    pub fn is_settled(&self) -> bool {
        self.balance.is_zero() && !self.history.is_empty()
    }

    /// Run one transaction through the reconciler and fold the outcome into
    /// this account: balance replaced, events appended in emitted order,
    /// `updated_at` moved to `at`. The `version` field is left for the store.
    pub fn apply(
        &mut self,
        direction: Direction,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> LedgerResult<Reconciliation> {
        let outcome = reconcile(self.balance, direction, amount, at)?;
        self.balance = outcome.new_balance;
        self.history.extend(outcome.events.iter().cloned());
        self.updated_at = at;
        Ok(outcome)
    }
}
