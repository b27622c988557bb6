use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which way money moved between the owner and the counterparty.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The owner handed money to the counterparty.
    Gave,
    /// The owner received money from the counterparty.
    Took,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Gave => "gave",
            Direction::Took => "took",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gave" => Ok(Direction::Gave),
            "took" => Ok(Direction::Took),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Economic classification of a ledger event, independent of its direction.
///
/// A repayment and a fresh loan can move money the same way; this label is
/// what tells them apart in the history.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    NewLoanGiven,
    NewLoanTaken,
    RepaymentReceived,
    RepaymentMade,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::NewLoanGiven => "new-loan-given",
            EntryKind::NewLoanTaken => "new-loan-taken",
            EntryKind::RepaymentReceived => "repayment-received",
            EntryKind::RepaymentMade => "repayment-made",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new-loan-given" => Ok(EntryKind::NewLoanGiven),
            "new-loan-taken" => Ok(EntryKind::NewLoanTaken),
            "repayment-received" => Ok(EntryKind::RepaymentReceived),
            "repayment-made" => Ok(EntryKind::RepaymentMade),
            other => Err(format!("unknown entry kind: {other}")),
        }
    }
}

/// Immutable record of one money movement in an account's history.
///
/// `amount` is always the positive magnitude moved; the sign of the balance
/// change follows from `direction`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub direction: Direction,
    pub label: EntryKind,
}

impl LedgerEvent {
    pub fn new(
        amount: Decimal,
        direction: Direction,
        label: EntryKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            amount,
            direction,
            label,
        }
    }

    /// Signed contribution of this event to the account balance.
    pub fn signed_delta(&self) -> Decimal {
        match self.direction {
            Direction::Gave => self.amount,
            Direction::Took => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn direction_round_trips_through_str() {
        for direction in [Direction::Gave, Direction::Took] {
            assert_eq!(direction.as_str().parse::<Direction>().unwrap(), direction);
        }
        assert!("borrowed".parse::<Direction>().is_err());
    }

    #[test]
    fn entry_kind_uses_kebab_case_wire_names() {
        assert_eq!(EntryKind::NewLoanGiven.as_str(), "new-loan-given");
        assert_eq!(
            "repayment-received".parse::<EntryKind>().unwrap(),
            EntryKind::RepaymentReceived
        );
        let json = serde_json::to_string(&EntryKind::RepaymentMade).unwrap();
        assert_eq!(json, "\"repayment-made\"");
    }

    #[test]
    fn signed_delta_follows_direction_for_every_label() {
        let at = Utc::now();
        let gave = LedgerEvent::new(dec!(120), Direction::Gave, EntryKind::RepaymentMade, at);
        let took = LedgerEvent::new(dec!(120), Direction::Took, EntryKind::NewLoanTaken, at);
        assert_eq!(gave.signed_delta(), dec!(120));
        assert_eq!(took.signed_delta(), dec!(-120));
    }
}
