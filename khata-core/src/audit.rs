use rust_decimal::Decimal;

use crate::{CounterpartyAccount, CounterpartyId, LedgerEvent};

/// Fold a history by signed delta, reconstructing the balance from zero.
pub fn replay(history: &[LedgerEvent]) -> Decimal {
    history.iter().map(LedgerEvent::signed_delta).sum()
}

/// Comparison of a stored balance against its replayed history.
#[derive(Clone, Debug)]
pub struct AuditReport {
    pub counterparty: CounterpartyId,
    pub name: String,
    pub stored: Decimal,
    pub replayed: Decimal,
}

impl AuditReport {
    /// Amount by which the stored balance drifts from the history.
    pub fn delta(&self) -> Decimal {
        self.stored - self.replayed
    }

    pub fn is_consistent(&self) -> bool {
        self.stored == self.replayed
    }
}

/// Check that an account's stored balance matches the fold of its history.
pub fn audit(account: &CounterpartyAccount) -> AuditReport {
    AuditReport {
        counterparty: account.id,
        name: account.name.clone(),
        stored: account.balance,
        replayed: replay(&account.history),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn reconciled_accounts_always_audit_clean() {
        let mut account = CounterpartyAccount::new("Rahim", Utc::now());
        for (direction, amount) in [
            (Direction::Gave, dec!(500)),
            (Direction::Took, dec!(900)),
            (Direction::Gave, dec!(400)),
            (Direction::Gave, dec!(35.50)),
        ] {
            account.apply(direction, amount, Utc::now()).unwrap();
        }
        let report = audit(&account);
        assert!(report.is_consistent());
        assert_eq!(report.delta(), dec!(0));
    }

    #[test]
    fn detects_a_tampered_balance() {
        let mut account = CounterpartyAccount::new("Karim", Utc::now());
        account.apply(Direction::Gave, dec!(100), Utc::now()).unwrap();
        account.balance += dec!(1);
        let report = audit(&account);
        assert!(!report.is_consistent());
        assert_eq!(report.delta(), dec!(1));
    }

    #[test]
    fn empty_history_replays_to_zero() {
        assert_eq!(replay(&[]), dec!(0));
    }
}
