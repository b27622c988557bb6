use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{Direction, EntryKind, LedgerError, LedgerEvent, LedgerResult};

/// Outcome of applying one transaction to an account snapshot.
#[derive(Clone, Debug)]
pub struct Reconciliation {
    pub new_balance: Decimal,
    /// One or two events, repayment portion first when the transaction splits.
    pub events: Vec<LedgerEvent>,
}

/// Apply one transaction to a signed balance, netting it against any debt
/// outstanding in the opposite direction.
///
/// A positive balance means the owner is owed money, a negative balance means
/// the owner owes. Handing money over while in debt repays the debt first;
/// when the amount exceeds the debt, the transaction splits into a repayment
/// clearing the debt followed by a fresh loan for the remainder. An amount
/// exactly equal to the outstanding debt stays a single repayment and settles
/// the account at zero. Both events of a split carry the same `at` timestamp.
///
/// Pure computation: the caller persists the updated balance and appends the
/// returned events to the stored history.
pub fn reconcile(
    balance: Decimal,
    direction: Direction,
    amount: Decimal,
    at: DateTime<Utc>,
) -> LedgerResult<Reconciliation> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    let (new_balance, events) = match direction {
        Direction::Gave => {
            let debt = -balance;
            let events = if debt > Decimal::ZERO {
                if amount <= debt {
                    vec![LedgerEvent::new(
                        amount,
                        direction,
                        EntryKind::RepaymentMade,
                        at,
                    )]
                } else {
                    vec![
                        LedgerEvent::new(debt, direction, EntryKind::RepaymentMade, at),
                        LedgerEvent::new(amount - debt, direction, EntryKind::NewLoanGiven, at),
                    ]
                }
            } else {
                vec![LedgerEvent::new(
                    amount,
                    direction,
                    EntryKind::NewLoanGiven,
                    at,
                )]
            };
            (balance + amount, events)
        }
        Direction::Took => {
            let receivable = balance;
            let events = if receivable > Decimal::ZERO {
                if amount <= receivable {
                    vec![LedgerEvent::new(
                        amount,
                        direction,
                        EntryKind::RepaymentReceived,
                        at,
                    )]
                } else {
                    vec![
                        LedgerEvent::new(receivable, direction, EntryKind::RepaymentReceived, at),
                        LedgerEvent::new(
                            amount - receivable,
                            direction,
                            EntryKind::NewLoanTaken,
                            at,
                        ),
                    ]
                }
            } else {
                vec![LedgerEvent::new(
                    amount,
                    direction,
                    EntryKind::NewLoanTaken,
                    at,
                )]
            };
            (balance - amount, events)
        }
    };
    Ok(Reconciliation {
        new_balance,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay;
    use rust_decimal_macros::dec;

    fn run(balance: Decimal, direction: Direction, amount: Decimal) -> Reconciliation {
        reconcile(balance, direction, amount, Utc::now()).unwrap()
    }

    #[test]
    fn fresh_loan_given_from_zero() {
        let outcome = run(dec!(0), Direction::Gave, dec!(500));
        assert_eq!(outcome.new_balance, dec!(500));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].amount, dec!(500));
        assert_eq!(outcome.events[0].direction, Direction::Gave);
        assert_eq!(outcome.events[0].label, EntryKind::NewLoanGiven);
    }

    #[test]
    fn giving_more_while_already_owed_extends_the_loan() {
        let outcome = run(dec!(250), Direction::Gave, dec!(100));
        assert_eq!(outcome.new_balance, dec!(350));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].label, EntryKind::NewLoanGiven);
    }

    #[test]
    fn partial_repayment_of_own_debt() {
        let outcome = run(dec!(-300), Direction::Gave, dec!(200));
        assert_eq!(outcome.new_balance, dec!(-100));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].label, EntryKind::RepaymentMade);
    }

    #[test]
    fn exact_repayment_settles_without_a_split() {
        let outcome = run(dec!(-300), Direction::Gave, dec!(300));
        assert_eq!(outcome.new_balance, dec!(0));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].amount, dec!(300));
        assert_eq!(outcome.events[0].label, EntryKind::RepaymentMade);
    }

    #[test]
    fn overpaying_own_debt_splits_into_repayment_then_loan() {
        let outcome = run(dec!(-300), Direction::Gave, dec!(800));
        assert_eq!(outcome.new_balance, dec!(500));
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.events[0].amount, dec!(300));
        assert_eq!(outcome.events[0].label, EntryKind::RepaymentMade);
        assert_eq!(outcome.events[1].amount, dec!(500));
        assert_eq!(outcome.events[1].label, EntryKind::NewLoanGiven);
        assert_eq!(outcome.events[0].timestamp, outcome.events[1].timestamp);
    }

    #[test]
    fn collecting_part_of_a_receivable() {
        let outcome = run(dec!(500), Direction::Took, dec!(200));
        assert_eq!(outcome.new_balance, dec!(300));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].label, EntryKind::RepaymentReceived);
    }

    #[test]
    fn exact_collection_settles_without_a_split() {
        let outcome = run(dec!(500), Direction::Took, dec!(500));
        assert_eq!(outcome.new_balance, dec!(0));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].label, EntryKind::RepaymentReceived);
    }

    #[test]
    fn collecting_past_the_receivable_splits_into_repayment_then_borrow() {
        let outcome = run(dec!(500), Direction::Took, dec!(900));
        assert_eq!(outcome.new_balance, dec!(-400));
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.events[0].amount, dec!(500));
        assert_eq!(outcome.events[0].label, EntryKind::RepaymentReceived);
        assert_eq!(outcome.events[1].amount, dec!(400));
        assert_eq!(outcome.events[1].label, EntryKind::NewLoanTaken);
    }

    #[test]
    fn taking_while_already_in_debt_deepens_it() {
        let outcome = run(dec!(-150), Direction::Took, dec!(50));
        assert_eq!(outcome.new_balance, dec!(-200));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].label, EntryKind::NewLoanTaken);
    }

    #[test]
    fn taking_from_settled_starts_a_borrow() {
        let outcome = run(dec!(0), Direction::Took, dec!(75));
        assert_eq!(outcome.new_balance, dec!(-75));
        assert_eq!(outcome.events[0].label, EntryKind::NewLoanTaken);
    }

    #[test]
    fn split_amounts_always_sum_to_the_request() {
        let outcome = run(dec!(-300), Direction::Gave, dec!(800));
        let total: Decimal = outcome.events.iter().map(|event| event.amount).sum();
        assert_eq!(total, dec!(800));
    }

    #[test]
    fn replayed_events_reproduce_the_balance_delta() {
        let cases = [
            (dec!(0), Direction::Gave, dec!(500)),
            (dec!(-300), Direction::Gave, dec!(300)),
            (dec!(-300), Direction::Gave, dec!(800)),
            (dec!(500), Direction::Took, dec!(200)),
            (dec!(500), Direction::Took, dec!(900)),
            (dec!(-150), Direction::Took, dec!(50)),
            (dec!(250), Direction::Gave, dec!(0.01)),
        ];
        for (balance, direction, amount) in cases {
            let outcome = run(balance, direction, amount);
            assert_eq!(
                replay(&outcome.events),
                outcome.new_balance - balance,
                "delta mismatch for {balance} {direction} {amount}"
            );
        }
    }

    #[test]
    fn rejects_non_positive_amounts() {
        for amount in [dec!(0), dec!(-10)] {
            let err = reconcile(dec!(100), Direction::Gave, amount, Utc::now()).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)));
        }
    }

    #[test]
    fn handles_fractional_amounts() {
        let outcome = run(dec!(-0.50), Direction::Gave, dec!(1.25));
        assert_eq!(outcome.new_balance, dec!(0.75));
        assert_eq!(outcome.events[0].amount, dec!(0.50));
        assert_eq!(outcome.events[1].amount, dec!(0.75));
    }
}
