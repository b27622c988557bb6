use khata_core::{AuditReport, CounterpartyAccount, LedgerEvent, Standing};
use khata_store::AccountChange;

const TAKA: &str = "৳";

/// One-line summary used by `list` and after every mutation.
pub fn account_line(account: &CounterpartyAccount) -> String {
    let standing = match account.standing() {
        Standing::Receivable => format!("owes you {TAKA}{}", account.balance),
        Standing::Payable => format!("you owe {TAKA}{}", -account.balance),
        Standing::Settled => "settled".to_string(),
    };
    format!("{}  {}  {}", account.id, account.name, standing)
}

/// Full account header for `show`.
pub fn account_details(account: &CounterpartyAccount) -> String {
    let mut lines = vec![account_line(account)];
    if !account.mobile.is_empty() {
        lines.push(format!("  mobile:  {}", account.mobile));
    }
    if !account.address.is_empty() {
        lines.push(format!("  address: {}", account.address));
    }
    lines.push(format!(
        "  since:   {}",
        account.created_at.format("%Y-%m-%d")
    ));
    lines.join("\n")
}

pub fn event_line(event: &LedgerEvent) -> String {
    format!(
        "{}  {:<18} {:>4}  {TAKA}{}",
        event.timestamp.format("%Y-%m-%d %H:%M"),
        event.label.as_str(),
        event.direction.as_str(),
        event.amount
    )
}

pub fn audit_line(report: &AuditReport) -> String {
    if report.is_consistent() {
        format!("{}  {}  ok", report.counterparty, report.name)
    } else {
        format!(
            "{}  {}  DRIFT stored {TAKA}{} replayed {TAKA}{} (delta {TAKA}{})",
            report.counterparty,
            report.name,
            report.stored,
            report.replayed,
            report.delta()
        )
    }
}

pub fn change_line(change: &AccountChange) -> String {
    match change {
        AccountChange::Saved { account, .. } => format!("saved    {}", account_line(account)),
        AccountChange::Deleted { counterparty, .. } => format!("deleted  {counterparty}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use khata_core::Direction;
    use rust_decimal_macros::dec;

    #[test]
    fn payable_accounts_render_from_the_owner_perspective() {
        let mut account = CounterpartyAccount::new("Rahim", Utc::now());
        account.apply(Direction::Took, dec!(300), Utc::now()).unwrap();
        let line = account_line(&account);
        assert!(line.contains("you owe ৳300"));
    }

    #[test]
    fn settled_accounts_say_so() {
        let account = CounterpartyAccount::new("Karim", Utc::now());
        assert!(account_line(&account).ends_with("settled"));
    }
}
