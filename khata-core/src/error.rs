use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias for reconciler operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type surfaced by the reconciler.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A transaction amount was zero or negative. Callers validate input
    /// before invoking the reconciler, so reaching this is a caller bug.
    #[error("transaction amount must be positive, got {0}")]
    InvalidAmount(Decimal),
}
