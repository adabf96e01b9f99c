//! Top-level error type composing `OrderBookError` and `RiskError` into
//! the six-kind taxonomy from spec §7, with hand-written `Display`/`Error`
//! impls and `From` conversions between layers — matching the teacher's
//! plain-enum error style rather than pulling in a derive-macro crate.

use crate::book::OrderBookError;
use crate::journal::JournalError;
use crate::ledger::LedgerError;
use crate::risk::RiskError;

/// Engine-level error, covering every kind in spec §7's taxonomy:
/// `ValidationError`, `RiskRejection`, `UnfulfillableTIF`, `NotFound`,
/// `TransientFailure`, and an unreachable-in-practice invariant violation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    /// Malformed or impossible intent; the intent was never admitted.
    Validation(OrderBookError),
    /// Pre-trade risk check failed; no lock, no sequence number, no event.
    Risk(RiskError),
    /// IOC executed zero, or FOK could not fill in full; synchronous
    /// rejection, any lock taken before the match step is rolled back.
    UnfulfillableTimeInForce { reason: String },
    /// Cancel for an unknown or already-terminal order; snapshot/stats
    /// request for an unknown pair.
    NotFound { what: String },
    /// Ledger or event sink unavailable; the engine retried within the
    /// writer step and gave up. Persistent failure marks the pair
    /// degraded.
    Transient { source: String },
    /// An invariant the matching/risk code is supposed to guarantee was
    /// violated. Should be unreachable; when it happens the pair is
    /// quarantined and this is logged with full context before returning.
    InvariantViolation { context: String },
    /// The pair does not exist, or exists but is marked inactive/degraded
    /// and is refusing new intents.
    PairUnavailable { symbol: String, reason: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "validation error: {e}"),
            EngineError::Risk(e) => write!(f, "risk rejection: {e}"),
            EngineError::UnfulfillableTimeInForce { reason } => {
                write!(f, "unfulfillable time-in-force: {reason}")
            }
            EngineError::NotFound { what } => write!(f, "not found: {what}"),
            EngineError::Transient { source } => write!(f, "transient failure: {source}"),
            EngineError::InvariantViolation { context } => {
                write!(f, "invariant violation: {context}")
            }
            EngineError::PairUnavailable { symbol, reason } => {
                write!(f, "pair {symbol} unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<OrderBookError> for EngineError {
    fn from(e: OrderBookError) -> Self {
        match e {
            OrderBookError::UnfulfillableTimeInForce { reason } => {
                EngineError::UnfulfillableTimeInForce { reason }
            }
            OrderBookError::OrderNotFound { order_id } => EngineError::NotFound { what: order_id },
            other => EngineError::Validation(other),
        }
    }
}

impl From<RiskError> for EngineError {
    fn from(e: RiskError) -> Self {
        EngineError::Risk(e)
    }
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        EngineError::Transient { source: e.to_string() }
    }
}

impl From<JournalError> for EngineError {
    fn from(e: JournalError) -> Self {
        EngineError::Transient { source: e.to_string() }
    }
}
