//! Self-trade prevention policy.
//!
//! The default, [`SelfTradePolicy::Skip`], treats a same-user cross as a
//! no-op: the incoming order's attempt against a same-user resting head
//! doesn't match, and matching advances past it, rather than cancelling
//! either order outright.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelfTradePolicy {
    /// Skip the same-user resting order and continue matching against the
    /// next one at that price, then the next price level. This is the
    /// spec's default behavior.
    #[default]
    Skip,
    /// Stop matching the incoming (taker) order entirely as soon as a
    /// same-user resting order is encountered; whatever matched before
    /// that point stands.
    CancelTaker,
    /// Remove the same-user resting (maker) order from the book without
    /// crediting it a fill, then continue matching the taker against the
    /// next resting order.
    CancelMaker,
}

impl std::fmt::Display for SelfTradePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelfTradePolicy::Skip => write!(f, "skip"),
            SelfTradePolicy::CancelTaker => write!(f, "cancel_taker"),
            SelfTradePolicy::CancelMaker => write!(f, "cancel_maker"),
        }
    }
}
