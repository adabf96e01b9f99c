//! Per-(user, pair) balance, lock, and activity state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One user's accounting for one trading pair.
///
/// Invariant: all six numeric fields are `>= 0`. Across any sequence of
/// lock/unlock/settle steps, `base_balance + locked_base` and
/// `quote_balance + locked_quote` change only by the amounts fills and
/// fees actually move — no funds appear or vanish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserPosition {
    pub base_balance: Decimal,
    pub quote_balance: Decimal,
    pub locked_base: Decimal,
    pub locked_quote: Decimal,
    /// Quote-denominated notional traded in the trailing day.
    pub daily_volume: Decimal,
    pub open_order_count: u32,
    pub last_order_time: u64,
}

impl UserPosition {
    /// A position with starting balances and no activity yet — used when
    /// a (user, pair) is seen for the first time. Real deployments would
    /// seed this from an external account store.
    pub fn new(base_balance: Decimal, quote_balance: Decimal) -> Self {
        Self {
            base_balance,
            quote_balance,
            locked_base: Decimal::ZERO,
            locked_quote: Decimal::ZERO,
            daily_volume: Decimal::ZERO,
            open_order_count: 0,
            last_order_time: 0,
        }
    }
}

impl Default for UserPosition {
    fn default() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }
}
