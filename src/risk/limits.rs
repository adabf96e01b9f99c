//! Per-pair risk limit configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-pair risk limit configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum notional for a single order.
    pub max_order_size: Decimal,
    /// Maximum notional a user may trade on this pair per rolling day.
    pub max_daily_volume: Decimal,
    /// Maximum number of simultaneously open (non-terminal) orders.
    pub max_open_orders: u32,
    /// Maximum notional position (base balance valued at the reference
    /// mark) a user may hold on this pair.
    pub max_position_size: Decimal,
    /// Below this fractional deviation from the reference mark, a limit
    /// order's price is accepted without comment.
    pub min_price_deviation: Decimal,
    /// Above this fractional deviation from the reference mark, a limit
    /// order's price is rejected outright.
    pub max_price_deviation: Decimal,
    /// Minimum milliseconds between two orders from the same user on this
    /// pair before the request is refused outright.
    pub min_order_interval_ms: u64,
    /// Minimum milliseconds between two orders before only a warning
    /// (rather than outright refusal) is attached.
    pub warn_order_interval_ms: u64,
    /// Additive slippage buffer (basis points) applied to the best-ask
    /// notional estimate used for market-buy balance checks.
    pub market_buy_slippage_bps: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_size: Decimal::new(1_000_000, 0),
            max_daily_volume: Decimal::new(10_000_000, 0),
            max_open_orders: 200,
            max_position_size: Decimal::new(5_000_000, 0),
            min_price_deviation: Decimal::new(1, 2),  // 0.01
            max_price_deviation: Decimal::new(10, 2), // 0.10
            min_order_interval_ms: 1_000,
            warn_order_interval_ms: 5_000,
            market_buy_slippage_bps: 0,
        }
    }
}
