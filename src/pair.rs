//! Trading pair configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable (at runtime) configuration for one trading pair.
///
/// A `TradingPair` is created by admin tooling outside the core and handed
/// to [`crate::engine::Engine::add_pair`]; nothing inside the core mutates
/// it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    /// e.g. `"BTC-USDT"`.
    pub symbol: String,
    /// Base asset, e.g. `"BTC"`.
    pub base_asset: String,
    /// Quote asset, e.g. `"USDT"`.
    pub quote_asset: String,
    /// Minimum order quantity, inclusive.
    pub min_order_size: Decimal,
    /// Maximum order quantity, inclusive.
    pub max_order_size: Decimal,
    /// Number of decimal places a limit price may carry.
    pub price_precision: u32,
    /// Number of decimal places a quantity may carry.
    pub quantity_precision: u32,
    /// Whether the pair currently accepts new orders.
    pub active: bool,
}

impl TradingPair {
    /// Returns `true` if `price` is compatible with [`Self::price_precision`],
    /// i.e. rounding it to that many decimal places changes nothing.
    #[must_use]
    pub fn price_matches_precision(&self, price: Decimal) -> bool {
        price.round_dp(self.price_precision) == price
    }

    /// Returns `true` if `quantity` is compatible with
    /// [`Self::quantity_precision`].
    #[must_use]
    pub fn quantity_matches_precision(&self, quantity: Decimal) -> bool {
        quantity.round_dp(self.quantity_precision) == quantity
    }

    /// Returns `true` if `quantity` falls within `[min_order_size,
    /// max_order_size]`.
    #[must_use]
    pub fn quantity_in_bounds(&self, quantity: Decimal) -> bool {
        quantity >= self.min_order_size && quantity <= self.max_order_size
    }
}
