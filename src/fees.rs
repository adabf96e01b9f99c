//! Flat fee schedule with a VIP discount tag: one rate applied to every
//! fill's notional, multiplicatively discounted for VIP-tagged users. No
//! maker/taker split and no volume tiers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat fee rate plus an optional VIP discount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Flat taker/maker fee rate, `0 <= fee_rate <= 0.01`.
    pub fee_rate: Decimal,
    /// Multiplicative factor applied to `fee_rate` for VIP-tagged users
    /// (default `0.5`, i.e. a 50% discount).
    pub vip_discount: Decimal,
}

impl FeeSchedule {
    pub fn new(fee_rate: Decimal, vip_discount: Decimal) -> Self {
        Self {
            fee_rate,
            vip_discount,
        }
    }

    /// Fee for a fill of the given `notional` (`price * quantity`),
    /// discounted for VIP users.
    #[must_use]
    pub fn calculate_fee(&self, notional: Decimal, is_vip: bool) -> Decimal {
        let rate = if is_vip {
            self.fee_rate * self.vip_discount
        } else {
            self.fee_rate
        };
        notional * rate
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::ZERO,
            vip_discount: Decimal::new(5, 1), // 0.5
        }
    }
}
