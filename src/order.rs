//! Order types, the order state machine, and the resting-order record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::current_time_millis;

/// Which side of the book an order rests on or matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an incoming order of this side matches against.
    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Limit orders carry a price; market orders sweep at whatever price is
/// resting on the opposite side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// Time-in-force policy applied once the match loop terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-Till-Cancel: unexecuted remainder rests on the book.
    Gtc,
    /// Immediate-Or-Cancel: unexecuted remainder is discarded, never rests.
    Ioc,
    /// Fill-Or-Kill: must execute in full or not at all.
    Fok,
}

impl Default for TimeInForce {
    fn default() -> Self {
        TimeInForce::Gtc
    }
}

/// Order lifecycle state.
///
/// Transitions: `pending -> (validation) -> rejected | open |
/// partially_filled | filled | cancelled`, and `open -> partially_filled ->
/// filled`, with `open`/`partially_filled -> cancelled` valid before
/// terminality. `filled`, `rejected`, and `cancelled` are terminal; a
/// terminal order is never re-introduced into the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses can never transition further.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// A validated order intent as it arrives at the [`crate::book::OrderBook`],
/// before a sequence number or order ID has been assigned.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub trading_pair: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Required for `OrderType::Limit`, ignored for `OrderType::Market`.
    pub limit_price: Option<Decimal>,
    pub quantity: Decimal,
    pub time_in_force: TimeInForce,
    pub user_id: Option<String>,
}

/// A mutable order record, owned exclusively by the [`crate::book::OrderBook`]
/// that admitted it while it rests on the book.
///
/// Invariant: `filled_quantity + remaining_quantity == original_quantity`;
/// `average_fill_price` is the quantity-weighted mean of all fill prices;
/// a resting order is always indexed by `(side, limit_price,
/// sequence_number)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub user_id: Option<String>,
    pub trading_pair: String,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    /// Zero for market orders.
    pub limit_price: Decimal,
    pub original_quantity: Decimal,
    pub filled_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub average_fill_price: Decimal,
    pub status: OrderStatus,
    /// Monotone per-pair counter assigned at acceptance.
    pub sequence_number: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Order {
    /// Builds a freshly-accepted order in `Pending` status with full
    /// remaining quantity and no fills.
    pub fn new(
        order_id: String,
        intent: &OrderIntent,
        sequence_number: u64,
    ) -> Self {
        let now = current_time_millis();
        Self {
            order_id,
            user_id: intent.user_id.clone(),
            trading_pair: intent.trading_pair.clone(),
            side: intent.side,
            order_type: intent.order_type,
            time_in_force: intent.time_in_force,
            limit_price: intent.limit_price.unwrap_or(Decimal::ZERO),
            original_quantity: intent.quantity,
            filled_quantity: Decimal::ZERO,
            remaining_quantity: intent.quantity,
            average_fill_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            sequence_number,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies one fill to this order, updating `filled_quantity`,
    /// `remaining_quantity`, `average_fill_price`, and `status`.
    ///
    /// Caller is responsible for ensuring `fill_quantity <=
    /// remaining_quantity`.
    pub fn apply_fill(&mut self, fill_quantity: Decimal, fill_price: Decimal) {
        let prior_notional = self.average_fill_price * self.filled_quantity;
        let fill_notional = fill_price * fill_quantity;
        self.filled_quantity += fill_quantity;
        self.remaining_quantity -= fill_quantity;
        if !self.filled_quantity.is_zero() {
            self.average_fill_price = (prior_notional + fill_notional) / self.filled_quantity;
        }
        self.status = if self.remaining_quantity.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = current_time_millis();
    }

    /// Marks the order open with no fills (resting, GTC remainder).
    pub fn mark_open(&mut self) {
        self.status = OrderStatus::Open;
        self.updated_at = current_time_millis();
    }

    /// Marks the order cancelled. No-op on an already-terminal order.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = current_time_millis();
        true
    }

    /// Marks the order rejected with no side effects.
    pub fn mark_rejected(&mut self) {
        self.status = OrderStatus::Rejected;
        self.updated_at = current_time_millis();
    }

    /// Notional value of the unexecuted limit remainder (`remaining_quantity
    /// * limit_price`). Zero for market orders.
    #[must_use]
    pub fn remaining_notional(&self) -> Decimal {
        self.remaining_quantity * self.limit_price
    }
}
