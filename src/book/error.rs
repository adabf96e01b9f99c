//! `OrderBook`-level errors.
//!
//! A plain enum with a hand-written `Display`/`std::error::Error` impl.

use rust_decimal::Decimal;

use crate::order::Side;

/// Errors raised while validating or matching a single order inside one
/// `OrderBook`. Pre-admission errors carry no side effects; see
/// `crate::error::EngineError` for how these compose with risk rejections.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum OrderBookError {
    /// Quantity outside `[min_order_size, max_order_size]`.
    OrderSizeOutOfRange {
        quantity: Decimal,
        min: Decimal,
        max: Decimal,
    },
    /// Limit order price was zero, negative, or not a multiple of the
    /// pair's price precision.
    InvalidPrice { price: Decimal },
    /// The pair is not currently accepting new orders.
    PairInactive { symbol: String },
    /// Order ID not found, or already terminal.
    OrderNotFound { order_id: String },
    /// Market order submitted against an empty opposite side.
    InsufficientLiquidity {
        side: Side,
        requested: Decimal,
        available: Decimal,
    },
    /// IOC executed zero quantity, or FOK could not fill in full.
    UnfulfillableTimeInForce { reason: String },
}

impl std::fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderBookError::OrderSizeOutOfRange { quantity, min, max } => write!(
                f,
                "order size {quantity} outside allowed range [{min}, {max}]"
            ),
            OrderBookError::InvalidPrice { price } => {
                write!(f, "invalid limit price: {price}")
            }
            OrderBookError::PairInactive { symbol } => {
                write!(f, "trading pair {symbol} is not active")
            }
            OrderBookError::OrderNotFound { order_id } => {
                write!(f, "order not found: {order_id}")
            }
            OrderBookError::InsufficientLiquidity {
                side,
                requested,
                available,
            } => write!(
                f,
                "insufficient liquidity for {side} order: requested {requested}, available {available}"
            ),
            OrderBookError::UnfulfillableTimeInForce { reason } => {
                write!(f, "unfulfillable time-in-force: {reason}")
            }
        }
    }
}

impl std::error::Error for OrderBookError {}
