//! A single price level: aggregate quantity plus a FIFO queue of order IDs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One price level on one side of one book.
///
/// Invariant: `total_quantity` equals the sum of `remaining_quantity` over
/// every order listed in `orders`; levels are deleted as soon as they go
/// empty (see [`crate::price_level::PriceLevelIndex::remove`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub total_quantity: Decimal,
    /// FIFO order: index 0 is the head (oldest, matches first).
    orders: VecDeque<String>,
}

impl PriceLevel {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            total_quantity: Decimal::ZERO,
            orders: VecDeque::new(),
        }
    }

    /// Number of resting orders at this level.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Appends an order to the FIFO tail and adds its quantity to the total.
    pub fn push_back(&mut self, order_id: String, quantity: Decimal) {
        self.orders.push_back(order_id);
        self.total_quantity += quantity;
    }

    /// The order at the front of the FIFO queue, if any.
    #[must_use]
    pub fn head(&self) -> Option<&String> {
        self.orders.front()
    }

    /// Removes a specific order from the queue (not necessarily the head —
    /// self-trade skip and cancellation both need to remove an arbitrary
    /// order) and subtracts `quantity` from the total.
    ///
    /// Returns `true` if the order was present.
    pub fn remove(&mut self, order_id: &str, quantity: Decimal) -> bool {
        if let Some(pos) = self.orders.iter().position(|id| id == order_id) {
            self.orders.remove(pos);
            self.total_quantity -= quantity;
            true
        } else {
            false
        }
    }

    /// Decrements the head order's contribution to the total by
    /// `filled_quantity` without removing it from the queue (used when a
    /// fill only partially consumes the head).
    pub fn reduce_head(&mut self, filled_quantity: Decimal) {
        self.total_quantity -= filled_quantity;
    }

    /// Pops the head off the FIFO queue (used once it has been fully
    /// consumed by a fill, or skipped past for self-trade prevention's
    /// "cancel maker" policy).
    pub fn pop_front(&mut self) -> Option<String> {
        self.orders.pop_front()
    }

    /// Iterates order IDs front-to-back without mutating the level —
    /// used by self-trade scans that must look past the head.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.orders.iter()
    }

}
