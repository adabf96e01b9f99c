//! Immutable fill records and the `TradeExecutor` that turns one
//! `crate::book::matching::MatchEvent` into a fee-bearing, trade-ID-bearing
//! `Fill`, settling risk and staging events as it goes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::book::matching::{MatchEvent, MatchType};
use crate::book::{OrderBook, OrderBookError};
use crate::fees::FeeSchedule;
use crate::order::Order;
use crate::risk::RiskGate;

/// One completed match between two orders, transferred by value to the
/// ledger and event sink once produced. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub trade_id: String,
    pub trading_pair: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub buyer_order_id: String,
    pub seller_order_id: String,
    pub buyer_user_id: Option<String>,
    pub seller_user_id: Option<String>,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,
    pub timestamp: u64,
    pub match_type: MatchType,
}

/// Monotone `trade_<ms-epoch>_<seq>` ID generator, one per `Engine`.
#[derive(Debug, Default)]
pub struct TradeIdGenerator {
    next_seq: std::sync::atomic::AtomicU64,
}

impl TradeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn next(&self, at_ms: u64) -> String {
        let seq = self
            .next_seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("trade_{at_ms}_{seq}")
    }
}

/// Finalizes one `MatchEvent` as an atomic step: validates the match is
/// still legal, computes fees, mutates both orders, settles risk, and
/// produces the `Fill` to hand to the ledger and event sink.
///
/// Holds no state of its own beyond the fee schedule; trade IDs come from
/// the single global counter the `crate::engine::Engine` owns (spec §4.6
/// "Trade IDs use a separate global counter"), passed in per call.
/// Invoked once per `MatchEvent`, inside the same per-pair writer step
/// that produced the match (see `crate::engine`).
pub struct TradeExecutor {
    fees: FeeSchedule,
}

impl TradeExecutor {
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        self.fees
    }

    pub fn set_fee_schedule(&mut self, fees: FeeSchedule) {
        self.fees = fees;
    }

    /// Turns one `MatchEvent` into a settled `Fill`.
    ///
    /// `book` must be the same book that produced `event` — both orders
    /// are looked up by ID to validate the match is still legal (both
    /// non-terminal at the point of lookup is implied by the caller
    /// having just mutated them in the same walk) and to read the final
    /// per-order state needed for settlement and the order-update event.
    #[instrument(skip(self, book, risk, trade_ids), fields(pair = %book.pair.symbol, price = %event.price, quantity = %event.quantity))]
    pub fn execute(
        &self,
        book: &OrderBook,
        risk: &RiskGate,
        trade_ids: &TradeIdGenerator,
        event: &MatchEvent,
        buyer_is_vip: bool,
        seller_is_vip: bool,
        at_ms: u64,
    ) -> Result<Fill, OrderBookError> {
        if event.buyer_user_id.is_some() && event.buyer_user_id == event.seller_user_id {
            error!("self-trade reached TradeExecutor — invariant violation");
            return Err(OrderBookError::OrderNotFound {
                order_id: event.maker_order_id.clone(),
            });
        }

        let notional = event.price * event.quantity;
        let buyer_fee = self.fees.calculate_fee(notional, buyer_is_vip);
        let seller_fee = self.fees.calculate_fee(notional, seller_is_vip);

        let buyer_order = book
            .get_order(&event.buyer_order_id)
            .ok_or_else(|| OrderBookError::OrderNotFound {
                order_id: event.buyer_order_id.clone(),
            })?;
        let seller_order = book
            .get_order(&event.seller_order_id)
            .ok_or_else(|| OrderBookError::OrderNotFound {
                order_id: event.seller_order_id.clone(),
            })?;

        risk.settle_order_fill(&buyer_order, event.quantity, event.price, buyer_fee, at_ms);
        risk.settle_order_fill(&seller_order, event.quantity, event.price, seller_fee, at_ms);

        if buyer_order.status.is_terminal() {
            risk.finalize_filled(&buyer_order);
        }
        if seller_order.status.is_terminal() {
            risk.finalize_filled(&seller_order);
        }

        Ok(Fill {
            trade_id: trade_ids.next(at_ms),
            trading_pair: book.pair.symbol.clone(),
            price: event.price,
            quantity: event.quantity,
            buyer_order_id: event.buyer_order_id.clone(),
            seller_order_id: event.seller_order_id.clone(),
            buyer_user_id: event.buyer_user_id.clone(),
            seller_user_id: event.seller_user_id.clone(),
            buyer_fee,
            seller_fee,
            timestamp: at_ms,
            match_type: event.match_type,
        })
    }
}
