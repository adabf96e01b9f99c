//! Core `OrderBook` type: one per trading pair, holding both sides' price
//! levels, the order registry, and last-trade state.
//!
//! The `OrderBook` exclusively owns its orders and price-level index. It
//! is reached exclusively through the pair's writer lock held by
//! `crate::engine::Engine`, so every method here — even the ones taking
//! `&self` to match the `SkipMap`/`DashMap`-based interior mutability the
//! fields use — is only ever invoked by one caller at a time.

use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::order::{Order, OrderStatus, Side};
use crate::pair::TradingPair;
use crate::price_level::PriceLevelIndex;

use super::error::OrderBookError;
use super::snapshot::{MarketStats, OrderbookSnapshot, SnapshotLevel};
use super::stp::SelfTradePolicy;

pub const DEFAULT_SNAPSHOT_DEPTH: usize = 20;

/// A single recorded trade tick, kept only long enough to compute the
/// rolling 24h volume and price-change figures in [`MarketStats`].
struct TradeTick {
    at_ms: u64,
    price: Decimal,
    notional: Decimal,
}

/// One pair's resting orders, indexed for price-time priority matching.
pub struct OrderBook {
    pub pair: TradingPair,
    pub(crate) bids: PriceLevelIndex,
    pub(crate) asks: PriceLevelIndex,
    /// The book's exclusive registry of orders, resting or not-yet-terminal.
    /// Terminal orders are evicted once the engine has finished emitting
    /// their final order-update event.
    pub(crate) orders: DashMap<String, Order>,
    /// `order_id -> (price, side)` for O(1) cancel lookups, maintained in
    /// lockstep with `bids`/`asks`.
    pub(crate) order_locations: DashMap<String, (Decimal, Side)>,
    pub(crate) self_trade_policy: SelfTradePolicy,
    next_sequence: u64,
    last_trade_price: Option<Decimal>,
    trade_history: VecDeque<TradeTick>,
}

impl OrderBook {
    pub fn new(pair: TradingPair) -> Self {
        Self::with_policy(pair, SelfTradePolicy::default())
    }

    pub fn with_policy(pair: TradingPair, self_trade_policy: SelfTradePolicy) -> Self {
        Self {
            pair,
            bids: PriceLevelIndex::new_descending(),
            asks: PriceLevelIndex::new_ascending(),
            orders: DashMap::new(),
            order_locations: DashMap::new(),
            self_trade_policy,
            next_sequence: 0,
            last_trade_price: None,
            trade_history: VecDeque::new(),
        }
    }

    /// Assigns the next monotone per-pair sequence number. Called exactly
    /// once per accepted order, after validation and risk approval, before
    /// matching (spec.md §4.6).
    pub(crate) fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Static, side-effect-free validation: quantity bounds, limit price
    /// validity and precision, pair active flag. Balance/rate/price-band
    /// checks are delegated to `crate::risk::RiskGate` by the engine.
    pub fn validate_intent(
        &self,
        order_type: crate::order::OrderType,
        limit_price: Option<Decimal>,
        quantity: Decimal,
    ) -> Result<(), OrderBookError> {
        if !self.pair.active {
            return Err(OrderBookError::PairInactive {
                symbol: self.pair.symbol.clone(),
            });
        }
        if !self.pair.quantity_in_bounds(quantity) {
            return Err(OrderBookError::OrderSizeOutOfRange {
                quantity,
                min: self.pair.min_order_size,
                max: self.pair.max_order_size,
            });
        }
        if order_type == crate::order::OrderType::Limit {
            let price = limit_price.unwrap_or(Decimal::ZERO);
            if price <= Decimal::ZERO || !self.pair.price_matches_precision(price) {
                return Err(OrderBookError::InvalidPrice { price });
            }
        }
        Ok(())
    }

    /// Index side holding resting orders for `side`'s own book entries
    /// (a buy order rests among bids).
    pub(crate) fn own_side(&self, side: Side) -> &PriceLevelIndex {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Index side an order of `side` matches against (a buy matches asks).
    pub(crate) fn opposite_side(&self, side: Side) -> &PriceLevelIndex {
        match side.opposite() {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.best_price()
    }

    /// `(best_bid, best_ask)` in one call, for callers that want both
    /// sides without two separate lookups (e.g. `MarketStats`, tests).
    #[must_use]
    pub fn best_prices(&self) -> (Option<Decimal>, Option<Decimal>) {
        (self.best_bid(), self.best_ask())
    }

    /// Resting quantity at exactly `price` on `side`, or zero if nothing
    /// rests there. Unlike `PriceLevelIndex::quantity_at_or_better`, this
    /// does not aggregate across levels.
    #[must_use]
    pub fn depth_at(&self, side: Side, price: Decimal) -> Decimal {
        self.own_side(side)
            .orders_at(price)
            .iter()
            .filter_map(|id| self.orders.get(id).map(|o| o.remaining_quantity))
            .sum()
    }

    /// Records a trade for the rolling 24h stats and evicts ticks older
    /// than 24h.
    pub(crate) fn record_trade(&mut self, price: Decimal, quantity: Decimal, at_ms: u64) {
        self.last_trade_price = Some(price);
        self.trade_history.push_back(TradeTick {
            at_ms,
            price,
            notional: price * quantity,
        });
        let cutoff = at_ms.saturating_sub(24 * 60 * 60 * 1000);
        while matches!(self.trade_history.front(), Some(t) if t.at_ms < cutoff) {
            self.trade_history.pop_front();
        }
    }

    pub fn market_stats(&self) -> MarketStats {
        let volume_24h: Decimal = self.trade_history.iter().map(|t| t.notional).sum();
        let price_change_24h = self.trade_history.front().and_then(|oldest| {
            self.last_trade_price.map(|last| {
                if oldest.price.is_zero() {
                    Decimal::ZERO
                } else {
                    (last - oldest.price) / oldest.price
                }
            })
        });
        MarketStats {
            last_trade_price: self.last_trade_price,
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            volume_24h,
            price_change_24h,
        }
    }

    pub fn snapshot(&self, depth: usize) -> OrderbookSnapshot {
        let to_levels = |levels: Vec<crate::price_level::PriceLevel>| {
            levels
                .into_iter()
                .map(|l| SnapshotLevel {
                    price: l.price,
                    quantity: l.total_quantity,
                    order_count: l.order_count(),
                })
                .collect::<Vec<_>>()
        };
        OrderbookSnapshot {
            trading_pair: self.pair.symbol.clone(),
            bids: to_levels(self.bids.top_levels(depth)),
            asks: to_levels(self.asks.top_levels(depth)),
            timestamp: crate::utils::current_time_millis(),
        }
    }

    /// Reference price used by `RiskGate`'s price-band check: last trade
    /// price if one exists, else `None` (in which case the band check is
    /// skipped — there is nothing to deviate from yet).
    pub fn reference_mark(&self) -> Option<Decimal> {
        self.last_trade_price
    }

    /// Best-ask based notional estimate for a market buy of `quantity`,
    /// with an additive `slippage_bps` buffer, per spec.md §4.4 item 5.
    /// Walks the ask side (ungrounded in any single resting price, since a
    /// market order may sweep several levels) summing `price * qty` until
    /// `quantity` is covered or liquidity runs out.
    pub fn estimate_market_buy_notional(
        &self,
        quantity: Decimal,
        slippage_bps: u32,
    ) -> Option<Decimal> {
        let mut remaining = quantity;
        let mut notional = Decimal::ZERO;
        for (price, level) in self.asks.iter_in_match_order() {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(level.total_quantity);
            notional += take * price;
            remaining -= take;
        }
        if !remaining.is_zero() {
            return None;
        }
        let buffer = notional * Decimal::from(slippage_bps) / Decimal::from(10_000u32);
        Some(notional + buffer)
    }

    pub fn get_order(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn open_order_count_for_user(&self, user_id: &str) -> usize {
        self.orders
            .iter()
            .filter(|e| {
                e.value().user_id.as_deref() == Some(user_id) && !e.value().status.is_terminal()
            })
            .count()
    }

    /// Removes a resting order from both the registry and its price
    /// level. Returns the removed order, or `None` if not found or
    /// already terminal.
    pub fn cancel(&mut self, order_id: &str) -> Option<Order> {
        let (price, side) = *self.order_locations.get(order_id)?.value();
        let mut order = self.orders.get_mut(order_id)?;
        if order.status.is_terminal() {
            return None;
        }
        let remaining = order.remaining_quantity;
        order.mark_cancelled();
        let snapshot = order.clone();
        drop(order);
        self.own_side(side).remove(price, order_id, remaining);
        self.order_locations.remove(order_id);
        Some(snapshot)
    }

    /// Inserts an order with remaining quantity onto the book (GTC
    /// residual after matching).
    pub(crate) fn rest_order(&mut self, order: &Order) {
        self.own_side(order.side).insert(
            order.limit_price,
            order.order_id.clone(),
            order.remaining_quantity,
        );
        self.order_locations
            .insert(order.order_id.clone(), (order.limit_price, order.side));
    }

    /// All order IDs for a given user across this book, for mass-cancel
    /// style operations (used by `RiskGate` reconciliation and tests).
    pub fn order_ids_for_user(&self, user_id: &str) -> Vec<String> {
        self.orders
            .iter()
            .filter(|e| e.value().user_id.as_deref() == Some(user_id))
            .map(|e| e.key().clone())
            .collect()
    }
}
