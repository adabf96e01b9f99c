//! The matching algorithm: price-time priority over limit/market ×
//! GTC/IOC/FOK, with configurable self-trade prevention.
//!
//! This module only ever touches the `OrderBook`'s own order registry and
//! price-level indices — never risk state, the ledger, or the event sink.
//! Those are the engine's and `crate::trade` module's job, invoked once
//! per produced [`MatchEvent`] immediately after this function returns,
//! still within the same per-pair writer step (see `crate::engine`). This
//! module does only the order-state bookkeeping the walk itself cannot
//! proceed without — `filled_quantity`/`remaining_quantity`/`status`,
//! inseparable from deciding when a resting order is exhausted — while
//! fees, trade IDs, risk settlement, and ledger/event writes happen
//! afterward per `MatchEvent`.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::order::{Order, OrderStatus, OrderType, Side, TimeInForce};

use super::book::OrderBook;
use super::error::OrderBookError;
use super::stp::SelfTradePolicy;

/// Kind of fill, mirroring which side(s) were fully consumed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MatchType {
    Full,
    PartialBuyer,
    PartialSeller,
    PartialBoth,
}

/// One match produced by the walk, ready for `crate::trade::TradeExecutor`
/// to turn into a fee-bearing, trade-ID-bearing [`crate::trade::Fill`].
#[derive(Debug, Clone)]
pub struct MatchEvent {
    pub price: Decimal,
    pub quantity: Decimal,
    pub buyer_order_id: String,
    pub seller_order_id: String,
    pub buyer_user_id: Option<String>,
    pub seller_user_id: Option<String>,
    /// The resting order's ID — always one of `buyer_order_id`/
    /// `seller_order_id` — so the caller knows which order-update to emit
    /// besides the taker's own.
    pub maker_order_id: String,
    pub match_type: MatchType,
}

/// Everything a single `OrderBook::submit` call produced, before fees or
/// risk settlement.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub fills: Vec<MatchEvent>,
    /// Resting orders removed with zero credited quantity by the
    /// `CancelMaker` self-trade policy.
    pub stp_cancelled_makers: Vec<String>,
    /// Set when `SelfTradePolicy::CancelTaker` stopped the walk early.
    pub taker_stopped_by_stp: bool,
}

impl OrderBook {
    /// Runs the match loop for `taker` against the opposite side, honoring
    /// time-in-force semantics. Mutates `taker` in place
    /// (filled/remaining/average price/status) and the book's resting
    /// orders and price levels. Does not insert any GTC residual — the
    /// caller does that once it has decided the final status.
    pub(crate) fn match_order(&self, taker: &mut Order) -> Result<MatchOutcome, OrderBookError> {
        let opposite_empty = self.opposite_side(taker.side).is_empty();

        if taker.order_type == OrderType::Market && opposite_empty {
            return Err(OrderBookError::InsufficientLiquidity {
                side: taker.side,
                requested: taker.remaining_quantity,
                available: Decimal::ZERO,
            });
        }

        if taker.time_in_force == TimeInForce::Fok {
            let limit = match taker.order_type {
                OrderType::Limit => Some(taker.limit_price),
                OrderType::Market => None,
            };
            let feasible = self.feasible_fill_quantity(taker.side, taker.user_id.as_deref(), limit);
            if feasible < taker.original_quantity {
                return Err(OrderBookError::UnfulfillableTimeInForce {
                    reason: "FOK not fully executable".to_string(),
                });
            }
        }

        let outcome = self.execute_walk(taker);

        if taker.time_in_force == TimeInForce::Ioc && taker.filled_quantity.is_zero() {
            return Err(OrderBookError::UnfulfillableTimeInForce {
                reason: "IOC executed zero quantity".to_string(),
            });
        }

        Ok(outcome)
    }

    /// Read-only walk that sums how much quantity is marketable for a
    /// taker, honoring the self-trade policy's effect on availability
    /// (same-user quantity never counts; under `CancelTaker` nothing past
    /// the first same-user encounter counts either). Used for FOK's
    /// all-or-nothing pre-check: a dry run before the mutating walk
    /// decides whether the order can fill completely at all.
    fn feasible_fill_quantity(
        &self,
        side: Side,
        taker_user: Option<&str>,
        limit: Option<Decimal>,
    ) -> Decimal {
        let opposite = self.opposite_side(side);
        let mut total = Decimal::ZERO;
        for (price, level) in opposite.iter_in_match_order() {
            if let Some(limit) = limit {
                let marketable = match side {
                    Side::Buy => price <= limit,
                    Side::Sell => price >= limit,
                };
                if !marketable {
                    break;
                }
            }
            for order_id in level.iter() {
                let Some(maker) = self.orders.get(order_id) else {
                    continue;
                };
                let same_user = taker_user.is_some() && taker_user == maker.user_id.as_deref();
                if same_user {
                    if self.self_trade_policy == SelfTradePolicy::CancelTaker {
                        return total;
                    }
                    continue;
                }
                total += maker.remaining_quantity;
            }
        }
        total
    }

    /// The mutating walk: consumes resting liquidity price level by price
    /// level, FIFO within a level, applying the configured self-trade
    /// policy, until the taker is filled, the opposite side runs out, or
    /// (for limit takers) prices stop crossing.
    fn execute_walk(&self, taker: &mut Order) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let opposite = self.opposite_side(taker.side);
        let limit = match taker.order_type {
            OrderType::Limit => Some(taker.limit_price),
            OrderType::Market => None,
        };

        let prices: Vec<Decimal> = opposite
            .iter_in_match_order()
            .map(|(price, _)| price)
            .collect();

        'levels: for price in prices {
            if taker.remaining_quantity.is_zero() {
                break;
            }
            if let Some(limit) = limit {
                let marketable = match taker.side {
                    Side::Buy => price <= limit,
                    Side::Sell => price >= limit,
                };
                if !marketable {
                    break;
                }
            }

            // Orders skipped at this level under `Skip` because they share
            // the taker's user: tracked walk-locally only, so the level's
            // FIFO order in the index is never mutated and unrelated resting
            // orders keep their price-time priority for every future taker.
            let mut same_user_excluded: HashSet<String> = HashSet::new();

            loop {
                if taker.remaining_quantity.is_zero() {
                    break 'levels;
                }
                let Some(head_id) = opposite.head_order_excluding(price, &same_user_excluded)
                else {
                    break;
                };
                let Some(mut maker) = self.orders.get_mut(&head_id) else {
                    // Registry/index desync would be an invariant
                    // violation; defensively drop the dangling entry and
                    // move on rather than looping forever.
                    opposite.apply_fill_to(price, &head_id, Decimal::ZERO, true);
                    continue;
                };

                let same_user =
                    taker.user_id.is_some() && taker.user_id == maker.user_id;
                if same_user {
                    match self.self_trade_policy {
                        SelfTradePolicy::Skip => {
                            drop(maker);
                            same_user_excluded.insert(head_id);
                            continue;
                        }
                        SelfTradePolicy::CancelTaker => {
                            outcome.taker_stopped_by_stp = true;
                            break 'levels;
                        }
                        SelfTradePolicy::CancelMaker => {
                            let qty = maker.remaining_quantity;
                            maker.mark_cancelled();
                            drop(maker);
                            opposite.apply_fill_to(price, &head_id, qty, true);
                            self.order_locations.remove(&head_id);
                            outcome.stp_cancelled_makers.push(head_id);
                            continue;
                        }
                    }
                }

                let fill_qty = taker.remaining_quantity.min(maker.remaining_quantity);
                let fill_price = price;
                maker.apply_fill(fill_qty, fill_price);
                let maker_exhausted = maker.remaining_quantity.is_zero();
                let maker_status = maker.status;
                let maker_side = maker.side;
                let maker_user = maker.user_id.clone();
                drop(maker);

                taker.apply_fill(fill_qty, fill_price);

                opposite.apply_fill_to(price, &head_id, fill_qty, maker_exhausted);
                if maker_exhausted {
                    self.order_locations.remove(&head_id);
                }

                let (buyer_order_id, seller_order_id, buyer_user_id, seller_user_id) =
                    match maker_side {
                        Side::Buy => (
                            head_id.clone(),
                            taker.order_id.clone(),
                            maker_user,
                            taker.user_id.clone(),
                        ),
                        Side::Sell => (
                            taker.order_id.clone(),
                            head_id.clone(),
                            taker.user_id.clone(),
                            maker_user,
                        ),
                    };
                let taker_exhausted = taker.remaining_quantity.is_zero();
                let match_type = match (taker_exhausted, maker_exhausted) {
                    (true, true) => MatchType::Full,
                    (true, false) => {
                        if maker_side == Side::Buy {
                            MatchType::PartialSeller
                        } else {
                            MatchType::PartialBuyer
                        }
                    }
                    (false, true) => {
                        if maker_side == Side::Buy {
                            MatchType::PartialBuyer
                        } else {
                            MatchType::PartialSeller
                        }
                    }
                    (false, false) => MatchType::PartialBoth,
                };

                outcome.fills.push(MatchEvent {
                    price: fill_price,
                    quantity: fill_qty,
                    buyer_order_id,
                    seller_order_id,
                    buyer_user_id,
                    seller_user_id,
                    maker_order_id: head_id,
                    match_type,
                });
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderIntent;
    use crate::pair::TradingPair;
    use rust_decimal_macros::dec;

    fn pair() -> TradingPair {
        TradingPair {
            symbol: "BTC-USDT".into(),
            base_asset: "BTC".into(),
            quote_asset: "USDT".into(),
            min_order_size: dec!(0.001),
            max_order_size: dec!(100),
            price_precision: 2,
            quantity_precision: 6,
            active: true,
        }
    }

    fn resting(
        book: &mut OrderBook,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        user: &str,
        id: &str,
    ) {
        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side,
            order_type: OrderType::Limit,
            limit_price: Some(price),
            quantity,
            time_in_force: TimeInForce::Gtc,
            user_id: Some(user.to_string()),
        };
        let seq = book.next_sequence();
        let mut order = Order::new(id.to_string(), &intent, seq);
        order.mark_open();
        book.orders.insert(order.order_id.clone(), order.clone());
        book.rest_order(&order);
    }

    #[test]
    fn simple_cross_fills_both_sides_completely() {
        let mut book = OrderBook::new(pair());
        resting(&mut book, Side::Sell, dec!(50500), dec!(0.1), "v", "ask1");

        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50500)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("u".into()),
        };
        let seq = book.next_sequence();
        let mut taker = Order::new("buy1".into(), &intent, seq);

        let outcome = book.match_order(&mut taker).unwrap();
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].price, dec!(50500));
        assert_eq!(outcome.fills[0].quantity, dec!(0.1));
        assert_eq!(taker.status, OrderStatus::Filled);
        assert!(book.asks.is_empty());
    }

    #[test]
    fn price_improvement_grants_maker_price_to_taker() {
        let mut book = OrderBook::new(pair());
        resting(&mut book, Side::Sell, dec!(50500), dec!(0.2), "v", "ask1");

        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(51000)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("u".into()),
        };
        let seq = book.next_sequence();
        let mut taker = Order::new("buy1".into(), &intent, seq);

        let outcome = book.match_order(&mut taker).unwrap();
        assert_eq!(outcome.fills[0].price, dec!(50500));
        assert_eq!(taker.status, OrderStatus::Filled);
        assert_eq!(book.asks.total_quantity(), dec!(0.1));
    }

    #[test]
    fn fok_rejects_without_side_effects_when_insufficient() {
        let mut book = OrderBook::new(pair());
        resting(&mut book, Side::Sell, dec!(50500), dec!(0.1), "v", "ask1");

        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50500)),
            quantity: dec!(0.2),
            time_in_force: TimeInForce::Fok,
            user_id: Some("u".into()),
        };
        let seq = book.next_sequence();
        let mut taker = Order::new("buy1".into(), &intent, seq);

        let err = book.match_order(&mut taker).unwrap_err();
        assert!(matches!(err, OrderBookError::UnfulfillableTimeInForce { .. }));
        assert_eq!(book.asks.total_quantity(), dec!(0.1));
        assert_eq!(taker.filled_quantity, Decimal::ZERO);
    }

    #[test]
    fn self_trade_skip_advances_past_own_order() {
        let mut book = OrderBook::new(pair());
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "u", "own_ask");
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "v", "other_ask");

        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50600)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("u".into()),
        };
        let seq = book.next_sequence();
        let mut taker = Order::new("buy1".into(), &intent, seq);

        let outcome = book.match_order(&mut taker).unwrap();
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].maker_order_id, "other_ask");
        assert_eq!(taker.status, OrderStatus::Filled);
    }

    #[test]
    fn self_trade_skip_preserves_priority_for_unrelated_order() {
        let mut book = OrderBook::new(pair());
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "u", "own_ask");
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "v", "first_other_ask");
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "w", "second_other_ask");

        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50600)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("u".into()),
        };
        let seq = book.next_sequence();
        let mut taker = Order::new("buy1".into(), &intent, seq);
        let outcome = book.match_order(&mut taker).unwrap();
        assert_eq!(outcome.fills[0].maker_order_id, "first_other_ask");
        assert!(book.orders.contains_key("own_ask"));

        // A second, unrelated taker must still match "first_other_ask"
        // before "second_other_ask" — the self-user skip above must not
        // have reordered the level's FIFO.
        let intent2 = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50600)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("z".into()),
        };
        let seq2 = book.next_sequence();
        let mut taker2 = Order::new("buy2".into(), &intent2, seq2);
        let outcome2 = book.match_order(&mut taker2).unwrap();
        assert_eq!(outcome2.fills[0].maker_order_id, "second_other_ask");
        assert!(book.orders.contains_key("own_ask"));
    }

    #[test]
    fn self_trade_cancel_taker_stops_walk_without_filling() {
        let mut book = OrderBook::with_policy(pair(), SelfTradePolicy::CancelTaker);
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "u", "own_ask");

        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50600)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("u".into()),
        };
        let seq = book.next_sequence();
        let mut taker = Order::new("buy1".into(), &intent, seq);
        let outcome = book.match_order(&mut taker).unwrap();
        assert!(outcome.fills.is_empty());
        assert!(outcome.taker_stopped_by_stp);
        assert_eq!(taker.filled_quantity, Decimal::ZERO);
        // The resting maker is untouched — only the taker stops.
        assert_eq!(book.asks.total_quantity(), dec!(0.1));
    }

    #[test]
    fn self_trade_cancel_maker_removes_resting_order_uncredited() {
        let mut book = OrderBook::with_policy(pair(), SelfTradePolicy::CancelMaker);
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "u", "own_ask");
        resting(&mut book, Side::Sell, dec!(50600), dec!(0.1), "v", "other_ask");

        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50600)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("u".into()),
        };
        let seq = book.next_sequence();
        let mut taker = Order::new("buy1".into(), &intent, seq);
        let outcome = book.match_order(&mut taker).unwrap();
        assert_eq!(outcome.stp_cancelled_makers, vec!["own_ask".to_string()]);
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].maker_order_id, "other_ask");
        assert_eq!(taker.status, OrderStatus::Filled);
        assert!(!book.order_locations.contains_key("own_ask"));
    }

    #[test]
    fn ioc_zero_executed_is_rejected() {
        let book = OrderBook::new(pair());
        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(50500)),
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Ioc,
            user_id: Some("u".into()),
        };
        let mut taker = Order::new("buy1".into(), &intent, 0);
        let err = book.match_order(&mut taker).unwrap_err();
        assert!(matches!(err, OrderBookError::UnfulfillableTimeInForce { .. }));
    }

    #[test]
    fn market_order_against_empty_side_is_rejected() {
        let book = OrderBook::new(pair());
        let intent = OrderIntent {
            trading_pair: book.pair.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Market,
            limit_price: None,
            quantity: dec!(0.1),
            time_in_force: TimeInForce::Ioc,
            user_id: Some("u".into()),
        };
        let mut taker = Order::new("buy1".into(), &intent, 0);
        let err = book.match_order(&mut taker).unwrap_err();
        assert!(matches!(err, OrderBookError::InsufficientLiquidity { .. }));
    }
}
