//! The top-level entity: owns every pair's `OrderBook`, serializes
//! submissions per pair behind a writer lock, assigns sequence numbers
//! and trade IDs, and publishes events — the orchestrator spec.md §4.6
//! describes and §5 constrains to single-writer-per-pair.
//!
//! Grounded on the teacher's `orderbook::manager::BookManager` trait
//! (multi-book ownership with centralized trade-event routing),
//! generalized from routing trade events alone to routing whole intents
//! through pre-trade risk, matching, and settlement, and from the
//! teacher's lock-free multi-writer `OrderBook<T>` to the
//! single-writer-per-pair discipline this spec mandates (§5) via a
//! `tokio::sync::Mutex` per pair — the teacher already depends on
//! `tokio` with the `sync`/`rt`/`time` features for exactly this kind of
//! async-safe mutual exclusion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, error, info, instrument, warn};

use crate::book::{MarketStats, OrderBook, OrderbookSnapshot, SelfTradePolicy};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{ChannelAddress, Event, EventSink};
use crate::fees::FeeSchedule;
use crate::journal::{Journal, JournalCommand, JournalRecord, JournalResult};
use crate::ledger::Ledger;
use crate::order::{Order, OrderIntent, OrderStatus, OrderType, Side, TimeInForce};
use crate::pair::TradingPair;
use crate::risk::{RiskGate, RiskLimits};
use crate::trade::{Fill, TradeExecutor, TradeIdGenerator};
use crate::utils::{current_time_millis, generate_order_id};

/// A single pair's writer: one `OrderBook` behind one mutex. Every
/// submission or cancellation for this pair serializes through it;
/// different pairs' mutexes are acquired independently and proceed fully
/// in parallel (spec §5).
struct PairWriter {
    book: tokio::sync::Mutex<OrderBook>,
}

/// The result of [`Engine::submit`], mirroring spec.md §6's `OrderResult`
/// ingress schema.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order_id: String,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub average_price: Decimal,
    pub fills: Vec<Fill>,
    pub message: Option<String>,
    /// Non-blocking findings from `RiskGate::check` (price deviating past
    /// the warn-but-not-reject threshold, order arriving close on the
    /// heels of the last one).
    pub warnings: Vec<String>,
}

/// The result of [`Engine::cancel`], mirroring spec.md §6's cancel result
/// schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelResult {
    pub cancelled: bool,
    pub reason: Option<String>,
}

/// Number of attempts the engine makes to durably record a trade (ledger)
/// or journal record before giving up and marking the pair degraded
/// (spec §7 `TransientFailure`: "retries a small number of times within
/// the writer step").
const MAX_DURABILITY_RETRIES: u32 = 3;

/// Owns every trading pair's `OrderBook`, the shared `RiskGate`, and the
/// out-of-core collaborators (`EventSink`, `Ledger`, `Journal`).
pub struct Engine {
    pairs: DashMap<String, Arc<PairWriter>>,
    risk: Arc<RiskGate>,
    config: RwLock<EngineConfig>,
    trade_ids: TradeIdGenerator,
    event_sink: Arc<dyn EventSink>,
    ledger: Arc<dyn Ledger>,
    journal: Arc<dyn Journal>,
    /// Pairs quarantined after persistent ledger/journal failure (spec §7
    /// `TransientFailure`: "refuses new intents until recovery").
    degraded: DashMap<String, AtomicBool>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        event_sink: Arc<dyn EventSink>,
        ledger: Arc<dyn Ledger>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        Self {
            pairs: DashMap::new(),
            risk: Arc::new(RiskGate::new()),
            config: RwLock::new(config),
            trade_ids: TradeIdGenerator::new(),
            event_sink,
            ledger,
            journal,
            degraded: DashMap::new(),
        }
    }

    #[must_use]
    pub fn risk_gate(&self) -> &RiskGate {
        &self.risk
    }

    /// Admin operation: registers a new trading pair with a fresh, empty
    /// book and seeds its risk limits from the engine's configured
    /// defaults.
    pub fn add_pair(&self, pair: TradingPair) {
        let symbol = pair.symbol.clone();
        let policy = self.config.read().expect("config lock poisoned").self_trade_policy;
        let default_limits = self.config.read().expect("config lock poisoned").default_risk_limits;
        self.risk.set_limits(&symbol, default_limits);
        self.pairs.insert(
            symbol.clone(),
            Arc::new(PairWriter {
                book: tokio::sync::Mutex::new(OrderBook::with_policy(pair, policy)),
            }),
        );
        self.degraded.insert(symbol.clone(), AtomicBool::new(false));
        info!(pair = %symbol, "pair registered");
    }

    /// Runtime tuning entry point (spec §6 "risk.<pair> ...
    /// runtime-tunable via admin").
    pub fn set_risk_limits(&self, pair: &str, limits: RiskLimits) {
        self.risk.set_limits(pair, limits);
    }

    /// Runtime tuning entry point for `fee_rate`/`fee_vip_discount`
    /// (spec §6 "runtime-tunable via admin").
    pub fn set_fee_schedule(&self, fees: FeeSchedule) {
        self.config.write().expect("config lock poisoned").fees = fees;
    }

    pub fn set_vip(&self, user_id: &str, vip: bool) {
        self.risk.set_vip(user_id, vip);
    }

    fn writer_for(&self, pair: &str) -> Result<Arc<PairWriter>, EngineError> {
        self.pairs
            .get(pair)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::NotFound { what: format!("trading pair {pair}") })
    }

    fn check_not_degraded(&self, pair: &str) -> Result<(), EngineError> {
        let is_degraded = self
            .degraded
            .get(pair)
            .map(|d| d.load(Ordering::Acquire))
            .unwrap_or(false);
        if is_degraded {
            return Err(EngineError::PairUnavailable {
                symbol: pair.to_string(),
                reason: "pair is degraded after a persistent durability failure".to_string(),
            });
        }
        Ok(())
    }

    fn mark_degraded(&self, pair: &str) {
        if let Some(flag) = self.degraded.get(pair) {
            flag.store(true, Ordering::Release);
        }
        error!(pair, "pair quarantined after persistent durability failure");
    }

    /// Best-effort notional and, for limit orders, the per-unit price the
    /// `RiskGate` price-deviation check compares against the reference
    /// mark. Market sells are estimated off the reference mark (or best
    /// bid, absent one); market buys off the book's ask depth with the
    /// pair's configured slippage buffer (spec §4.4 item 5). `None`
    /// effective price means the deviation check is skipped, matching
    /// spec.md's "for market orders, skip the deviation check".
    fn estimate_notional(
        &self,
        book: &OrderBook,
        intent: &OrderIntent,
    ) -> (Decimal, Option<Decimal>) {
        match intent.order_type {
            OrderType::Limit => {
                let price = intent.limit_price.unwrap_or(Decimal::ZERO);
                (intent.quantity * price, Some(price))
            }
            OrderType::Market => match intent.side {
                Side::Buy => {
                    let slippage = self.risk.limits_for(&intent.trading_pair).market_buy_slippage_bps;
                    let notional = book
                        .estimate_market_buy_notional(intent.quantity, slippage)
                        .unwrap_or_else(|| {
                            let price = book.best_ask().unwrap_or(Decimal::ZERO);
                            intent.quantity * price
                        });
                    (notional, None)
                }
                Side::Sell => {
                    let mark = book.reference_mark().or_else(|| book.best_bid()).unwrap_or(Decimal::ZERO);
                    (intent.quantity * mark, None)
                }
            },
        }
    }

    fn publish_order_update(&self, order: &Order) {
        if let Some(user_id) = &order.user_id {
            self.event_sink.publish(
                ChannelAddress::OrderUpdate { user_id: user_id.clone() },
                Event::OrderUpdate(order.clone()),
            );
        }
        self.event_sink
            .publish(ChannelAddress::OrdersAll, Event::OrderUpdate(order.clone()));
    }

    fn publish_trade(&self, fill: &Fill) {
        self.event_sink.publish(
            ChannelAddress::Trade { pair: fill.trading_pair.clone() },
            Event::Trade(fill.clone()),
        );
        self.event_sink
            .publish(ChannelAddress::TradesAll, Event::Trade(fill.clone()));
    }

    fn publish_snapshot(&self, book: &OrderBook) {
        let depth = self.config.read().expect("config lock poisoned").event_snapshot_depth;
        let snapshot = book.snapshot(depth);
        self.event_sink.publish(
            ChannelAddress::Orderbook { pair: book.pair.symbol.clone() },
            Event::Orderbook(snapshot),
        );
    }

    /// Durably records `fill`, retrying up to `MAX_DURABILITY_RETRIES`
    /// times before quarantining the pair (spec §7 `TransientFailure`).
    fn store_trade_durably(&self, fill: &Fill) -> Result<(), EngineError> {
        let mut last_error = None;
        for attempt in 1..=MAX_DURABILITY_RETRIES {
            match self.ledger.store_trade(fill) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, trade_id = %fill.trade_id, error = %e, "ledger write failed, retrying");
                    last_error = Some(e);
                }
            }
        }
        self.mark_degraded(&fill.trading_pair);
        Err(EngineError::Transient {
            source: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn append_journal(&self, record: JournalRecord) {
        for attempt in 1..=MAX_DURABILITY_RETRIES {
            match self.journal.append(record.clone()) {
                Ok(()) => return,
                Err(e) => warn!(attempt, error = %e, "journal append failed, retrying"),
            }
        }
        error!("journal persistently unavailable; proceeding without durable record");
    }

    /// Entry point for a validated intent (spec.md §4.2 `OrderBook::submit`,
    /// realized at the `Engine` level since it spans risk, matching, and
    /// settlement). Blocks on the pair's writer lock (spec §5).
    #[instrument(skip(self, intent), fields(pair = %intent.trading_pair, side = ?intent.side))]
    pub async fn submit(&self, intent: OrderIntent) -> Result<OrderResult, EngineError> {
        self.check_not_degraded(&intent.trading_pair)?;
        let writer = self.writer_for(&intent.trading_pair)?;
        let mut book = writer.book.lock().await;

        book.validate_intent(intent.order_type, intent.limit_price, intent.quantity)?;

        let (notional, effective_price) = self.estimate_notional(&book, &intent);
        let reference_mark = book.reference_mark();
        let now = current_time_millis();
        let risk_outcome = self
            .risk
            .check(&intent, notional, effective_price, reference_mark, now)?;

        // Sequence number assigned only after validation and risk checks
        // pass (spec §4.6): a RiskRejection never consumes one.
        let sequence_number = book.next_sequence();
        let order_id = generate_order_id();
        let mut order = Order::new(order_id.clone(), &intent, sequence_number);

        let lock_unit_price = effective_price.unwrap_or_else(|| {
            if intent.quantity.is_zero() {
                Decimal::ZERO
            } else {
                notional / intent.quantity
            }
        });
        self.risk.lock_for_order(&order, lock_unit_price)?;

        match book.match_order(&mut order) {
            Err(match_error) => {
                self.risk.release_remaining(&order);
                order.mark_rejected();
                debug!(order_id = %order.order_id, reason = %match_error, "order rejected during matching");
                self.append_journal(JournalRecord {
                    sequence_num: sequence_number,
                    timestamp_ms: now,
                    command: JournalCommand::Submit { trading_pair: intent.trading_pair.clone(), intent },
                    result: JournalResult::Rejected { reason: match_error.to_string() },
                });
                Err(EngineError::from(match_error))
            }
            Ok(match_outcome) => {
                let book_changed = !match_outcome.fills.is_empty()
                    || !match_outcome.stp_cancelled_makers.is_empty();

                if order.status == OrderStatus::Pending {
                    // No fills touched this order at all (GTC that never
                    // crossed); matching.rs's apply_fill only runs on a
                    // match, so an all-miss walk leaves it Pending.
                    order.mark_open();
                }

                if match_outcome.taker_stopped_by_stp {
                    order.mark_cancelled();
                }

                let rests = !match_outcome.taker_stopped_by_stp
                    && order.time_in_force == TimeInForce::Gtc
                    && !order.remaining_quantity.is_zero();
                if rests {
                    book.rest_order(&order);
                } else {
                    // Releases whatever remains locked: the full amount
                    // for a zero-fill path that somehow reached here, the
                    // unexecuted remainder for an IOC/FOK partial fill
                    // (discarded, never rests), or nothing at all (a
                    // no-op release) once `settle_order_fill` has already
                    // brought the lock to zero for a full fill.
                    self.risk.release_remaining(&order);
                }
                book.orders.insert(order.order_id.clone(), order.clone());

                let fee_schedule = self.config.read().expect("config lock poisoned").fees;
                let executor = TradeExecutor::new(fee_schedule);
                let mut fills = Vec::with_capacity(match_outcome.fills.len());
                for match_event in &match_outcome.fills {
                    let buyer_vip = match_event
                        .buyer_user_id
                        .as_deref()
                        .map(|u| self.risk.is_vip(u))
                        .unwrap_or(false);
                    let seller_vip = match_event
                        .seller_user_id
                        .as_deref()
                        .map(|u| self.risk.is_vip(u))
                        .unwrap_or(false);
                    let fill = executor.execute(
                        &book,
                        &self.risk,
                        &self.trade_ids,
                        match_event,
                        buyer_vip,
                        seller_vip,
                        now,
                    )?;
                    book.record_trade(fill.price, fill.quantity, fill.timestamp);
                    self.store_trade_durably(&fill)?;
                    self.publish_trade(&fill);

                    if let Some(maker) = book.get_order(&match_event.maker_order_id) {
                        self.publish_order_update(&maker);
                        if maker.status.is_terminal() {
                            book.orders.remove(&match_event.maker_order_id);
                        }
                    }
                    fills.push(fill);
                }

                for maker_id in &match_outcome.stp_cancelled_makers {
                    if let Some(maker) = book.get_order(maker_id) {
                        self.risk.release_remaining(&maker);
                        self.publish_order_update(&maker);
                        book.orders.remove(maker_id);
                    }
                }

                if book_changed {
                    self.publish_snapshot(&book);
                }

                self.publish_order_update(&order);
                if order.status.is_terminal() {
                    book.orders.remove(&order.order_id);
                }

                self.append_journal(JournalRecord {
                    sequence_num: sequence_number,
                    timestamp_ms: now,
                    command: JournalCommand::Submit { trading_pair: intent.trading_pair.clone(), intent },
                    result: JournalResult::Accepted {
                        order_id: order.order_id.clone(),
                        status: order.status,
                        fills: fills.clone(),
                    },
                });

                Ok(OrderResult {
                    order_id,
                    status: order.status,
                    executed_quantity: order.filled_quantity,
                    remaining_quantity: order.remaining_quantity,
                    average_price: order.average_fill_price,
                    fills,
                    message: None,
                    warnings: risk_outcome.warnings,
                })
            }
        }
    }

    /// A first-class writer step (spec §5): races with in-flight fills
    /// for the same order by being serialized behind them on the pair's
    /// writer lock.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: &str, trading_pair: &str) -> Result<CancelResult, EngineError> {
        let writer = self.writer_for(trading_pair)?;
        let mut book = writer.book.lock().await;
        match book.cancel(order_id) {
            Some(order) => {
                self.risk.release_remaining(&order);
                self.publish_order_update(&order);
                book.orders.remove(order_id);
                self.publish_snapshot(&book);
                self.append_journal(JournalRecord {
                    sequence_num: order.sequence_number,
                    timestamp_ms: current_time_millis(),
                    command: JournalCommand::Cancel {
                        trading_pair: trading_pair.to_string(),
                        order_id: order_id.to_string(),
                    },
                    result: JournalResult::Cancelled { order_id: order_id.to_string() },
                });
                Ok(CancelResult { cancelled: true, reason: None })
            }
            None => Ok(CancelResult {
                cancelled: false,
                reason: Some("order not found or already terminal".to_string()),
            }),
        }
    }

    pub async fn snapshot(&self, trading_pair: &str, depth: usize) -> Result<OrderbookSnapshot, EngineError> {
        let writer = self.writer_for(trading_pair)?;
        let book = writer.book.lock().await;
        Ok(book.snapshot(depth))
    }

    pub async fn market_stats(&self, trading_pair: &str) -> Result<MarketStats, EngineError> {
        let writer = self.writer_for(trading_pair)?;
        let book = writer.book.lock().await;
        Ok(book.market_stats())
    }

    #[must_use]
    pub fn pair_symbols(&self) -> Vec<String> {
        self.pairs.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn self_trade_policy(&self) -> SelfTradePolicy {
        self.config.read().expect("config lock poisoned").self_trade_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventSink;
    use crate::ledger::InMemoryLedger;
    use crate::journal::InMemoryJournal;
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        Engine::new(
            EngineConfig::default(),
            Arc::new(InMemoryEventSink::default()),
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryJournal::new()),
        )
    }

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

    fn intent(side: Side, order_type: OrderType, price: Option<Decimal>, qty: Decimal, tif: TimeInForce, user: &str) -> OrderIntent {
        OrderIntent {
            trading_pair: "BTC-USDT".into(),
            side,
            order_type,
            limit_price: price,
            quantity: qty,
            time_in_force: tif,
            user_id: Some(user.to_string()),
        }
    }

    #[tokio::test]
    async fn simple_cross_fills_both_sides() {
        let engine = engine();
        engine.add_pair(pair());
        engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
        engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(10000));

        let ask = engine
            .submit(intent(Side::Sell, OrderType::Limit, Some(dec!(50500)), dec!(0.1), TimeInForce::Gtc, "seller"))
            .await
            .unwrap();
        assert_eq!(ask.status, OrderStatus::Open);

        let buy = engine
            .submit(intent(Side::Buy, OrderType::Limit, Some(dec!(50500)), dec!(0.1), TimeInForce::Gtc, "buyer"))
            .await
            .unwrap();
        assert_eq!(buy.status, OrderStatus::Filled);
        assert_eq!(buy.fills.len(), 1);
        assert_eq!(buy.fills[0].price, dec!(50500));

        let snapshot = engine.snapshot("BTC-USDT", 20).await.unwrap();
        assert!(snapshot.asks.is_empty());
    }

    #[tokio::test]
    async fn fok_rejects_without_side_effects() {
        let engine = engine();
        engine.add_pair(pair());
        engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
        engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(10000));

        engine
            .submit(intent(Side::Sell, OrderType::Limit, Some(dec!(50500)), dec!(0.1), TimeInForce::Gtc, "seller"))
            .await
            .unwrap();

        let err = engine
            .submit(intent(Side::Buy, OrderType::Limit, Some(dec!(50500)), dec!(0.2), TimeInForce::Fok, "buyer"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnfulfillableTimeInForce { .. }));

        let pos = engine.risk_gate().position_for("buyer", "BTC-USDT");
        assert_eq!(pos.locked_quote, Decimal::ZERO);
        assert_eq!(pos.quote_balance, dec!(10000));
    }

    #[tokio::test]
    async fn self_trade_cancel_taker_does_not_rest() {
        let engine = Engine::new(
            EngineConfig {
                self_trade_policy: SelfTradePolicy::CancelTaker,
                ..EngineConfig::default()
            },
            Arc::new(InMemoryEventSink::default()),
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryJournal::new()),
        );
        engine.add_pair(pair());
        engine.risk_gate().seed_balance("trader", "BTC-USDT", dec!(1), dec!(10000));

        let ask = engine
            .submit(intent(Side::Sell, OrderType::Limit, Some(dec!(50500)), dec!(0.1), TimeInForce::Gtc, "trader"))
            .await
            .unwrap();
        assert_eq!(ask.status, OrderStatus::Open);

        let buy = engine
            .submit(intent(Side::Buy, OrderType::Limit, Some(dec!(50500)), dec!(0.1), TimeInForce::Gtc, "trader"))
            .await
            .unwrap();
        assert_eq!(buy.status, OrderStatus::Cancelled);
        assert_eq!(buy.fills.len(), 0);

        let snapshot = engine.snapshot("BTC-USDT", 20).await.unwrap();
        assert_eq!(snapshot.bids.len(), 0);
        assert_eq!(snapshot.asks.len(), 1);

        let pos = engine.risk_gate().position_for("trader", "BTC-USDT");
        assert_eq!(pos.locked_quote, Decimal::ZERO);
    }

    #[tokio::test]
    async fn cancel_releases_locked_funds_exactly() {
        let engine = engine();
        engine.add_pair(pair());
        engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(10000));

        let result = engine
            .submit(intent(Side::Buy, OrderType::Limit, Some(dec!(50000)), dec!(0.1), TimeInForce::Gtc, "buyer"))
            .await
            .unwrap();
        assert_eq!(result.status, OrderStatus::Open);

        let cancel = engine.cancel(&result.order_id, "BTC-USDT").await.unwrap();
        assert!(cancel.cancelled);

        let pos = engine.risk_gate().position_for("buyer", "BTC-USDT");
        assert_eq!(pos.locked_quote, Decimal::ZERO);
        assert_eq!(pos.quote_balance, dec!(10000));
    }

    #[tokio::test]
    async fn unknown_pair_is_not_found() {
        let engine = engine();
        let err = engine
            .submit(intent(Side::Buy, OrderType::Limit, Some(dec!(1)), dec!(1), TimeInForce::Gtc, "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
