//! End-to-end engine scenarios (spec §8) plus the cross-cutting invariants
//! that hold across any sequence of admitted intents: conservation of
//! value, FOK atomicity, and no self-trade.
//!
//! Exercised entirely through `Engine`'s public API — the same surface an
//! embedding binary would use — rather than reaching into book/risk
//! internals, since these are acceptance tests for the orchestrator, not
//! unit tests for a component.

use std::sync::Arc;

use clob_engine::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn pair(symbol: &str) -> TradingPair {
    TradingPair {
        symbol: symbol.to_string(),
        base_asset: "BTC".into(),
        quote_asset: "USDT".into(),
        min_order_size: dec!(0.0001),
        max_order_size: dec!(1000),
        price_precision: 2,
        quantity_precision: 6,
        active: true,
    }
}

/// Risk limits permissive enough that the scenarios below exercise only
/// matching/settlement behavior, not incidental rate-limit or deviation
/// rejections from submitting several orders back to back within the same
/// test process.
fn permissive_limits() -> RiskLimits {
    RiskLimits {
        max_order_size: Decimal::new(1_000_000_000, 0),
        max_daily_volume: Decimal::new(1_000_000_000, 0),
        max_open_orders: 1000,
        max_position_size: Decimal::new(1_000_000_000, 0),
        min_price_deviation: Decimal::new(50, 2),
        max_price_deviation: Decimal::new(100, 2),
        min_order_interval_ms: 0,
        warn_order_interval_ms: 0,
        market_buy_slippage_bps: 0,
    }
}

fn engine_with_pair(symbol: &str) -> Engine {
    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(InMemoryEventSink::default()),
        Arc::new(InMemoryLedger::new()),
        Arc::new(InMemoryJournal::new()),
    );
    engine.add_pair(pair(symbol));
    engine.set_risk_limits(symbol, permissive_limits());
    engine
}

fn limit_intent(
    symbol: &str,
    side: Side,
    price: Decimal,
    quantity: Decimal,
    tif: TimeInForce,
    user: &str,
) -> OrderIntent {
    OrderIntent {
        trading_pair: symbol.to_string(),
        side,
        order_type: OrderType::Limit,
        limit_price: Some(price),
        quantity,
        time_in_force: tif,
        user_id: Some(user.to_string()),
    }
}

fn market_intent(symbol: &str, side: Side, quantity: Decimal, user: &str) -> OrderIntent {
    OrderIntent {
        trading_pair: symbol.to_string(),
        side,
        order_type: OrderType::Market,
        limit_price: None,
        quantity,
        time_in_force: TimeInForce::Ioc,
        user_id: Some(user.to_string()),
    }
}

#[tokio::test]
async fn scenario_1_simple_cross() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    let ask = engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.1), TimeInForce::Gtc, "seller"))
        .await
        .unwrap();
    assert_eq!(ask.status, OrderStatus::Open);

    let buy = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50500), dec!(0.1), TimeInForce::Gtc, "buyer"))
        .await
        .unwrap();

    assert_eq!(buy.fills.len(), 1);
    assert_eq!(buy.fills[0].quantity, dec!(0.1));
    assert_eq!(buy.fills[0].price, dec!(50500));
    assert_eq!(buy.status, OrderStatus::Filled);

    let snapshot = engine.snapshot("BTC-USDT", 20).await.unwrap();
    assert!(snapshot.asks.is_empty());
    assert!(snapshot.bids.is_empty());
}

#[tokio::test]
async fn scenario_2_price_improvement() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.2), TimeInForce::Gtc, "seller"))
        .await
        .unwrap();

    let buy = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(51000), dec!(0.1), TimeInForce::Gtc, "buyer"))
        .await
        .unwrap();

    assert_eq!(buy.fills.len(), 1);
    assert_eq!(buy.fills[0].quantity, dec!(0.1));
    assert_eq!(buy.fills[0].price, dec!(50500), "taker pays the maker's resting price, not its own limit");
    assert_eq!(buy.status, OrderStatus::Filled);

    let snapshot = engine.snapshot("BTC-USDT", 20).await.unwrap();
    assert_eq!(snapshot.asks.len(), 1);
    assert_eq!(snapshot.asks[0].price, dec!(50500));
    assert_eq!(snapshot.asks[0].quantity, dec!(0.1));
}

#[tokio::test]
async fn scenario_3_ioc_partial() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("seller1", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("seller2", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.1), TimeInForce::Gtc, "seller1"))
        .await
        .unwrap();
    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50600), dec!(0.1), TimeInForce::Gtc, "seller2"))
        .await
        .unwrap();

    let buy = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50600), dec!(0.25), TimeInForce::Ioc, "buyer"))
        .await
        .unwrap();

    assert_eq!(buy.fills.len(), 2);
    assert_eq!(buy.fills[0].price, dec!(50500));
    assert_eq!(buy.fills[0].quantity, dec!(0.1));
    assert_eq!(buy.fills[1].price, dec!(50600));
    assert_eq!(buy.fills[1].quantity, dec!(0.1));
    assert_eq!(buy.status, OrderStatus::PartiallyFilled);
    assert_eq!(buy.executed_quantity, dec!(0.2));
    assert_eq!(buy.remaining_quantity, dec!(0.05));

    let snapshot = engine.snapshot("BTC-USDT", 20).await.unwrap();
    assert!(snapshot.asks.is_empty(), "both ask levels fully consumed");
    assert!(snapshot.bids.is_empty(), "IOC remainder is discarded, never rests");
}

#[tokio::test]
async fn scenario_4_fok_fail() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.1), TimeInForce::Gtc, "seller"))
        .await
        .unwrap();

    let err = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50500), dec!(0.2), TimeInForce::Fok, "buyer"))
        .await
        .unwrap_err();

    match err {
        EngineError::UnfulfillableTimeInForce { reason } => {
            assert_eq!(reason, "FOK not fully executable");
        }
        other => panic!("expected UnfulfillableTimeInForce, got {other:?}"),
    }

    let snapshot = engine.snapshot("BTC-USDT", 20).await.unwrap();
    assert_eq!(snapshot.asks.len(), 1);
    assert_eq!(snapshot.asks[0].quantity, dec!(0.1));

    let buyer_pos = engine.risk_gate().position_for("buyer", "BTC-USDT");
    assert_eq!(buyer_pos.locked_quote, Decimal::ZERO);
    assert_eq!(buyer_pos.quote_balance, dec!(1_000_000));
}

#[tokio::test]
async fn scenario_5_self_trade_skip() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("u", "BTC-USDT", dec!(1), dec!(1_000_000));
    engine.risk_gate().seed_balance("v", "BTC-USDT", dec!(1), dec!(0));

    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.1), TimeInForce::Gtc, "u"))
        .await
        .unwrap();
    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50600), dec!(0.1), TimeInForce::Gtc, "v"))
        .await
        .unwrap();

    let buy = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50600), dec!(0.15), TimeInForce::Gtc, "u"))
        .await
        .unwrap();

    assert_eq!(buy.fills.len(), 1, "u's own resting ask must be skipped, not matched");
    assert_eq!(buy.fills[0].price, dec!(50600));
    assert_eq!(buy.fills[0].quantity, dec!(0.1));
    assert_eq!(buy.fills[0].seller_user_id.as_deref(), Some("v"));
    assert_eq!(buy.status, OrderStatus::PartiallyFilled);
    assert_eq!(buy.remaining_quantity, dec!(0.05));

    let snapshot = engine.snapshot("BTC-USDT", 20).await.unwrap();
    assert_eq!(snapshot.bids.len(), 1, "remainder rests at 50600 since this is GTC");
    assert_eq!(snapshot.bids[0].price, dec!(50600));
    assert_eq!(snapshot.bids[0].quantity, dec!(0.05));
    assert_eq!(snapshot.asks.len(), 1, "u's untouched ask at 50500 still rests");
    assert_eq!(snapshot.asks[0].price, dec!(50500));
}

#[tokio::test]
async fn scenario_6_cancel_race_market_wins() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    let ask = engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.5), TimeInForce::Gtc, "seller"))
        .await
        .unwrap();

    // market arrives first in the writer queue: it fills fully, so the
    // subsequent cancel finds nothing left to cancel.
    let market = engine
        .submit(market_intent("BTC-USDT", Side::Buy, dec!(0.5), "buyer"))
        .await
        .unwrap();
    assert_eq!(market.status, OrderStatus::Filled);

    let cancel = engine.cancel(&ask.order_id, "BTC-USDT").await.unwrap();
    assert!(!cancel.cancelled);
}

#[tokio::test]
async fn scenario_6_cancel_race_cancel_wins() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    let ask = engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.5), TimeInForce::Gtc, "seller"))
        .await
        .unwrap();

    // cancel arrives first in the writer queue: the ask is gone before the
    // market order's writer step runs, so it rejects for lack of liquidity.
    let cancel = engine.cancel(&ask.order_id, "BTC-USDT").await.unwrap();
    assert!(cancel.cancelled);

    let err = engine
        .submit(market_intent("BTC-USDT", Side::Buy, dec!(0.5), "buyer"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)), "expected a no-liquidity validation error, got {err:?}");
}

/// Conservation of value (spec §8): a user's total holdings (free + locked)
/// change only by the net of what they bought/sold and the fees they paid,
/// across an arbitrary sequence of fills.
#[tokio::test]
async fn invariant_conservation_of_value_across_partial_fills() {
    let engine = engine_with_pair("BTC-USDT");
    engine.set_fee_schedule(FeeSchedule::new(dec!(0.001), Decimal::ZERO));
    engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50000), dec!(0.3), TimeInForce::Gtc, "seller"))
        .await
        .unwrap();
    let buy = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50000), dec!(0.3), TimeInForce::Gtc, "buyer"))
        .await
        .unwrap();

    let fill = &buy.fills[0];
    let buyer_pos = engine.risk_gate().position_for("buyer", "BTC-USDT");
    let seller_pos = engine.risk_gate().position_for("seller", "BTC-USDT");

    assert_eq!(buyer_pos.base_balance + buyer_pos.locked_base, fill.quantity);
    assert_eq!(
        buyer_pos.quote_balance + buyer_pos.locked_quote,
        dec!(1_000_000) - (fill.quantity * fill.price + fill.buyer_fee)
    );
    assert_eq!(seller_pos.base_balance + seller_pos.locked_base, dec!(1) - fill.quantity);
    assert_eq!(
        seller_pos.quote_balance + seller_pos.locked_quote,
        fill.quantity * fill.price - fill.seller_fee
    );
}

/// FOK atomicity (spec §8): a FOK order executes exactly 0 or exactly its
/// full quantity, never an intermediate amount.
#[tokio::test]
async fn invariant_fok_atomicity() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("seller", "BTC-USDT", dec!(1), dec!(0));
    engine.risk_gate().seed_balance("buyer", "BTC-USDT", dec!(0), dec!(1_000_000));

    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50500), dec!(0.1), TimeInForce::Gtc, "seller"))
        .await
        .unwrap();

    // short of fillable: must execute zero, not a partial amount.
    let short = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50500), dec!(0.2), TimeInForce::Fok, "buyer"))
        .await;
    assert!(short.is_err());

    let unaffected = engine.snapshot("BTC-USDT", 20).await.unwrap();
    assert_eq!(unaffected.asks[0].quantity, dec!(0.1), "a failed FOK must leave the book untouched");

    // exactly fillable: must execute the full quantity.
    let full = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50500), dec!(0.1), TimeInForce::Fok, "buyer"))
        .await
        .unwrap();
    assert_eq!(full.status, OrderStatus::Filled);
    assert_eq!(full.executed_quantity, dec!(0.1));
}

/// No self-trade (spec §8): across any sequence of fills, no `Fill` has
/// buyer_user_id == seller_user_id, even when a user's own resting order
/// is the best-priced one available.
#[tokio::test]
async fn invariant_no_self_trade() {
    let engine = engine_with_pair("BTC-USDT");
    engine.risk_gate().seed_balance("u", "BTC-USDT", dec!(1), dec!(1_000_000));
    engine.risk_gate().seed_balance("v", "BTC-USDT", dec!(1), dec!(0));

    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50000), dec!(0.1), TimeInForce::Gtc, "u"))
        .await
        .unwrap();
    engine
        .submit(limit_intent("BTC-USDT", Side::Sell, dec!(50100), dec!(0.1), TimeInForce::Gtc, "v"))
        .await
        .unwrap();

    let buy = engine
        .submit(limit_intent("BTC-USDT", Side::Buy, dec!(50100), dec!(0.2), TimeInForce::Gtc, "u"))
        .await
        .unwrap();

    for fill in &buy.fills {
        assert_ne!(fill.buyer_user_id, fill.seller_user_id);
    }
}
