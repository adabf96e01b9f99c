//! Demonstrates limit and market order execution against a live book.
//!
//! 1. Seed a BTC-USDT book with bid and ask liquidity.
//! 2. Cross it with limit orders and a market order.
//! 3. Print the resulting fills and the book's post-trade state.

use std::sync::Arc;

use clob_engine::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    info!("=== Market Trades Demo ===");

    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(InMemoryEventSink::default()),
        Arc::new(InMemoryLedger::new()),
        Arc::new(InMemoryJournal::new()),
    );

    engine.add_pair(TradingPair {
        symbol: "BTC-USDT".into(),
        base_asset: "BTC".into(),
        quote_asset: "USDT".into(),
        min_order_size: dec!(0.0001),
        max_order_size: dec!(100),
        price_precision: 2,
        quantity_precision: 6,
        active: true,
    });

    engine.risk_gate().seed_balance("maker", "BTC-USDT", dec!(10), dec!(0));
    engine.risk_gate().seed_balance("taker", "BTC-USDT", dec!(0), dec!(1_000_000));

    info!("Step 1: seeding ask-side liquidity");
    for (price, qty) in [(dec!(50100), dec!(0.5)), (dec!(50150), dec!(0.8)), (dec!(50200), dec!(1.2))] {
        let result = submit_limit(&engine, Side::Sell, price, qty, "maker").await;
        info!(order_id = %result.order_id, price = %price, qty = %qty, status = ?result.status, "ask resting");
    }

    let stats = engine.market_stats("BTC-USDT").await.unwrap();
    info!(best_ask = ?stats.best_ask, best_bid = ?stats.best_bid, "book state before trading");

    info!("Step 2: a limit order that partially crosses two price levels");
    let crossing = submit_limit(&engine, Side::Buy, dec!(50150), dec!(1.0), "taker").await;
    info!(status = ?crossing.status, fills = crossing.fills.len(), avg_price = %crossing.average_price, "crossing buy result");
    for fill in &crossing.fills {
        info!(trade_id = %fill.trade_id, price = %fill.price, quantity = %fill.quantity, "fill");
    }

    info!("Step 3: a market buy sweeping the remaining depth");
    let market = engine
        .submit(OrderIntent {
            trading_pair: "BTC-USDT".into(),
            side: Side::Buy,
            order_type: OrderType::Market,
            limit_price: None,
            quantity: dec!(0.5),
            time_in_force: TimeInForce::Ioc,
            user_id: Some("taker".into()),
        })
        .await
        .unwrap();
    info!(status = ?market.status, executed = %market.executed_quantity, avg_price = %market.average_price, "market order result");

    let snapshot = engine.snapshot("BTC-USDT", 10).await.unwrap();
    info!(bids = snapshot.bids.len(), asks = snapshot.asks.len(), "final book depth");
    info!("=== Demo Complete ===");
}

async fn submit_limit(engine: &Engine, side: Side, price: Decimal, quantity: Decimal, user: &str) -> OrderResult {
    engine
        .submit(OrderIntent {
            trading_pair: "BTC-USDT".into(),
            side,
            order_type: OrderType::Limit,
            limit_price: Some(price),
            quantity,
            time_in_force: TimeInForce::Gtc,
            user_id: Some(user.to_string()),
        })
        .await
        .unwrap()
}
