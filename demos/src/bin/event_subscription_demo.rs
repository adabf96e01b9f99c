//! Demonstrates subscriber-pull event consumption: an `InMemoryEventSink`
//! is drained after each order to show the trade tape and per-user order
//! updates the engine fans out, instead of the callback style the
//! subscriber would otherwise have to register up front.

use std::sync::Arc;

use clob_engine::prelude::*;
use rust_decimal_macros::dec;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    info!("=== Event Subscription Demo ===");

    let sink = Arc::new(InMemoryEventSink::new(100));
    let engine = Engine::new(
        EngineConfig::default(),
        sink.clone(),
        Arc::new(InMemoryLedger::new()),
        Arc::new(InMemoryJournal::new()),
    );

    engine.add_pair(TradingPair {
        symbol: "ETH-USDT".into(),
        base_asset: "ETH".into(),
        quote_asset: "USDT".into(),
        min_order_size: dec!(0.001),
        max_order_size: dec!(1000),
        price_precision: 2,
        quantity_precision: 6,
        active: true,
    });

    engine.risk_gate().seed_balance("seller", "ETH-USDT", dec!(5), dec!(0));
    engine.risk_gate().seed_balance("buyer", "ETH-USDT", dec!(0), dec!(50_000));

    engine
        .submit(OrderIntent {
            trading_pair: "ETH-USDT".into(),
            side: Side::Sell,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(3000)),
            quantity: dec!(1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("seller".into()),
        })
        .await
        .unwrap();

    engine
        .submit(OrderIntent {
            trading_pair: "ETH-USDT".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(3000)),
            quantity: dec!(1),
            time_in_force: TimeInForce::Gtc,
            user_id: Some("buyer".into()),
        })
        .await
        .unwrap();

    info!("Draining trades.all");
    for event in sink.history(&ChannelAddress::TradesAll) {
        if let Event::Trade(fill) = event {
            info!(trade_id = %fill.trade_id, price = %fill.price, quantity = %fill.quantity, "trade");
        }
    }

    info!("Draining order-update.seller");
    for event in sink.history(&ChannelAddress::OrderUpdate { user_id: "seller".into() }) {
        if let Event::OrderUpdate(order) = event {
            info!(order_id = %order.order_id, status = ?order.status, "seller order update");
        }
    }

    info!("Draining orderbook.ETH-USDT");
    for event in sink.history(&ChannelAddress::Orderbook { pair: "ETH-USDT".into() }) {
        if let Event::Orderbook(snapshot) = event {
            info!(bids = snapshot.bids.len(), asks = snapshot.asks.len(), "orderbook snapshot published");
        }
    }

    info!(total = sink.total_published(), "=== Demo Complete ===");
}
