//! Market-data views derived from a book's live state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One aggregated level as shown to subscribers: no order IDs, just
/// price, total resting quantity, and how many orders make it up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_count: usize,
}

/// A point-in-time view of resting depth on both sides. Depth defaults to
/// 20 levels per side (see `crate::book::DEFAULT_SNAPSHOT_DEPTH`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub trading_pair: String,
    pub bids: Vec<SnapshotLevel>,
    pub asks: Vec<SnapshotLevel>,
    pub timestamp: u64,
}

impl OrderbookSnapshot {
    /// Sum of resting bid quantity across the levels in this snapshot.
    #[must_use]
    pub fn total_bid_quantity(&self) -> Decimal {
        self.bids.iter().map(|l| l.quantity).sum()
    }

    /// Sum of resting ask quantity across the levels in this snapshot.
    #[must_use]
    pub fn total_ask_quantity(&self) -> Decimal {
        self.asks.iter().map(|l| l.quantity).sum()
    }
}

/// Aggregate market stats derived from recent trade history and the
/// current book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStats {
    pub last_trade_price: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    /// Quote-denominated rolling volume over the trailing 24h.
    pub volume_24h: Decimal,
    /// Fractional change in `last_trade_price` over the trailing 24h
    /// (e.g. `0.05` for +5%); `None` if no trade happened 24h ago to
    /// compare against.
    pub price_change_24h: Option<Decimal>,
}
