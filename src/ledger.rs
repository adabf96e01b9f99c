//! The durable trade store, write-only from the core (spec §6). The core
//! ships an in-memory reference implementation for tests and embedding
//! binaries without a real store yet; a production deployment swaps in
//! one backed by whatever durable store it has.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::book::OrderbookSnapshot;
use crate::trade::Fill;

/// Errors a `Ledger` implementation may surface. A persistent failure
/// here is a `TransientFailure` in the engine's error taxonomy (spec §7):
/// the engine retries a bounded number of times within the writer step,
/// then marks the pair degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerError(pub String);

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ledger error: {}", self.0)
    }
}

impl std::error::Error for LedgerError {}

/// Write-only durable store for trades (and, optionally, point-in-time
/// snapshots). Implementations must be idempotent on `trade_id`: the
/// engine's at-least-once delivery guarantee means `store_trade` may be
/// called more than once for the same fill after a retry.
pub trait Ledger: Send + Sync {
    /// Durably records a fill. Idempotent on `trade_id`.
    ///
    /// # Errors
    /// Returns `LedgerError` if the write could not be durably committed.
    fn store_trade(&self, fill: &Fill) -> Result<(), LedgerError>;

    /// Optionally caches a point-in-time snapshot with a TTL (milliseconds).
    /// Default implementation is a no-op: snapshots are reconstructible
    /// from live book state, so persisting them is an optimization, not a
    /// correctness requirement.
    ///
    /// # Errors
    /// Returns `LedgerError` if the write could not be durably committed.
    fn store_snapshot(
        &self,
        _pair: &str,
        _snapshot: &OrderbookSnapshot,
        _ttl_ms: u64,
    ) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Trades keyed by `trade_id`, plus a recent-trades ring per pair bounded
/// to the last 1000 entries (spec §6 "Persisted state layout").
#[derive(Default)]
pub struct InMemoryLedger {
    trades: Mutex<HashMap<String, Fill>>,
    recent_by_pair: Mutex<HashMap<String, VecDeque<String>>>,
}

impl InMemoryLedger {
    pub const RECENT_TRADES_CAPACITY: usize = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trade(&self, trade_id: &str) -> Option<Fill> {
        self.trades.lock().expect("ledger mutex poisoned").get(trade_id).cloned()
    }

    /// Up to the last 1000 trades for `pair`, oldest first.
    #[must_use]
    pub fn recent_trades(&self, pair: &str) -> Vec<Fill> {
        let recent = self.recent_by_pair.lock().expect("ledger mutex poisoned");
        let trades = self.trades.lock().expect("ledger mutex poisoned");
        recent
            .get(pair)
            .map(|ids| ids.iter().filter_map(|id| trades.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.trades.lock().expect("ledger mutex poisoned").len()
    }
}

impl Ledger for InMemoryLedger {
    fn store_trade(&self, fill: &Fill) -> Result<(), LedgerError> {
        let mut trades = self.trades.lock().expect("ledger mutex poisoned");
        if trades.contains_key(&fill.trade_id) {
            return Ok(()); // idempotent on trade_id
        }
        trades.insert(fill.trade_id.clone(), fill.clone());
        drop(trades);

        let mut recent = self.recent_by_pair.lock().expect("ledger mutex poisoned");
        let queue = recent.entry(fill.trading_pair.clone()).or_default();
        queue.push_back(fill.trade_id.clone());
        while queue.len() > Self::RECENT_TRADES_CAPACITY {
            queue.pop_front();
        }
        Ok(())
    }
}
