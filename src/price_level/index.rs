//! Ordered index of price levels for one side of one book.

use std::collections::HashSet;

use crossbeam_skiplist::SkipMap;
use rust_decimal::Decimal;

use super::level::PriceLevel;

/// All resting orders on one side of one book, ordered by price then
/// arrival time.
///
/// The ordering relation is fixed at construction: ascending for asks
/// (lowest price is best), descending for bids (highest price is best).
/// Ties in price are broken by FIFO arrival order within the level.
pub struct PriceLevelIndex {
    levels: SkipMap<Decimal, PriceLevel>,
    /// `true` for ask sides (best = lowest price), `false` for bid sides
    /// (best = highest price).
    ascending: bool,
}

impl PriceLevelIndex {
    pub fn new_ascending() -> Self {
        Self {
            levels: SkipMap::new(),
            ascending: true,
        }
    }

    pub fn new_descending() -> Self {
        Self {
            levels: SkipMap::new(),
            ascending: false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Inserts an order into the FIFO tail of its price level, creating the
    /// level if it doesn't yet exist.
    pub fn insert(&self, price: Decimal, order_id: String, remaining_qty: Decimal) {
        match self.levels.get(&price) {
            Some(entry) => {
                // SkipMap entries give us `&PriceLevel`; we need interior
                // mutability to append without a full remove+reinsert.
                // The entry's value lives behind the skiplist's internal
                // synchronization, but `PriceLevel` itself has no interior
                // mutability, so the single-writer discipline (only the
                // pair's lock holder ever calls this) lets us take this
                // shortcut: remove-then-reinsert the level with the update
                // applied, which is still O(log L).
                let mut level = entry.value().clone();
                level.push_back(order_id, remaining_qty);
                drop(entry);
                self.levels.insert(price, level);
            }
            None => {
                let mut level = PriceLevel::new(price);
                level.push_back(order_id, remaining_qty);
                self.levels.insert(price, level);
            }
        }
    }

    /// Removes an order from its price level, deleting the level if it
    /// becomes empty.
    pub fn remove(&self, price: Decimal, order_id: &str, remaining_qty: Decimal) {
        if let Some(entry) = self.levels.get(&price) {
            let mut level = entry.value().clone();
            level.remove(order_id, remaining_qty);
            if level.is_empty() {
                entry.remove();
            } else {
                self.levels.insert(price, level);
            }
        }
    }

    /// Applies a fill to a specific resting order at `price`: reduces the
    /// level's total by `fill_quantity`, and if the order is exhausted,
    /// removes it from the FIFO entirely (deleting the level if it is now
    /// empty). Unlike the old head-only variant, this never reorders other
    /// orders at the level — it targets `order_id` directly, so a taker
    /// walking past same-user orders leaves everyone else's priority intact.
    pub fn apply_fill_to(
        &self,
        price: Decimal,
        order_id: &str,
        fill_quantity: Decimal,
        exhausted: bool,
    ) {
        let Some(entry) = self.levels.get(&price) else {
            return;
        };
        let mut level = entry.value().clone();
        if exhausted {
            level.remove(order_id, fill_quantity);
        } else {
            level.reduce_head(fill_quantity);
        }
        if level.is_empty() {
            entry.remove();
        } else {
            self.levels.insert(price, level);
        }
    }

    /// Best price on this side: lowest for ascending (asks), highest for
    /// descending (bids). `None` if the side is empty.
    #[must_use]
    pub fn best_price(&self) -> Option<Decimal> {
        if self.ascending {
            self.levels.front().map(|e| *e.key())
        } else {
            self.levels.back().map(|e| *e.key())
        }
    }

    /// The order ID at the front of the FIFO at `price`, if the level
    /// exists and is non-empty.
    #[must_use]
    pub fn head_order(&self, price: Decimal) -> Option<String> {
        self.levels.get(&price).and_then(|e| e.value().head().cloned())
    }

    /// The first order ID at `price`, front-to-back, that is not in
    /// `excluded`. Used by the self-trade "skip" policy to find the next
    /// matchable order without mutating the level's FIFO order — unrelated
    /// orders keep their relative priority for every future taker.
    #[must_use]
    pub fn head_order_excluding(
        &self,
        price: Decimal,
        excluded: &HashSet<String>,
    ) -> Option<String> {
        self.levels
            .get(&price)
            .and_then(|e| e.value().iter().find(|id| !excluded.contains(*id)).cloned())
    }

    /// A snapshot of the order IDs resting at `price`, front-to-back.
    #[must_use]
    pub fn orders_at(&self, price: Decimal) -> Vec<String> {
        self.levels
            .get(&price)
            .map(|e| e.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Up to `n` best levels, in best-to-worst order, for snapshot display.
    #[must_use]
    pub fn top_levels(&self, n: usize) -> Vec<PriceLevel> {
        let iter: Box<dyn Iterator<Item = PriceLevel>> = if self.ascending {
            Box::new(self.levels.iter().map(|e| e.value().clone()))
        } else {
            Box::new(self.levels.iter().rev().map(|e| e.value().clone()))
        };
        iter.take(n).collect()
    }

    /// Sum of quantities at prices marketable against `limit`: at-or-below
    /// `limit` for an ascending (ask) index, at-or-above for a descending
    /// (bid) index.
    #[must_use]
    pub fn quantity_at_or_better(&self, limit: Decimal) -> Decimal {
        self.levels
            .iter()
            .filter(|e| {
                if self.ascending {
                    *e.key() <= limit
                } else {
                    *e.key() >= limit
                }
            })
            .map(|e| e.value().total_quantity)
            .sum()
    }

    /// Total resting quantity on this side, regardless of price.
    #[must_use]
    pub fn total_quantity(&self) -> Decimal {
        self.levels.iter().map(|e| e.value().total_quantity).sum()
    }

    /// Iterates price levels in match order (best price first), yielding
    /// `(price, PriceLevel)` snapshots. Used by the matching walk.
    pub fn iter_in_match_order(&self) -> Box<dyn Iterator<Item = (Decimal, PriceLevel)> + '_> {
        if self.ascending {
            Box::new(self.levels.iter().map(|e| (*e.key(), e.value().clone())))
        } else {
            Box::new(
                self.levels
                    .iter()
                    .rev()
                    .map(|e| (*e.key(), e.value().clone())),
            )
        }
    }
}
