//! Ordered price levels with per-level FIFO queues of resting orders.
//!
//! Backed by a `crossbeam_skiplist::SkipMap<Price, PriceLevel>` for O(log L)
//! ordered insert/delete and O(1) best-price access, even though each
//! trading pair only ever has one writer at a time (held by
//! `crate::engine::Engine`): the ordering and FIFO contract the skiplist
//! gives for free outweighs the cost of a plain `BTreeMap` rewrite.

mod index;
mod level;

pub use index::PriceLevelIndex;
pub use level::PriceLevel;
