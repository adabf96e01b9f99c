//! The event-publication contract: a closed sum type for everything the
//! engine fans out, structured channel addresses instead of concatenated
//! strings, and a subscriber-pull `EventSink` the transport layer drains.
//!
//! Grounded on Design Notes §9 ("dynamic message objects on the event bus
//! → tagged variants", "string-keyed channels → structured channel
//! addresses", "callbacks on subscribe → subscriber-pull event stream").
//! The teacher's `orderbook::trade::TradeListener` callback
//! (`Arc<dyn Fn(&TradeResult) + Send + Sync>`) is exactly the callback
//! shape Design Notes §9 says to replace; this module is that
//! replacement.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::book::OrderbookSnapshot;
use crate::order::Order;
use crate::trade::Fill;

/// Which logical bus channel an event belongs to. Spec §6 names
/// `trade.<pair>`, `orderbook.<pair>`, `order-update.<user_id>`, plus the
/// aggregate fan-outs `trades.all` and `orders.all`; this is the
/// structured equivalent a transport can pattern-match on instead of
/// parsing a concatenated string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelAddress {
    Trade { pair: String },
    Orderbook { pair: String },
    OrderUpdate { user_id: String },
    TradesAll,
    OrdersAll,
}

impl std::fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelAddress::Trade { pair } => write!(f, "trade.{pair}"),
            ChannelAddress::Orderbook { pair } => write!(f, "orderbook.{pair}"),
            ChannelAddress::OrderUpdate { user_id } => write!(f, "order-update.{user_id}"),
            ChannelAddress::TradesAll => write!(f, "trades.all"),
            ChannelAddress::OrdersAll => write!(f, "orders.all"),
        }
    }
}

/// The closed sum type every event the engine emits is an instance of.
/// `OrderbookDelta` is reserved for a future incremental-diff publication
/// mode (§6 mentions diffs alongside snapshots); the engine currently
/// only ever constructs `Snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Trade(Fill),
    OrderUpdate(Order),
    Orderbook(OrderbookSnapshot),
    OrderbookDelta {
        trading_pair: String,
        changed_bids: Vec<crate::book::SnapshotLevel>,
        changed_asks: Vec<crate::book::SnapshotLevel>,
        timestamp: u64,
    },
}

/// One published event, stamped with the channel it was sent on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Published {
    pub channel: ChannelAddress,
    pub event: Event,
}

/// The transport-agnostic sink every published event is handed to.
///
/// Implementations must not re-enter the engine (Design Notes §9: "no
/// re-entrancy from the transport into the engine") — `publish` is called
/// synchronously from inside a pair's writer step and must return
/// quickly; slow fan-out belongs on the implementation's own
/// write-behind buffer, not blocking the matching step.
pub trait EventSink: Send + Sync {
    /// Publishes one event on one channel. At-least-once delivery per
    /// pair is the engine's guarantee (spec §7); implementations that
    /// buffer internally are responsible for their own retry policy.
    fn publish(&self, channel: ChannelAddress, event: Event);
}

/// A bounded, in-memory reference `EventSink` for tests and embedding
/// binaries without a real bus yet. Keeps the last `capacity` published
/// events per channel, in publication order.
pub struct InMemoryEventSink {
    capacity: usize,
    channels: Mutex<std::collections::HashMap<ChannelAddress, VecDeque<Event>>>,
}

impl InMemoryEventSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Published events on `channel`, oldest first.
    #[must_use]
    pub fn history(&self, channel: &ChannelAddress) -> Vec<Event> {
        self.channels
            .lock()
            .expect("event sink mutex poisoned")
            .get(channel)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn total_published(&self) -> usize {
        self.channels
            .lock()
            .expect("event sink mutex poisoned")
            .values()
            .map(VecDeque::len)
            .sum()
    }
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EventSink for InMemoryEventSink {
    fn publish(&self, channel: ChannelAddress, event: Event) {
        let mut channels = self.channels.lock().expect("event sink mutex poisoned");
        let queue = channels.entry(channel).or_default();
        queue.push_back(event);
        while queue.len() > self.capacity {
            queue.pop_front();
        }
    }
}
