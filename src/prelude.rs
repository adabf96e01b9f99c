//! Convenience re-export of the types most embedding binaries need.

pub use crate::book::{MarketStats, OrderbookSnapshot, SelfTradePolicy, SnapshotLevel};
pub use crate::config::EngineConfig;
pub use crate::engine::{CancelResult, Engine, OrderResult};
pub use crate::error::EngineError;
pub use crate::events::{ChannelAddress, Event, EventSink, InMemoryEventSink};
pub use crate::fees::FeeSchedule;
pub use crate::journal::{FileJournal, InMemoryJournal, Journal};
pub use crate::ledger::{InMemoryLedger, Ledger};
pub use crate::order::{Order, OrderIntent, OrderStatus, OrderType, Side, TimeInForce};
pub use crate::pair::TradingPair;
pub use crate::risk::{RiskLimits, UserPosition};
pub use crate::trade::Fill;
