//! # clob-engine
//!
//! A central-limit-order-book (CLOB) matching engine for a multi-pair spot
//! exchange. This crate implements the hard single-writer core of an
//! exchange: per-pair price-level order books with price-time priority,
//! the limit/market × GTC/IOC/FOK matching algorithm, atomic post-trade
//! settlement of orders and per-user risk state, and an event-publication
//! contract for downstream subscribers (trade tape, order updates,
//! orderbook snapshots).
//!
//! ## Scope
//!
//! In scope: [`price_level`] (ordered price levels with FIFO queues),
//! [`book`] (one order book per trading pair), [`risk`] (per-user position
//! and fund-lock accounting), [`trade`] (fill records and fee calculation),
//! and [`engine`] (the top-level single-writer-per-pair orchestrator).
//!
//! Out of scope, modeled only as the interfaces the core needs:
//! [`events::EventSink`] (the transport that fans trade/order/orderbook
//! events out to subscribers) and [`ledger::Ledger`] (the durable trade
//! store). The core is in-memory; durability is delegated to whatever
//! implements `Ledger`.
//!
//! ## Concurrency model
//!
//! Each trading pair is a serial consumer of its own intent stream: the
//! [`engine::Engine`] holds one writer lock per pair, and submissions for
//! different pairs proceed fully in parallel. See [`engine`] for details.

pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod journal;
pub mod ledger;
pub mod order;
pub mod pair;
pub mod price_level;
pub mod prelude;
pub mod risk;
pub mod trade;
mod utils;

pub use error::EngineError;
