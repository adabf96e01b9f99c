//! Engine-wide configuration: the self-trade policy, fee schedule, and the
//! defaults new pairs inherit for `RiskLimits` unless overridden per pair.
//!
//! Loaded once at `Engine::new` and held behind the same writer discipline
//! as order state, so runtime tuning (`risk.<pair>` per spec §6) is itself
//! a serialized step rather than a raw field write from outside.

use serde::{Deserialize, Serialize};

use crate::book::SelfTradePolicy;
use crate::fees::FeeSchedule;
use crate::risk::RiskLimits;

/// Top-level engine configuration, deserializable from JSON/TOML by an
/// embedding binary (admin tooling, a config file loader — both out of
/// scope for the core).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineConfig {
    pub fees: FeeSchedule,
    /// Limits newly-added pairs start with until `Engine::set_risk_limits`
    /// overrides them.
    pub default_risk_limits: RiskLimits,
    /// `self_trade_policy` config key (spec §6): `skip` (default),
    /// `cancel_taker`, or `cancel_maker`.
    pub self_trade_policy: SelfTradePolicy,
    /// Snapshot depth used when the engine emits an `orderbook` event
    /// after a book-changing step, independent of the depth a caller may
    /// request explicitly via `OrderBook::snapshot`.
    pub event_snapshot_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            default_risk_limits: RiskLimits::default(),
            self_trade_policy: SelfTradePolicy::default(),
            event_snapshot_depth: crate::book::DEFAULT_SNAPSHOT_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_skip_stp_and_default_depth() {
        let config = EngineConfig::default();
        assert_eq!(config.self_trade_policy, SelfTradePolicy::Skip);
        assert_eq!(config.event_snapshot_depth, 20);
    }
}
