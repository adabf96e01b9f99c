//! `RiskGate` rejection reasons.

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RiskError {
    OrderNotionalTooLarge { notional: Decimal, max: Decimal },
    PriceDeviationTooLarge { deviation: Decimal, max: Decimal },
    TooManyOpenOrders { open: u32, max: u32 },
    DailyVolumeExceeded { projected: Decimal, max: Decimal },
    InsufficientBalance { needed: Decimal, available: Decimal },
    RateLimited { since_last_ms: u64, min_interval_ms: u64 },
    PositionLimitExceeded { projected: Decimal, max: Decimal },
}

impl std::fmt::Display for RiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskError::OrderNotionalTooLarge { notional, max } => {
                write!(f, "order notional {notional} exceeds maximum {max}")
            }
            RiskError::PriceDeviationTooLarge { deviation, max } => write!(
                f,
                "price deviation {deviation} exceeds maximum allowed {max}"
            ),
            RiskError::TooManyOpenOrders { open, max } => {
                write!(f, "open order count {open} would exceed maximum {max}")
            }
            RiskError::DailyVolumeExceeded { projected, max } => write!(
                f,
                "projected daily volume {projected} exceeds maximum {max}"
            ),
            RiskError::InsufficientBalance { needed, available } => write!(
                f,
                "insufficient balance: needed {needed}, available {available}"
            ),
            RiskError::RateLimited {
                since_last_ms,
                min_interval_ms,
            } => write!(
                f,
                "rate limited: {since_last_ms}ms since last order, minimum interval is {min_interval_ms}ms"
            ),
            RiskError::PositionLimitExceeded { projected, max } => write!(
                f,
                "projected position {projected} exceeds maximum {max}"
            ),
        }
    }
}

impl std::error::Error for RiskError {}
