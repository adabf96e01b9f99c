//! Per-user position, fund-lock, daily-volume, rate-limit, and price-band
//! checks: the pre-trade gate and post-trade settler.

mod error;
mod gate;
mod limits;
mod position;

pub use error::RiskError;
pub use gate::{RiskCheckOutcome, RiskGate};
pub use limits::RiskLimits;
pub use position::UserPosition;
