//! Small time and identifier helpers shared across the crate.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used to stamp orders, fills, and position updates. Replaying a journal
/// reproduces these values verbatim rather than recomputing them, since
/// the timestamp is part of the recorded event.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as u64
}

/// Generates string order IDs in the absence of a caller-supplied one.
///
/// Ingress intents never carry an `order_id`; the engine mints one at
/// acceptance time.
pub fn generate_order_id() -> String {
    format!("ord_{}", uuid::Uuid::new_v4())
}
