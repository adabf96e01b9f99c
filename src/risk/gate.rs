//! Pre-trade risk checks, the fund-lock protocol, and post-trade position
//! settlement.
//!
//! Funds are reserved at order acceptance and released or settled exactly
//! once per order: a cancellation or terminal reject releases whatever
//! remains locked, and each fill releases the slice of the lock that fill
//! consumes while crediting the actual execution price and fee.

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::order::{Order, OrderIntent, OrderType, Side};
use crate::risk::error::RiskError;
use crate::risk::limits::RiskLimits;
use crate::risk::position::UserPosition;

/// Non-fatal findings from [`RiskGate::check`] that don't block the order
/// but are worth surfacing to the caller: a price deviating from the mark
/// more than the warn threshold, or an order arriving close on the heels
/// of the user's last one.
#[derive(Debug, Clone, Default)]
pub struct RiskCheckOutcome {
    pub warnings: Vec<String>,
}

/// Fund-lock bookkeeping for one still-open order, so that fills and
/// cancellation can release exactly what acceptance reserved regardless
/// of where the order actually executes — a buy locked at its limit
/// price may go on to fill at a better one.
#[derive(Debug, Clone, Copy)]
struct OrderLock {
    side: Side,
    /// Per-unit quote price the lock was computed at: the limit price for
    /// limit orders, or the provisional best-ask-based estimate for
    /// market buys. Unused (and zero) for sells, which lock 1:1 in base
    /// units.
    lock_unit_price: Decimal,
}

/// Per-user, per-pair risk and fund-lock state.
pub struct RiskGate {
    limits: DashMap<String, RiskLimits>,
    positions: DashMap<(String, String), UserPosition>,
    vip_users: DashMap<String, bool>,
    order_locks: DashMap<String, OrderLock>,
}

impl Default for RiskGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskGate {
    pub fn new() -> Self {
        Self {
            limits: DashMap::new(),
            positions: DashMap::new(),
            vip_users: DashMap::new(),
            order_locks: DashMap::new(),
        }
    }

    pub fn set_limits(&self, pair: &str, limits: RiskLimits) {
        self.limits.insert(pair.to_string(), limits);
    }

    pub fn limits_for(&self, pair: &str) -> RiskLimits {
        self.limits.get(pair).map(|l| *l.value()).unwrap_or_default()
    }

    pub fn set_vip(&self, user_id: &str, vip: bool) {
        self.vip_users.insert(user_id.to_string(), vip);
    }

    #[must_use]
    pub fn is_vip(&self, user_id: &str) -> bool {
        self.vip_users.get(user_id).map(|v| *v).unwrap_or(false)
    }

    /// Seeds or fetches a user's balances for a pair. Real deployments
    /// would populate this from an external account store; tests and
    /// embedding binaries call this directly.
    pub fn seed_balance(&self, user_id: &str, pair: &str, base: Decimal, quote: Decimal) {
        self.positions
            .insert((user_id.to_string(), pair.to_string()), UserPosition::new(base, quote));
    }

    pub fn position_for(&self, user_id: &str, pair: &str) -> UserPosition {
        self.positions
            .get(&(user_id.to_string(), pair.to_string()))
            .map(|p| *p.value())
            .unwrap_or_default()
    }

    fn position_entry<'a>(
        &'a self,
        user_id: &str,
        pair: &str,
    ) -> dashmap::mapref::one::RefMut<'a, (String, String), UserPosition> {
        self.positions
            .entry((user_id.to_string(), pair.to_string()))
            .or_default()
    }

    /// Pre-trade check: size, price deviation, open-order count, daily
    /// volume, balance adequacy, order rate, and projected position size,
    /// in that order — the first violated hard limit short-circuits with
    /// an error. `notional`
    /// is the order's
    /// notional value (quantity × price for limit orders, or the
    /// market-buy estimate computed by the caller from the book's best
    /// ask). `effective_price` is that same per-unit price, used for the
    /// price-deviation check on limit orders (`None` for market orders,
    /// which skip the deviation check).
    #[allow(clippy::too_many_arguments)]
    pub fn check(
        &self,
        intent: &OrderIntent,
        notional: Decimal,
        effective_price: Option<Decimal>,
        reference_mark: Option<Decimal>,
        now_ms: u64,
    ) -> Result<RiskCheckOutcome, RiskError> {
        let mut outcome = RiskCheckOutcome::default();
        let user_id = intent.user_id.as_deref().unwrap_or("");
        let limits = self.limits_for(&intent.trading_pair);
        let position = self.position_for(user_id, &intent.trading_pair);

        // 1. size bounds (user-level max notional).
        if notional > limits.max_order_size {
            return Err(RiskError::OrderNotionalTooLarge {
                notional,
                max: limits.max_order_size,
            });
        }

        // 2. price deviation from the reference mark, limit orders only.
        if intent.order_type == OrderType::Limit {
            if let (Some(price), Some(mark)) = (effective_price, reference_mark) {
                if !mark.is_zero() {
                    let deviation = ((price - mark) / mark).abs();
                    if deviation > limits.max_price_deviation {
                        return Err(RiskError::PriceDeviationTooLarge {
                            deviation,
                            max: limits.max_price_deviation,
                        });
                    }
                    if deviation >= limits.min_price_deviation {
                        outcome
                            .warnings
                            .push(format!("price deviates {deviation} from reference mark {mark}"));
                    }
                }
            }
        }

        // 3. open-order count.
        if position.open_order_count + 1 > limits.max_open_orders {
            return Err(RiskError::TooManyOpenOrders {
                open: position.open_order_count,
                max: limits.max_open_orders,
            });
        }

        // 4. daily notional cap.
        let projected_daily = position.daily_volume + notional;
        if projected_daily > limits.max_daily_volume {
            return Err(RiskError::DailyVolumeExceeded {
                projected: projected_daily,
                max: limits.max_daily_volume,
            });
        }

        // 5. balance adequacy.
        match intent.side {
            Side::Buy => {
                if position.quote_balance < notional {
                    return Err(RiskError::InsufficientBalance {
                        needed: notional,
                        available: position.quote_balance,
                    });
                }
            }
            Side::Sell => {
                if position.base_balance < intent.quantity {
                    return Err(RiskError::InsufficientBalance {
                        needed: intent.quantity,
                        available: position.base_balance,
                    });
                }
            }
        }

        // 6. rate limit.
        if position.last_order_time != 0 {
            let since_last = now_ms.saturating_sub(position.last_order_time);
            if since_last < limits.min_order_interval_ms {
                return Err(RiskError::RateLimited {
                    since_last_ms: since_last,
                    min_interval_ms: limits.min_order_interval_ms,
                });
            }
            if since_last < limits.warn_order_interval_ms {
                outcome
                    .warnings
                    .push(format!("order rate: only {since_last}ms since last order"));
            }
        }

        // 7. projected position size, buys only (a sell can only shrink
        // exposure, and the balance check above already bars selling more
        // base than is actually held).
        if intent.side == Side::Buy {
            if let Some(mark) = effective_price.or(reference_mark) {
                let projected_base = position.base_balance + position.locked_base + intent.quantity;
                let projected = projected_base * mark;
                if projected > limits.max_position_size {
                    return Err(RiskError::PositionLimitExceeded {
                        projected,
                        max: limits.max_position_size,
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Fund-lock protocol step at acceptance: reserves `quantity *
    /// lock_unit_price` from `quote_balance` (buy) or `quantity` from
    /// `base_balance` (sell), and increments `open_order_count`.
    pub fn lock_for_order(&self, order: &Order, lock_unit_price: Decimal) -> Result<(), RiskError> {
        let user_id = order.user_id.clone().unwrap_or_default();
        let mut position = self.position_entry(&user_id, &order.trading_pair);
        match order.side {
            Side::Buy => {
                let amount = order.original_quantity * lock_unit_price;
                if position.quote_balance < amount {
                    return Err(RiskError::InsufficientBalance {
                        needed: amount,
                        available: position.quote_balance,
                    });
                }
                position.quote_balance -= amount;
                position.locked_quote += amount;
            }
            Side::Sell => {
                if position.base_balance < order.original_quantity {
                    return Err(RiskError::InsufficientBalance {
                        needed: order.original_quantity,
                        available: position.base_balance,
                    });
                }
                position.base_balance -= order.original_quantity;
                position.locked_base += order.original_quantity;
            }
        }
        position.open_order_count += 1;
        position.last_order_time = order.created_at;
        drop(position);

        self.order_locks.insert(
            order.order_id.clone(),
            OrderLock {
                side: order.side,
                lock_unit_price,
            },
        );
        Ok(())
    }

    /// Releases the remaining lock for an order that just became terminal
    /// without being fully filled (cancellation, or an IOC/FOK reject
    /// that never touched locked funds in the first place — callers only
    /// invoke this once acceptance actually locked something).
    pub fn release_remaining(&self, order: &Order) {
        let Some((_, lock)) = self.order_locks.remove(&order.order_id) else {
            return;
        };
        let user_id = order.user_id.clone().unwrap_or_default();
        let mut position = self.position_entry(&user_id, &order.trading_pair);
        match lock.side {
            Side::Buy => {
                let released = order.remaining_quantity * lock.lock_unit_price;
                position.locked_quote -= released;
                position.quote_balance += released;
            }
            Side::Sell => {
                position.locked_base -= order.remaining_quantity;
                position.base_balance += order.remaining_quantity;
            }
        }
        if position.open_order_count > 0 {
            position.open_order_count -= 1;
        }
    }

    /// Drops the lock bookkeeping for an order that reached a terminal
    /// state with zero remaining quantity (fully filled): nothing left to
    /// release, but `open_order_count` must still come down and the lock
    /// record must be forgotten.
    pub fn finalize_filled(&self, order: &Order) {
        self.order_locks.remove(&order.order_id);
        let user_id = order.user_id.clone().unwrap_or_default();
        let mut position = self.position_entry(&user_id, &order.trading_pair);
        if position.open_order_count > 0 {
            position.open_order_count -= 1;
        }
    }

    /// Settles one fill against both sides' locked funds: releases the
    /// portion of the lock this fill consumes, debits/credits the actual
    /// fill cost plus fee, and updates daily volume and last-order time.
    pub fn settle_order_fill(
        &self,
        order: &Order,
        fill_quantity: Decimal,
        fill_price: Decimal,
        fee: Decimal,
        at_ms: u64,
    ) {
        let Some(lock) = self.order_locks.get(&order.order_id).map(|l| *l.value()) else {
            return;
        };
        let user_id = order.user_id.clone().unwrap_or_default();
        let mut position = self.position_entry(&user_id, &order.trading_pair);
        let notional = fill_quantity * fill_price;
        match lock.side {
            Side::Buy => {
                let released = fill_quantity * lock.lock_unit_price;
                position.locked_quote -= released;
                position.quote_balance += released - (notional + fee);
                position.base_balance += fill_quantity;
            }
            Side::Sell => {
                position.locked_base -= fill_quantity;
                position.quote_balance += notional - fee;
            }
        }
        position.daily_volume += notional;
        position.last_order_time = at_ms;
    }
}
