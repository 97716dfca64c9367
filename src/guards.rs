//! Decision guards shared by the keepers
//!
//! - Readiness gate: `now >= last + interval`, inclusive
//! - Minimum-out: `amount - amount * bips / 10000`, floor
//! - APY cap: scale a reward down to the amount implying `max_apy_bips`

use crate::context::KeeperContext;
use crate::error::KeeperError;
use crate::store::LAST_TIMESTAMP_KEY;
use alloy_primitives::{I256, U256};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

// ============================================
// CONSTANTS
// ============================================

/// Basis point denominator
pub const BIPS: u64 = 10_000;

/// 365 days
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Chainlink feeds report 8 decimals
pub const CHAINLINK_PRICE_SCALE: u64 = 100_000_000;

/// Message for the cheapest and most frequent exit path
pub const TIME_NOT_ELAPSED: &str = "Time not elapsed";

/// Message when the aggregated amount is zero
pub const NOTHING_TO_HARVEST: &str = "Nothing to harvest";

// ============================================
// READINESS GATE
// ============================================

/// Snapshot of the gate at evaluation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub last: u64,
    pub next: u64,
    pub now: u64,
}

impl Readiness {
    pub fn new(last: u64, interval: u64, now: u64) -> Self {
        Self { last, next: last.saturating_add(interval), now }
    }

    pub fn is_ready(&self) -> bool {
        self.now >= self.next
    }

    /// No prior execution recorded
    pub fn is_first_run(&self) -> bool {
        self.last == 0
    }

    /// Seconds since the last execution
    pub fn elapsed(&self) -> u64 {
        self.now.saturating_sub(self.last)
    }
}

/// RFC 3339 rendering of a unix timestamp, for logs
pub fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Interval gate backed by the persistent store
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    key: String,
    interval: u64,
}

impl ReadinessGate {
    pub fn new(interval: u64) -> Self {
        Self::with_key(LAST_TIMESTAMP_KEY, interval)
    }

    pub fn with_key(key: &str, interval: u64) -> Self {
        Self { key: key.to_string(), interval }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Gate against an externally sourced last timestamp (e.g. `lastExecution()`)
    pub fn check(&self, last: u64, now: u64) -> Readiness {
        let readiness = Readiness::new(last, self.interval, now);
        info!("Next update: {} ({})", readiness.next, format_timestamp(readiness.next));
        readiness
    }

    /// Gate against the stored last timestamp, unset meaning never executed
    pub async fn check_store(&self, ctx: &KeeperContext) -> Result<Readiness, KeeperError> {
        let last = ctx.storage.get_u64(&self.key).await?;
        Ok(self.check(last, ctx.block_timestamp))
    }

    /// Stored last timestamp, if any
    pub async fn stored(&self, ctx: &KeeperContext) -> Result<Option<u64>, KeeperError> {
        Ok(ctx.storage.get(&self.key).await?.and_then(|v| v.trim().parse().ok()))
    }

    /// Record `now` as the last execution; call only on an executable result.
    /// Plain read-then-write: two concurrent runs on one key may both pass the gate.
    pub async fn commit(&self, ctx: &KeeperContext) -> Result<(), KeeperError> {
        debug!("Committing {} = {}", self.key, ctx.block_timestamp);
        ctx.storage.set(&self.key, ctx.block_timestamp.to_string()).await
    }
}

// ============================================
// SLIPPAGE
// ============================================

/// `amount` reduced by `slippage_bips`, floor division
pub fn min_out(amount: U256, slippage_bips: u64) -> U256 {
    let bips = slippage_bips.min(BIPS);
    amount - amount * U256::from(bips) / U256::from(BIPS)
}

/// Reject basis point arguments outside `[0, 10000]`
pub fn check_bips(name: &str, bips: u64) -> Result<(), KeeperError> {
    if bips > BIPS {
        return Err(KeeperError::Config(format!("{} must be within 0..=10000, got {}", name, bips)));
    }
    Ok(())
}

/// On-chain timestamp as seconds, saturating on absurd values
pub fn timestamp_from(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Positive oracle answer as an unsigned price
pub fn positive_price(answer: I256) -> Result<U256, KeeperError> {
    if answer <= I256::ZERO {
        return Err(KeeperError::Rpc(format!("oracle returned non-positive price {}", answer)));
    }
    Ok(answer.into_raw())
}

// ============================================
// APY CAP
// ============================================

/// Outcome of an APY check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApyOutcome {
    /// Implied APY of the uncapped reward, in bips
    pub apy_bips: U256,
    /// Amount to use, capped or not
    pub amount: U256,
    pub capped: bool,
}

/// Caps a harvest so it never implies more than `max_apy_bips` annualized
#[derive(Debug, Clone, Copy)]
pub struct ApyCap {
    pub max_apy_bips: u64,
}

impl ApyCap {
    pub fn new(max_apy_bips: u64) -> Self {
        Self { max_apy_bips }
    }

    /// `value * year * 10000 / elapsed / pool_value`
    pub fn apy_bips(value: U256, elapsed: u64, pool_value: U256) -> Option<U256> {
        if elapsed == 0 || pool_value.is_zero() {
            return None;
        }
        Some(
            U256::from(SECONDS_PER_YEAR) * value * U256::from(BIPS)
                / U256::from(elapsed)
                / pool_value,
        )
    }

    /// Value implying exactly the max APY over `elapsed`
    pub fn capped_value(&self, elapsed: u64, pool_value: U256) -> U256 {
        U256::from(self.max_apy_bips) * U256::from(elapsed) * pool_value
            / U256::from(BIPS)
            / U256::from(SECONDS_PER_YEAR)
    }

    /// Apply the cap to a token `amount` valued at `price / price_scale`
    ///
    /// Returns the amount unchanged when there is nothing to measure against
    /// (zero elapsed time, empty pool or zero price).
    pub fn apply(
        &self,
        amount: U256,
        price: U256,
        price_scale: U256,
        elapsed: u64,
        pool_value: U256,
    ) -> ApyOutcome {
        let uncapped = ApyOutcome { apy_bips: U256::ZERO, amount, capped: false };
        if price.is_zero() || price_scale.is_zero() {
            return uncapped;
        }

        let value = price * amount / price_scale;
        let Some(apy_bips) = Self::apy_bips(value, elapsed, pool_value) else {
            return uncapped;
        };

        info!("current apy: {} bips, max apy: {} bips", apy_bips, self.max_apy_bips);

        if apy_bips <= U256::from(self.max_apy_bips) {
            return ApyOutcome { apy_bips, amount, capped: false };
        }

        let capped_amount = U256::from(self.max_apy_bips) * U256::from(elapsed) * pool_value * price_scale
            / U256::from(BIPS)
            / U256::from(SECONDS_PER_YEAR)
            / price;
        info!("apy is higher than max, adjusted reward amount: {}", capped_amount);

        ApyOutcome { apy_bips, amount: capped_amount, capped: true }
    }
}
