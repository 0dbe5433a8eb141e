//! The global reward accumulator.
//!
//! One accumulator is shared by every deposit. A reward notification sets a
//! scaled per-second rate over a fixed duration; each checkpoint folds
//! `rate × elapsed / total_earning_power` into the running
//! reward-per-unit-power value, and deposits settle against that value when
//! they sync. A notification landing mid-period carries the undistributed
//! remainder forward into the new rate.

use crate::error::StakerError;
use regen_types::Timestamp;
use serde::{Deserialize, Serialize};

/// Fixed-point scaling factor.
///
/// The reward rate and the reward-per-unit-power accumulator are stored
/// multiplied by this constant to preserve sub-unit precision without
/// floating-point arithmetic.
pub const SCALE_FACTOR: u128 = 1_000_000_000_000;

/// Shared accrual state: rate, period window, accumulator, running totals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalRewardAccrual {
    /// Reward units per second, pre-scaled by [`SCALE_FACTOR`].
    pub scaled_reward_rate: u128,
    /// When the current distribution period ends.
    pub period_end: Timestamp,
    /// Last time the accumulator was folded forward.
    pub last_checkpoint: Timestamp,
    /// Accumulated reward per unit of earning power, scaled by [`SCALE_FACTOR`].
    pub reward_per_power_accumulated: u128,
    /// Sum of all deposit balances.
    pub total_staked: u128,
    /// Sum of all deposit earning powers.
    pub total_earning_power: u128,
    /// Lifetime total of rewards ever notified.
    pub total_notified: u128,
    /// Lifetime total of rewards ever consumed (claimed + compounded +
    /// contributed + tipped).
    pub total_consumed: u128,
}

impl GlobalRewardAccrual {
    pub fn new() -> Self {
        Self {
            scaled_reward_rate: 0,
            period_end: Timestamp::EPOCH,
            last_checkpoint: Timestamp::EPOCH,
            reward_per_power_accumulated: 0,
            total_staked: 0,
            total_earning_power: 0,
            total_notified: 0,
            total_consumed: 0,
        }
    }

    /// The reward-per-unit-power value as of `now`, without mutating.
    ///
    /// When total earning power is zero the stored accumulator is returned
    /// unchanged: there is nobody to distribute to, and the elapsed
    /// interval's rewards are simply never handed out.
    pub fn reward_per_power(&self, now: Timestamp) -> Result<u128, StakerError> {
        if self.total_earning_power == 0 {
            return Ok(self.reward_per_power_accumulated);
        }
        let until = now.min(self.period_end);
        let elapsed = self.last_checkpoint.elapsed_since(until) as u128;
        let delta = self
            .scaled_reward_rate
            .checked_mul(elapsed)
            .ok_or(StakerError::Overflow)?
            / self.total_earning_power;
        self.reward_per_power_accumulated
            .checked_add(delta)
            .ok_or(StakerError::Overflow)
    }

    /// Fold the accumulator forward to `now`.
    ///
    /// The checkpoint time always advances, even at zero earning power, so
    /// an empty interval can never be distributed retroactively.
    pub fn checkpoint(&mut self, now: Timestamp) -> Result<(), StakerError> {
        self.reward_per_power_accumulated = self.reward_per_power(now)?;
        if now > self.last_checkpoint {
            self.last_checkpoint = now;
        }
        Ok(())
    }

    /// Seconds left in the current period as of `now`.
    pub fn remaining_secs(&self, now: Timestamp) -> u64 {
        self.period_end.as_secs().saturating_sub(now.as_secs())
    }

    /// Whether a distribution period is active at `now`.
    pub fn period_active(&self, now: Timestamp) -> bool {
        now <= self.period_end
    }

    /// Net reward obligations still owed to depositors.
    pub fn outstanding_obligations(&self) -> u128 {
        self.total_notified.saturating_sub(self.total_consumed)
    }

    /// Start (or extend) a distribution of `amount` over `duration_secs`.
    ///
    /// Checkpoints first. If the previous period has ended the rate is
    /// `amount / duration`; otherwise the undistributed remainder of the
    /// old rate is carried into the new one. A post-scale rate below one
    /// raw unit per second is rejected.
    pub fn notify(
        &mut self,
        amount: u128,
        duration_secs: u64,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.checkpoint(now)?;

        let scaled_amount = amount
            .checked_mul(SCALE_FACTOR)
            .ok_or(StakerError::Overflow)?;
        let new_rate = if now >= self.period_end {
            scaled_amount / duration_secs as u128
        } else {
            let remainder = self
                .scaled_reward_rate
                .checked_mul(self.remaining_secs(now) as u128)
                .ok_or(StakerError::Overflow)?;
            remainder
                .checked_add(scaled_amount)
                .ok_or(StakerError::Overflow)?
                / duration_secs as u128
        };
        if new_rate < SCALE_FACTOR {
            return Err(StakerError::InvalidRewardRate);
        }

        self.scaled_reward_rate = new_rate;
        self.period_end = now.plus_secs(duration_secs);
        self.last_checkpoint = now;
        self.total_notified = self
            .total_notified
            .checked_add(amount)
            .ok_or(StakerError::Overflow)?;
        Ok(())
    }

    /// Record a stake delta in the running totals.
    pub fn add_stake(&mut self, balance: u128, earning_power: u128) -> Result<(), StakerError> {
        self.total_staked = self
            .total_staked
            .checked_add(balance)
            .ok_or(StakerError::Overflow)?;
        self.total_earning_power = self
            .total_earning_power
            .checked_add(earning_power)
            .ok_or(StakerError::Overflow)?;
        Ok(())
    }

    /// Remove a stake delta from the running totals.
    pub fn remove_stake(&mut self, balance: u128, earning_power: u128) -> Result<(), StakerError> {
        self.total_staked = self
            .total_staked
            .checked_sub(balance)
            .ok_or(StakerError::Overflow)?;
        self.total_earning_power = self
            .total_earning_power
            .checked_sub(earning_power)
            .ok_or(StakerError::Overflow)?;
        Ok(())
    }

    /// Swap a deposit's earning power in the running total.
    pub fn reweigh(&mut self, old_power: u128, new_power: u128) -> Result<(), StakerError> {
        self.total_earning_power = self
            .total_earning_power
            .checked_sub(old_power)
            .and_then(|t| t.checked_add(new_power))
            .ok_or(StakerError::Overflow)?;
        Ok(())
    }

    /// Record consumed rewards (claimed, compounded, contributed or tipped).
    pub fn consume(&mut self, amount: u128) -> Result<(), StakerError> {
        self.total_consumed = self
            .total_consumed
            .checked_add(amount)
            .ok_or(StakerError::Overflow)?;
        Ok(())
    }
}

impl Default for GlobalRewardAccrual {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;
    const WEEK: u64 = 7 * DAY;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn notify_sets_rate_and_period() {
        let mut acc = GlobalRewardAccrual::new();
        acc.notify(30_000_000, WEEK, ts(0)).unwrap();
        assert_eq!(acc.scaled_reward_rate, 30_000_000 * SCALE_FACTOR / WEEK as u128);
        assert_eq!(acc.period_end, ts(WEEK));
        assert_eq!(acc.total_notified, 30_000_000);
    }

    #[test]
    fn notify_rejects_sub_unit_rate() {
        let mut acc = GlobalRewardAccrual::new();
        // Less than one raw unit per second over the duration.
        let result = acc.notify(WEEK as u128 - 1, WEEK, ts(0));
        assert!(matches!(result, Err(StakerError::InvalidRewardRate)));
    }

    #[test]
    fn notify_mid_period_carries_remainder() {
        let mut acc = GlobalRewardAccrual::new();
        acc.total_earning_power = 1;
        acc.notify(1_000_000 * WEEK as u128, WEEK, ts(0)).unwrap();
        let rate1 = acc.scaled_reward_rate;

        // Half the period elapses, then a second notification of the same
        // size lands: the new rate covers the unspent half plus the new pool.
        let half = WEEK / 2;
        acc.notify(1_000_000 * WEEK as u128, WEEK, ts(half)).unwrap();
        let carried = rate1 * half as u128;
        let expected = (carried + 1_000_000 * WEEK as u128 * SCALE_FACTOR) / WEEK as u128;
        assert_eq!(acc.scaled_reward_rate, expected);
        assert_eq!(acc.period_end, ts(half + WEEK));
    }

    #[test]
    fn reward_per_power_accrues_linearly() {
        let mut acc = GlobalRewardAccrual::new();
        acc.total_earning_power = 1000;
        acc.notify(604_800_000, WEEK, ts(0)).unwrap();
        // rate = 1000 units/sec scaled; per unit power = 1 unit/sec.
        let rpp = acc.reward_per_power(ts(100)).unwrap();
        assert_eq!(rpp, 100 * SCALE_FACTOR);
    }

    #[test]
    fn reward_per_power_stops_at_period_end() {
        let mut acc = GlobalRewardAccrual::new();
        acc.total_earning_power = 1;
        acc.notify(WEEK as u128, WEEK, ts(0)).unwrap();
        let at_end = acc.reward_per_power(ts(WEEK)).unwrap();
        let after_end = acc.reward_per_power(ts(WEEK + DAY)).unwrap();
        assert_eq!(at_end, after_end);
    }

    #[test]
    fn zero_earning_power_leaves_accumulator_unchanged() {
        let mut acc = GlobalRewardAccrual::new();
        acc.notify(604_800_000, WEEK, ts(0)).unwrap();
        assert_eq!(acc.reward_per_power(ts(1000)).unwrap(), 0);
        acc.checkpoint(ts(1000)).unwrap();
        assert_eq!(acc.reward_per_power_accumulated, 0);
        // The checkpoint still advances, so the empty interval is gone for good.
        assert_eq!(acc.last_checkpoint, ts(1000));
    }

    #[test]
    fn empty_interval_is_not_distributed_retroactively() {
        let mut acc = GlobalRewardAccrual::new();
        acc.notify(604_800_000, WEEK, ts(0)).unwrap();
        // Nobody staked for the first 1000 seconds.
        acc.checkpoint(ts(1000)).unwrap();
        acc.total_earning_power = 1000;
        let rpp = acc.reward_per_power(ts(2000)).unwrap();
        // Only the second 1000 seconds distribute: 1000 units/sec / 1000 power.
        assert_eq!(rpp, 1000 * SCALE_FACTOR);
    }

    #[test]
    fn checkpoint_is_idempotent_at_same_instant() {
        let mut acc = GlobalRewardAccrual::new();
        acc.total_earning_power = 10;
        acc.notify(604_800_000, WEEK, ts(0)).unwrap();
        acc.checkpoint(ts(500)).unwrap();
        let first = acc.reward_per_power_accumulated;
        acc.checkpoint(ts(500)).unwrap();
        assert_eq!(acc.reward_per_power_accumulated, first);
    }

    #[test]
    fn outstanding_obligations_track_notify_and_consume() {
        let mut acc = GlobalRewardAccrual::new();
        acc.notify(WEEK as u128 * 2, WEEK, ts(0)).unwrap();
        assert_eq!(acc.outstanding_obligations(), WEEK as u128 * 2);
        acc.consume(WEEK as u128).unwrap();
        assert_eq!(acc.outstanding_obligations(), WEEK as u128);
    }

    #[test]
    fn totals_add_remove_reweigh() {
        let mut acc = GlobalRewardAccrual::new();
        acc.add_stake(100, 100).unwrap();
        acc.add_stake(50, 25).unwrap();
        assert_eq!(acc.total_staked, 150);
        assert_eq!(acc.total_earning_power, 125);
        acc.reweigh(25, 75).unwrap();
        assert_eq!(acc.total_earning_power, 175);
        acc.remove_stake(150, 175).unwrap();
        assert_eq!(acc.total_staked, 0);
        assert_eq!(acc.total_earning_power, 0);
    }

    #[test]
    fn remove_more_than_total_is_overflow() {
        let mut acc = GlobalRewardAccrual::new();
        acc.add_stake(10, 10).unwrap();
        assert!(matches!(
            acc.remove_stake(11, 0),
            Err(StakerError::Overflow)
        ));
    }
}
