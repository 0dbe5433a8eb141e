//! Shared engine configuration.
//!
//! Every field here is admin-tunable at runtime through the engine's
//! setters, which add the mid-period timing locks; this module only
//! validates static bounds.

use crate::error::StakerError;
use regen_types::Address;
use serde::{Deserialize, Serialize};

/// Lower bound on the reward duration: 7 days.
pub const MIN_REWARD_DURATION_SECS: u64 = 7 * 86_400;

/// Upper bound on the reward duration: 3000 days.
pub const MAX_REWARD_DURATION_SECS: u64 = 3000 * 86_400;

/// Claim-fee skim: a flat amount routed to a collector on every
/// claim/compound/contribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFeeParameters {
    pub amount: u128,
    pub collector: Address,
}

/// Engine configuration shared by every deposit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakerConfig {
    /// Length of a distribution period in seconds.
    pub reward_duration_secs: u64,

    /// Floor on any non-zero deposit balance. Deposits that predate an
    /// increase keep their balance but cannot grow while below the floor.
    pub minimum_stake_amount: u128,

    /// Ceiling on the tip paid for a permissionless earning-power bump.
    pub max_bump_tip: u128,

    /// Optional claim-fee skim. `None` disables the fee.
    pub claim_fee: Option<ClaimFeeParameters>,

    /// Construction-time ceiling the claim fee can never exceed.
    pub max_claim_fee: u128,
}

impl StakerConfig {
    /// 30-day periods, no minimum, no tips, no fee.
    pub fn defaults() -> Self {
        Self {
            reward_duration_secs: 30 * 86_400,
            minimum_stake_amount: 0,
            max_bump_tip: 0,
            claim_fee: None,
            max_claim_fee: 1_000_000,
        }
    }

    /// The active flat claim fee.
    pub fn claim_fee_amount(&self) -> u128 {
        self.claim_fee.as_ref().map(|f| f.amount).unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), StakerError> {
        validate_duration(self.reward_duration_secs)?;
        if let Some(fee) = &self.claim_fee {
            if fee.amount > self.max_claim_fee {
                return Err(StakerError::FeeExceedsMax {
                    fee: fee.amount,
                    max: self.max_claim_fee,
                });
            }
            if !fee.collector.is_valid() {
                return Err(StakerError::InvalidAddress(fee.collector.clone()));
            }
        }
        Ok(())
    }
}

impl Default for StakerConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Check a reward duration against the [7d, 3000d] bounds.
pub fn validate_duration(secs: u64) -> Result<(), StakerError> {
    if !(MIN_REWARD_DURATION_SECS..=MAX_REWARD_DURATION_SECS).contains(&secs) {
        return Err(StakerError::InvalidDuration {
            secs,
            min: MIN_REWARD_DURATION_SECS,
            max: MAX_REWARD_DURATION_SECS,
        });
    }
    Ok(())
}
