//! The staking-reward accrual and deposit-accounting engine.
//!
//! Depositors stake a token, accrue a time-weighted share of periodically
//! notified reward pools, and can claim, compound, or contribute the
//! accrued rewards. Reward share is driven by whitelist-gated "earning
//! power" that may diverge from the raw balance.
//!
//! This crate handles:
//! - The global reward accumulator (scaled fixed-point, variable duration)
//! - The deposit ledger and its stake/withdraw/claim/compound operations
//! - Delegated-surrogate vs. direct custody of staked principal
//! - Signature-authorized contributions to allocation mechanisms
//! - Admin parameter setters with mid-period timing locks

pub mod accrual;
pub mod bridge;
pub mod config;
pub mod custody;
pub mod deposit;
pub mod engine;
pub mod error;

pub use accrual::{GlobalRewardAccrual, SCALE_FACTOR};
pub use bridge::{AllocationMechanism, MechanismError};
pub use config::{ClaimFeeParameters, StakerConfig};
pub use custody::{CustodyStrategy, DelegatedCustody, DirectCustody};
pub use deposit::{Deposit, DepositId};
pub use engine::{Collaborators, DelegatedStaker, DirectStaker, StakerEngine};
pub use error::StakerError;
