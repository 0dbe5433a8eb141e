//! Engine errors.

use regen_store::StoreError;
use regen_token::TokenError;
use regen_types::{Address, Timestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StakerError {
    // ── Authorization ────────────────────────────────────────────────────
    #[error("caller {0} is not the admin")]
    NotAdmin(Address),

    #[error("caller {0} is not the deposit owner")]
    NotOwner(Address),

    #[error("caller {0} is neither the deposit owner nor its claimer")]
    NotOwnerOrClaimer(Address),

    #[error("caller {0} is not an authorized reward notifier")]
    NotRewardNotifier(Address),

    #[error("nested re-entry into the engine during an in-flight call")]
    ReentrantCall,

    // ── Whitelist ────────────────────────────────────────────────────────
    #[error("address {address} is not on the {list} whitelist")]
    NotWhitelisted { address: Address, list: &'static str },

    // ── Validation ───────────────────────────────────────────────────────
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("reward duration {secs}s is outside [{min}s, {max}s]")]
    InvalidDuration { secs: u64, min: u64, max: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(Address),

    #[error("stake and reward assets must match for this operation")]
    AssetMismatch,

    #[error("resulting balance {balance} is below the minimum stake {minimum}")]
    BelowMinimumStake { balance: u128, minimum: u128 },

    #[error("notified amount yields a reward rate below one unit per second")]
    InvalidRewardRate,

    #[error("tip {tip} exceeds the maximum bump tip {max}")]
    TipExceedsMax { tip: u128, max: u128 },

    #[error("claim fee {fee} exceeds the maximum {max}")]
    FeeExceedsMax { fee: u128, max: u128 },

    #[error("the allocation-mechanism whitelist must be distinct from the {0} whitelist")]
    WhitelistAliased(&'static str),

    #[error("arithmetic overflow in reward computation")]
    Overflow,

    // ── State ────────────────────────────────────────────────────────────
    #[error("engine is paused")]
    Paused,

    #[error("reward duration cannot change while a period is active")]
    DurationChangeDuringPeriod,

    #[error("{parameter} cannot increase while a reward period is active")]
    IncreaseDuringActivePeriod { parameter: &'static str },

    #[error("compounding is unsupported: stake and reward tokens are different assets")]
    CompoundingUnsupported,

    #[error("delegatee changes are unsupported under direct custody")]
    DelegationUnsupported,

    #[error("deposit {0} not found")]
    DepositNotFound(u64),

    #[error("earning power is already in sync; bump does not qualify")]
    EarningPowerNotQualified,

    // ── Balance ──────────────────────────────────────────────────────────
    #[error("insufficient reward-token float: required {required}, available {available}")]
    InsufficientRewardFloat { required: u128, available: u128 },

    #[error("requested {requested} exceeds unclaimed reward {available}")]
    ExceedsUnclaimedReward { requested: u128, available: u128 },

    #[error("insufficient deposit balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u128, available: u128 },

    #[error("unclaimed reward after the tip would fall below the bump-tip buffer")]
    InsufficientTipBuffer,

    #[error("allocation mechanism left {remaining} of the granted allowance unconsumed")]
    AllowanceNotConsumed { remaining: u128 },

    // ── Expiry ───────────────────────────────────────────────────────────
    #[error("contribution authorization expired: deadline {deadline}, now {now}")]
    AuthorizationExpired { deadline: Timestamp, now: Timestamp },

    // ── Collaborators ────────────────────────────────────────────────────
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("allocation mechanism rejected the contribution: {0}")]
    Mechanism(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(String),
}
