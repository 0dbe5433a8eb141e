//! Whitelist and earning-power oracles.
//!
//! The engine reads membership and reward-weight decisions through these
//! traits. Reference implementations cover the common cases: a plain
//! address set, balance-proportional earning power, and a whitelist-gated
//! variant that zeroes the weight of non-members.

pub mod earning_power;
pub mod whitelist;

pub use earning_power::{BalanceOracle, EarningPowerOracle, GatedBalanceOracle};
pub use whitelist::{AddressWhitelist, WhitelistOracle};
