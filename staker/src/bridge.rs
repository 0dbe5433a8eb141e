//! The allocation-mechanism collaborator interface.
//!
//! A contribution routes unclaimed rewards to an external allocation
//! mechanism under a signed authorization. The engine never inspects the
//! signature — it is an opaque token the mechanism alone verifies. The
//! engine grants a one-time exact-amount allowance, invokes the
//! mechanism's delegated-deposit entrypoint, and asserts the allowance was
//! fully consumed.

use regen_types::{Address, Timestamp};
use std::fmt;
use thiserror::Error;

/// Rejection raised by an allocation mechanism.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MechanismError(pub String);

impl MechanismError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// An external fund-routing collaborator that receives contributed rewards
/// and credits allocation power to the contributing address.
pub trait AllocationMechanism: Send + Sync {
    /// The mechanism's account (the allowance spender).
    fn address(&self) -> Address;

    /// The asset the mechanism settles in. Must match the engine's reward
    /// token for a contribution to be accepted.
    fn settlement_asset(&self) -> Address;

    /// Accept a contribution of `amount` on behalf of `contributor`,
    /// pulling the pre-approved allowance from `funder`.
    ///
    /// `signature` is the contributor's authorization, forwarded unopened;
    /// verifying it against `deadline` is entirely the mechanism's
    /// responsibility.
    fn delegated_deposit(
        &self,
        funder: &Address,
        contributor: &Address,
        amount: u128,
        deadline: Timestamp,
        signature: &[u8],
    ) -> Result<(), MechanismError>;
}

impl fmt::Debug for dyn AllocationMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationMechanism")
            .field("address", &self.address())
            .field("settlement_asset", &self.settlement_asset())
            .finish()
    }
}
