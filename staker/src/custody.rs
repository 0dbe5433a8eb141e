//! Custody strategies — where staked principal lives.
//!
//! The engine is generic over one of two capabilities, chosen at
//! construction:
//!
//! - [`DelegatedCustody`] keeps each delegatee's principal in a dedicated
//!   surrogate account, so delegated voting power routes to one address
//!   while many depositors pool behind it.
//! - [`DirectCustody`] keeps all principal in the engine's own account and
//!   rejects delegatee changes, trading delegated voting power for lower
//!   overhead.

use crate::error::StakerError;
use regen_types::Address;
use std::collections::BTreeMap;

/// Namespace tag for surrogate address derivation.
const SURROGATE_TAG: &str = "staker/surrogate/v1";

/// Decides which account holds principal for a given delegatee.
pub trait CustodyStrategy: Send + Sync {
    /// Whether `alter_delegatee` is supported.
    fn supports_delegation(&self) -> bool;

    /// Whether the engine's own account holds staked principal. Drives the
    /// reward-notification float check.
    fn principal_held_by_engine(&self) -> bool;

    /// The account holding principal for deposits delegating to
    /// `delegatee`, materializing it on first use.
    fn custody_account(&mut self, engine: &Address, delegatee: &Address) -> Address;

    /// Look up a custody account without materializing it.
    fn existing_custody_account(&self, engine: &Address, delegatee: &Address) -> Option<Address>;
}

/// Per-delegatee surrogate custody.
///
/// A surrogate's address is derived deterministically from the engine
/// address and the delegatee, so anyone can compute it before the first
/// stake materializes it. Every deposit delegating to the same delegatee
/// shares the one surrogate.
#[derive(Clone, Debug, Default)]
pub struct DelegatedCustody {
    surrogates: BTreeMap<Address, Address>,
}

impl DelegatedCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the surrogate address for `delegatee` without materializing.
    pub fn derive_surrogate(engine: &Address, delegatee: &Address) -> Address {
        Address::derive(
            SURROGATE_TAG,
            &[engine.as_str().as_bytes(), delegatee.as_str().as_bytes()],
        )
    }

    /// Materialized surrogates, in delegatee order.
    pub fn surrogates(&self) -> impl Iterator<Item = (&Address, &Address)> {
        self.surrogates.iter()
    }
}

impl CustodyStrategy for DelegatedCustody {
    fn supports_delegation(&self) -> bool {
        true
    }

    fn principal_held_by_engine(&self) -> bool {
        false
    }

    fn custody_account(&mut self, engine: &Address, delegatee: &Address) -> Address {
        if let Some(existing) = self.surrogates.get(delegatee) {
            return existing.clone();
        }
        let surrogate = Self::derive_surrogate(engine, delegatee);
        tracing::debug!(delegatee = %delegatee, surrogate = %surrogate, "surrogate materialized");
        self.surrogates.insert(delegatee.clone(), surrogate.clone());
        surrogate
    }

    fn existing_custody_account(&self, _engine: &Address, delegatee: &Address) -> Option<Address> {
        self.surrogates.get(delegatee).cloned()
    }
}

/// All principal lives in the engine's own account.
#[derive(Clone, Debug, Default)]
pub struct DirectCustody;

impl DirectCustody {
    pub fn new() -> Self {
        Self
    }
}

impl CustodyStrategy for DirectCustody {
    fn supports_delegation(&self) -> bool {
        false
    }

    fn principal_held_by_engine(&self) -> bool {
        true
    }

    fn custody_account(&mut self, engine: &Address, _delegatee: &Address) -> Address {
        engine.clone()
    }

    fn existing_custody_account(&self, engine: &Address, _delegatee: &Address) -> Option<Address> {
        Some(engine.clone())
    }
}

/// Reject a delegatee change under a strategy that cannot express it.
pub fn ensure_delegation_supported<C: CustodyStrategy + ?Sized>(
    strategy: &C,
) -> Result<(), StakerError> {
    if strategy.supports_delegation() {
        Ok(())
    } else {
        Err(StakerError::DelegationUnsupported)
    }
}
