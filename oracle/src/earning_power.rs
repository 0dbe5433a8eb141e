//! Earning-power oracles — map a deposit to its reward weight.

use crate::whitelist::WhitelistOracle;
use regen_types::Address;
use std::sync::Arc;

/// Maps (balance, owner, delegatee) to the weight used for reward share.
///
/// The weight may diverge from the raw balance: an oracle can boost,
/// damp, or zero a deposit's share without touching its principal.
pub trait EarningPowerOracle: Send + Sync {
    /// Weight for a deposit with the given balance, owner and delegatee.
    fn earning_power(&self, balance: u128, owner: &Address, delegatee: &Address) -> u128;

    /// Recomputed weight for an existing deposit, plus whether the change
    /// is significant enough to qualify for a permissionless bump.
    fn new_earning_power(
        &self,
        balance: u128,
        owner: &Address,
        delegatee: &Address,
        old_earning_power: u128,
    ) -> (u128, bool);
}

/// Earning power equals the staked balance, unconditionally.
pub struct BalanceOracle;

impl EarningPowerOracle for BalanceOracle {
    fn earning_power(&self, balance: u128, _owner: &Address, _delegatee: &Address) -> u128 {
        balance
    }

    fn new_earning_power(
        &self,
        balance: u128,
        _owner: &Address,
        _delegatee: &Address,
        old_earning_power: u128,
    ) -> (u128, bool) {
        (balance, balance != old_earning_power)
    }
}

/// Earning power equals the staked balance for whitelisted owners and is
/// zero for everyone else.
///
/// A deposit whose owner falls off the whitelist keeps its balance but
/// stops earning; anyone can then bump its recorded weight to zero.
pub struct GatedBalanceOracle {
    whitelist: Arc<dyn WhitelistOracle>,
}

impl GatedBalanceOracle {
    pub fn new(whitelist: Arc<dyn WhitelistOracle>) -> Self {
        Self { whitelist }
    }
}

impl EarningPowerOracle for GatedBalanceOracle {
    fn earning_power(&self, balance: u128, owner: &Address, _delegatee: &Address) -> u128 {
        if self.whitelist.is_whitelisted(owner) {
            balance
        } else {
            0
        }
    }

    fn new_earning_power(
        &self,
        balance: u128,
        owner: &Address,
        delegatee: &Address,
        old_earning_power: u128,
    ) -> (u128, bool) {
        let power = self.earning_power(balance, owner, delegatee);
        (power, power != old_earning_power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whitelist::AddressWhitelist;

    fn addr(name: &str) -> Address {
        Address::new(format!("rgn_{name}"))
    }

    #[test]
    fn balance_oracle_is_identity() {
        let oracle = BalanceOracle;
        assert_eq!(oracle.earning_power(123, &addr("a"), &addr("d")), 123);
        let (power, qualifies) = oracle.new_earning_power(456, &addr("a"), &addr("d"), 123);
        assert_eq!(power, 456);
        assert!(qualifies);
    }

    #[test]
    fn balance_oracle_unchanged_does_not_qualify() {
        let oracle = BalanceOracle;
        let (_, qualifies) = oracle.new_earning_power(100, &addr("a"), &addr("d"), 100);
        assert!(!qualifies);
    }

    #[test]
    fn gated_oracle_zeroes_non_members() {
        let wl = Arc::new(AddressWhitelist::with_members([addr("alice")]));
        let oracle = GatedBalanceOracle::new(wl.clone());
        assert_eq!(oracle.earning_power(500, &addr("alice"), &addr("d")), 500);
        assert_eq!(oracle.earning_power(500, &addr("bob"), &addr("d")), 0);

        // Alice falls off the whitelist: the recomputed weight drops to zero
        // and qualifies for a bump.
        wl.remove(&addr("alice"));
        let (power, qualifies) = oracle.new_earning_power(500, &addr("alice"), &addr("d"), 500);
        assert_eq!(power, 0);
        assert!(qualifies);
    }
}
