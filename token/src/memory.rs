//! In-memory token ledger — thread-safe, exact-amount semantics.

use crate::error::TokenError;
use crate::token::FungibleToken;
use regen_types::Address;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    balances: HashMap<Address, u128>,
    /// (owner, spender) → remaining allowance.
    allowances: HashMap<(Address, Address), u128>,
}

/// A thread-safe in-memory fungible token.
///
/// Used as the token collaborator in tests and by embedders that keep the
/// whole ledger in process.
pub struct MemoryToken {
    asset: Address,
    inner: Mutex<Inner>,
}

impl MemoryToken {
    pub fn new(asset: Address) -> Self {
        Self {
            asset,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Credit `amount` to `holder` out of thin air (test/bootstrap helper).
    pub fn mint(&self, holder: &Address, amount: u128) {
        let mut inner = self.inner.lock().unwrap();
        let balance = inner.balances.entry(holder.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Total supply across all holders.
    pub fn total_supply(&self) -> u128 {
        let inner = self.inner.lock().unwrap();
        inner.balances.values().copied().sum()
    }
}

impl FungibleToken for MemoryToken {
    fn asset(&self) -> Address {
        self.asset.clone()
    }

    fn balance_of(&self, holder: &Address) -> u128 {
        let inner = self.inner.lock().unwrap();
        inner.balances.get(holder).copied().unwrap_or(0)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        let mut inner = self.inner.lock().unwrap();
        let available = inner.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                holder: from.clone(),
                needed: amount,
                available,
            });
        }
        inner.balances.insert(from.clone(), available - amount);
        let to_balance = inner.balances.entry(to.clone()).or_insert(0);
        *to_balance = to_balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }

    fn approve(&self, owner: &Address, spender: &Address, amount: u128) {
        let mut inner = self.inner.lock().unwrap();
        if amount == 0 {
            inner.allowances.remove(&(owner.clone(), spender.clone()));
        } else {
            inner
                .allowances
                .insert((owner.clone(), spender.clone()), amount);
        }
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        let inner = self.inner.lock().unwrap();
        inner
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        {
            let mut inner = self.inner.lock().unwrap();
            let key = (from.clone(), spender.clone());
            let allowed = inner.allowances.get(&key).copied().unwrap_or(0);
            if allowed < amount {
                return Err(TokenError::InsufficientAllowance {
                    owner: from.clone(),
                    spender: spender.clone(),
                    needed: amount,
                    available: allowed,
                });
            }
            inner.allowances.insert(key, allowed - amount);
        }
        // Balance move re-checks under the same lock discipline; restore the
        // allowance if the debit fails so the call stays atomic.
        match self.transfer(from, to, amount) {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut inner = self.inner.lock().unwrap();
                let key = (from.clone(), spender.clone());
                let remaining = inner.allowances.get(&key).copied().unwrap_or(0);
                inner.allowances.insert(key, remaining.saturating_add(amount));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(name: &str) -> Address {
        Address::new(format!("rgn_{name}"))
    }

    fn token() -> MemoryToken {
        MemoryToken::new(addr("token"))
    }

    #[test]
    fn mint_and_transfer() {
        let t = token();
        t.mint(&addr("alice"), 1000);
        t.transfer(&addr("alice"), &addr("bob"), 400).unwrap();
        assert_eq!(t.balance_of(&addr("alice")), 600);
        assert_eq!(t.balance_of(&addr("bob")), 400);
        assert_eq!(t.total_supply(), 1000);
    }

    #[test]
    fn transfer_rejects_overdraw() {
        let t = token();
        t.mint(&addr("alice"), 100);
        let err = t.transfer(&addr("alice"), &addr("bob"), 101).unwrap_err();
        match err {
            TokenError::InsufficientBalance { needed, available, .. } => {
                assert_eq!(needed, 101);
                assert_eq!(available, 100);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Failed transfer left both sides untouched.
        assert_eq!(t.balance_of(&addr("alice")), 100);
        assert_eq!(t.balance_of(&addr("bob")), 0);
    }

    #[test]
    fn transfer_from_spends_allowance_exactly() {
        let t = token();
        t.mint(&addr("alice"), 1000);
        t.approve(&addr("alice"), &addr("spender"), 300);
        t.transfer_from(&addr("spender"), &addr("alice"), &addr("bob"), 300)
            .unwrap();
        assert_eq!(t.allowance(&addr("alice"), &addr("spender")), 0);
        assert_eq!(t.balance_of(&addr("bob")), 300);
    }

    #[test]
    fn transfer_from_rejects_exceeding_allowance() {
        let t = token();
        t.mint(&addr("alice"), 1000);
        t.approve(&addr("alice"), &addr("spender"), 100);
        let result = t.transfer_from(&addr("spender"), &addr("alice"), &addr("bob"), 200);
        assert!(result.is_err());
        assert_eq!(t.allowance(&addr("alice"), &addr("spender")), 100);
        assert_eq!(t.balance_of(&addr("alice")), 1000);
    }

    #[test]
    fn transfer_from_restores_allowance_on_failed_debit() {
        let t = token();
        t.mint(&addr("alice"), 50);
        t.approve(&addr("alice"), &addr("spender"), 200);
        let result = t.transfer_from(&addr("spender"), &addr("alice"), &addr("bob"), 200);
        assert!(result.is_err());
        assert_eq!(t.allowance(&addr("alice"), &addr("spender")), 200);
    }

    #[test]
    fn approve_zero_clears_allowance() {
        let t = token();
        t.approve(&addr("alice"), &addr("spender"), 500);
        t.approve(&addr("alice"), &addr("spender"), 0);
        assert_eq!(t.allowance(&addr("alice"), &addr("spender")), 0);
    }
}
