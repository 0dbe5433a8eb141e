//! The fungible token trait.

use crate::error::TokenError;
use regen_types::Address;

/// A fungible token ledger.
///
/// Implementations use interior mutability: the engine holds shared
/// references to its tokens and calls them from `&self`. Every method is
/// atomic — a failed transfer leaves both accounts untouched.
pub trait FungibleToken: Send + Sync {
    /// The address identifying this token as an asset.
    ///
    /// Two token handles refer to the same asset iff their asset addresses
    /// are equal.
    fn asset(&self) -> Address;

    /// Balance held by `holder`.
    fn balance_of(&self, holder: &Address) -> u128;

    /// Move `amount` from `from` to `to`.
    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError>;

    /// Set `spender`'s allowance over `owner`'s balance to exactly `amount`.
    fn approve(&self, owner: &Address, spender: &Address, amount: u128);

    /// Remaining allowance from `owner` to `spender`.
    fn allowance(&self, owner: &Address, spender: &Address) -> u128;

    /// Move `amount` from `from` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError>;
}
