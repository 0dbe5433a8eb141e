//! Fungible token abstraction for the Regen staker.
//!
//! The engine never assumes anything about where token balances live — it
//! moves value exclusively through the [`FungibleToken`] trait. Transfers
//! have exact-amount semantics: the amount debited always equals the amount
//! credited. Fee-on-transfer or rebasing behavior is out of contract.

pub mod error;
pub mod memory;
pub mod token;

pub use error::TokenError;
pub use memory::MemoryToken;
pub use token::FungibleToken;
