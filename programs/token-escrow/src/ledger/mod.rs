//! The token capability the escrow consumes.
//!
//! The state machine never moves tokens itself. It produces [`Leg`]s and hands
//! them, in order, to a [`TokenLedger`]: the SPL token program through CPI on
//! chain, or [`memory::MemoryLedger`] in process.

use anchor_lang::prelude::*;

use crate::pda::VaultSigner;

pub mod cpi;
#[cfg(not(target_os = "solana"))]
pub mod memory;

pub use cpi::CpiLedger;
#[cfg(not(target_os = "solana"))]
pub use memory::MemoryLedger;

/// Who authorizes a transfer out of a holding account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authority {
    /// The human holder of the source account, who signed the instruction.
    Holder(Pubkey),
    /// The derived vault authority, acting through a [`VaultSigner`].
    Vault,
}

/// One transfer of `amount` units of `mint` from `from` to `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leg {
    pub from: Pubkey,
    pub to: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub authority: Authority,
}

pub trait TokenLedger {
    /// Allocate a holding account for `mint` at `account`, controlled by `owner`.
    fn create_holding_account(&mut self, account: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Result<()>;

    /// Move `leg.amount` units. Fails with `InsufficientFunds` when the source
    /// balance is short.
    fn transfer(&mut self, leg: &Leg, vault: &VaultSigner) -> Result<()>;

    /// Close an empty vault-controlled holding account, returning its rent to
    /// `destination`.
    fn close_account(&mut self, account: &Pubkey, destination: &Pubkey, vault: &VaultSigner) -> Result<()>;
}
