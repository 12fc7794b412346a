use anchor_lang::prelude::*;

pub mod errors;
pub mod events;
pub mod instructions;
pub mod ledger;
pub mod machine;
pub mod pda;
pub mod state;
pub mod utils;

pub use instructions::*;
pub use machine::OpenTerms;

declare_id!("C6eqnSPN75gz2if2e8M3H7xdz4WUX7kPfnDbmHxG9Ri5");

#[program]
pub mod token_escrow {
    use super::*;

    /// Lock `terms.deposit_amount` of the deposit mint in the vault and record
    /// what the initializer wants back.
    pub fn initialize(ctx: Context<Initialize>, terms: OpenTerms) -> Result<()> {
        instructions::initialize::handler(ctx, terms)
    }

    /// Swap the locked deposit for the requested amount, both legs or neither.
    pub fn exchange(ctx: Context<Exchange>, identifier: String) -> Result<()> {
        instructions::exchange::handler(ctx, identifier)
    }

    /// Return the locked deposit to the initializer and close the escrow.
    pub fn cancel(ctx: Context<Cancel>, identifier: String) -> Result<()> {
        instructions::cancel::handler(ctx, identifier)
    }
}
