use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::events::EscrowCancelled;
use crate::ledger::CpiLedger;
use crate::machine::{self, CancelSnapshot};
use crate::pda::VaultSigner;
use crate::state::VAULT_AUTHORITY_PDA_SEED;
use crate::utils::{close_escrow_state, load_escrow_state, load_token_account, token_account_view};

#[derive(Accounts)]
pub struct Cancel<'info> {
    #[account(mut)]
    pub initializer: Signer<'info>,
    pub deposit_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub initializer_deposit_token_account: Box<Account<'info, TokenAccount>>,
    /// CHECK: loaded by the handler; a destroyed record reads as NotFound
    #[account(mut)]
    pub escrow_state: UncheckedAccount<'info>,
    /// CHECK: compared against the record's vault
    #[account(mut)]
    pub vault: UncheckedAccount<'info>,
    /// CHECK: keyless authority, only its address is used
    #[account(
        seeds = [VAULT_AUTHORITY_PDA_SEED],
        bump,
    )]
    pub vault_authority: UncheckedAccount<'info>,
    pub token_program: Program<'info, Token>,
}

pub fn handler(ctx: Context<Cancel>, identifier: String) -> Result<()> {
    msg!("start cancel");

    let accounts = &ctx.accounts;
    let record = load_escrow_state(&accounts.escrow_state, ctx.program_id)?;
    let vault = load_token_account(&accounts.vault)?;
    let plan = machine::plan_cancel(&CancelSnapshot {
        program_id: ctx.program_id,
        identifier: &identifier,
        record_address: accounts.escrow_state.key(),
        record: record.as_ref(),
        caller: accounts.initializer.key(),
        deposit_mint: accounts.deposit_mint.key(),
        initializer_deposit_account: token_account_view(
            accounts.initializer_deposit_token_account.key(),
            &accounts.initializer_deposit_token_account,
        ),
        vault_address: accounts.vault.key(),
        vault: vault.map(|vault| token_account_view(accounts.vault.key(), &vault)),
    })?;

    plan.commit(&mut accounts.ledger(), &VaultSigner::derive(ctx.program_id))?;
    close_escrow_state(
        &accounts.escrow_state.to_account_info(),
        &accounts.initializer.to_account_info(),
    )?;

    if let Some(record) = record {
        emit!(EscrowCancelled {
            escrow_state: plan.record_address,
            identifier: record.identifier,
            initializer: record.initializer_key,
            deposit_amount: record.deposit_amount,
        });
    }

    msg!("end cancel");
    Ok(())
}

impl<'info> Cancel<'info> {
    fn ledger(&self) -> CpiLedger<'info> {
        CpiLedger::new(
            self.token_program.to_account_info(),
            self.vault_authority.to_account_info(),
        )
        .with_accounts([
            self.initializer.to_account_info(),
            self.initializer_deposit_token_account.to_account_info(),
            self.vault.to_account_info(),
        ])
        .with_mint(self.deposit_mint.to_account_info(), self.deposit_mint.decimals)
    }
}
