use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::events::EscrowExchanged;
use crate::ledger::CpiLedger;
use crate::machine::{self, ExchangeSnapshot};
use crate::pda::VaultSigner;
use crate::state::VAULT_AUTHORITY_PDA_SEED;
use crate::utils::{close_escrow_state, load_escrow_state, load_token_account, token_account_view};

#[derive(Accounts)]
pub struct Exchange<'info> {
    pub taker: Signer<'info>,
    pub deposit_mint: Box<Account<'info, Mint>>,
    pub receive_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub taker_payment_token_account: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub taker_receive_token_account: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub initializer_receive_token_account: Box<Account<'info, TokenAccount>>,
    /// Receives anything sent to the vault on top of the deposit.
    #[account(mut)]
    pub initializer_deposit_token_account: Option<Box<Account<'info, TokenAccount>>>,
    /// CHECK: compared against the record's initializer, receives the rent
    #[account(mut)]
    pub initializer: UncheckedAccount<'info>,
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

pub fn handler(ctx: Context<Exchange>, identifier: String) -> Result<()> {
    msg!("start exchange");

    let accounts = &ctx.accounts;
    let record = load_escrow_state(&accounts.escrow_state, ctx.program_id)?;
    let vault = load_token_account(&accounts.vault)?;
    let plan = machine::plan_exchange(&ExchangeSnapshot {
        program_id: ctx.program_id,
        identifier: &identifier,
        record_address: accounts.escrow_state.key(),
        record: record.as_ref(),
        taker: accounts.taker.key(),
        deposit_mint: accounts.deposit_mint.key(),
        receive_mint: accounts.receive_mint.key(),
        taker_payment_account: token_account_view(
            accounts.taker_payment_token_account.key(),
            &accounts.taker_payment_token_account,
        ),
        taker_receive_account: token_account_view(
            accounts.taker_receive_token_account.key(),
            &accounts.taker_receive_token_account,
        ),
        initializer: accounts.initializer.key(),
        initializer_receive_account: token_account_view(
            accounts.initializer_receive_token_account.key(),
            &accounts.initializer_receive_token_account,
        ),
        initializer_deposit_account: accounts
            .initializer_deposit_token_account
            .as_ref()
            .map(|account| token_account_view(account.key(), account)),
        vault_address: accounts.vault.key(),
        vault: vault.map(|vault| token_account_view(accounts.vault.key(), &vault)),
    })?;

    plan.commit(&mut accounts.ledger(), &VaultSigner::derive(ctx.program_id))?;
    close_escrow_state(
        &accounts.escrow_state.to_account_info(),
        &accounts.initializer.to_account_info(),
    )?;

    if let Some(record) = record {
        emit!(EscrowExchanged {
            escrow_state: plan.record_address,
            identifier: record.identifier,
            initializer: record.initializer_key,
            taker: accounts.taker.key(),
            deposit_amount: record.deposit_amount,
            requested_amount: record.requested_amount,
        });
    }

    msg!("end exchange");
    Ok(())
}

impl<'info> Exchange<'info> {
    fn ledger(&self) -> CpiLedger<'info> {
        let refund = self
            .initializer_deposit_token_account
            .as_ref()
            .map(|account| account.to_account_info());
        CpiLedger::new(
            self.token_program.to_account_info(),
            self.vault_authority.to_account_info(),
        )
        .with_accounts([
            self.taker.to_account_info(),
            self.taker_payment_token_account.to_account_info(),
            self.taker_receive_token_account.to_account_info(),
            self.initializer_receive_token_account.to_account_info(),
            self.initializer.to_account_info(),
            self.vault.to_account_info(),
        ])
        .with_accounts(refund)
        .with_mint(self.deposit_mint.to_account_info(), self.deposit_mint.decimals)
        .with_mint(self.receive_mint.to_account_info(), self.receive_mint.decimals)
    }
}
