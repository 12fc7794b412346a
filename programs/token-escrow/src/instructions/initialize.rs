use anchor_lang::prelude::*;
use anchor_lang::system_program::{self, Allocate, Assign, CreateAccount, Transfer};
use anchor_spl::associated_token::AssociatedToken;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::events::EscrowOpened;
use crate::ledger::CpiLedger;
use crate::machine::{self, OpenPlan, OpenSnapshot, OpenTerms};
use crate::pda::VaultSigner;
use crate::state::{ESCROW_STATE_SEED, ESCROW_STATE_SPACE, VAULT_AUTHORITY_PDA_SEED};
use crate::utils::{load_token_account, record_funding, token_account_view, RecordFunding};

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(mut)]
    pub initializer: Signer<'info>,
    pub deposit_mint: Box<Account<'info, Mint>>,
    pub receive_mint: Box<Account<'info, Mint>>,
    /// CHECK: keyless authority, only its address is used
    #[account(
        seeds = [VAULT_AUTHORITY_PDA_SEED],
        bump,
    )]
    pub vault_authority: UncheckedAccount<'info>,
    /// CHECK: may not be allocated yet; address and contents are checked by the state machine
    #[account(mut)]
    pub vault: UncheckedAccount<'info>,
    #[account(mut)]
    pub initializer_deposit_token_account: Box<Account<'info, TokenAccount>>,
    pub initializer_receive_token_account: Box<Account<'info, TokenAccount>>,
    /// CHECK: allocated by the handler at the identifier-derived address
    #[account(mut)]
    pub escrow_state: UncheckedAccount<'info>,
    pub system_program: Program<'info, System>,
    pub token_program: Program<'info, Token>,
    pub associated_token_program: Program<'info, AssociatedToken>,
}

pub fn handler(ctx: Context<Initialize>, terms: OpenTerms) -> Result<()> {
    msg!("start initialize");

    let accounts = &ctx.accounts;
    let vault = load_token_account(&accounts.vault)?;
    let plan = machine::plan_open(
        &terms,
        &OpenSnapshot {
            program_id: ctx.program_id,
            initializer: accounts.initializer.key(),
            deposit_mint: accounts.deposit_mint.key(),
            receive_mint: accounts.receive_mint.key(),
            deposit_account: token_account_view(
                accounts.initializer_deposit_token_account.key(),
                &accounts.initializer_deposit_token_account,
            ),
            receive_account: token_account_view(
                accounts.initializer_receive_token_account.key(),
                &accounts.initializer_receive_token_account,
            ),
            record_address: accounts.escrow_state.key(),
            record_exists: !accounts.escrow_state.data_is_empty(),
            vault_address: accounts.vault.key(),
            vault: vault.map(|vault| token_account_view(accounts.vault.key(), &vault)),
        },
    )?;

    accounts.create_escrow_state(&plan, ctx.program_id)?;
    plan.commit(&mut accounts.ledger(), &VaultSigner::derive(ctx.program_id))?;

    emit!(EscrowOpened {
        escrow_state: plan.record_address,
        identifier: plan.record.identifier.clone(),
        initializer: plan.record.initializer_key,
        deposit_mint: plan.record.deposit_mint,
        receive_mint: plan.record.receive_mint,
        deposit_amount: plan.record.deposit_amount,
        requested_amount: plan.record.requested_amount,
    });

    msg!("end initialize");
    Ok(())
}

impl<'info> Initialize<'info> {
    fn create_escrow_state(&self, plan: &OpenPlan, program_id: &Pubkey) -> Result<()> {
        let bump = [plan.record.bump];
        let signer: &[&[&[u8]]] = &[&[ESCROW_STATE_SEED, plan.record.identifier.as_bytes(), &bump]];
        let system = self.system_program.to_account_info();
        let rent = Rent::get()?.minimum_balance(ESCROW_STATE_SPACE);

        match record_funding(self.escrow_state.lamports(), rent) {
            RecordFunding::Create { lamports } => {
                system_program::create_account(
                    CpiContext::new_with_signer(
                        system,
                        CreateAccount {
                            from: self.initializer.to_account_info(),
                            to: self.escrow_state.to_account_info(),
                        },
                        signer,
                    ),
                    lamports,
                    ESCROW_STATE_SPACE as u64,
                    program_id,
                )?;
            }
            RecordFunding::Adopt { top_up } => {
                msg!("adopting pre-funded escrow state");
                if top_up > 0 {
                    system_program::transfer(
                        CpiContext::new(
                            system.clone(),
                            Transfer {
                                from: self.initializer.to_account_info(),
                                to: self.escrow_state.to_account_info(),
                            },
                        ),
                        top_up,
                    )?;
                }
                system_program::allocate(
                    CpiContext::new_with_signer(
                        system.clone(),
                        Allocate {
                            account_to_allocate: self.escrow_state.to_account_info(),
                        },
                        signer,
                    ),
                    ESCROW_STATE_SPACE as u64,
                )?;
                system_program::assign(
                    CpiContext::new_with_signer(
                        system,
                        Assign {
                            account_to_assign: self.escrow_state.to_account_info(),
                        },
                        signer,
                    ),
                    program_id,
                )?;
            }
        }

        let mut data = self.escrow_state.try_borrow_mut_data()?;
        let mut writer: &mut [u8] = &mut data[..];
        plan.record.try_serialize(&mut writer)
    }

    fn ledger(&self) -> CpiLedger<'info> {
        CpiLedger::new(
            self.token_program.to_account_info(),
            self.vault_authority.to_account_info(),
        )
        .with_accounts([
            self.initializer.to_account_info(),
            self.vault.to_account_info(),
            self.initializer_deposit_token_account.to_account_info(),
        ])
        .with_mint(self.deposit_mint.to_account_info(), self.deposit_mint.decimals)
        .with_creator(
            self.initializer.to_account_info(),
            self.system_program.to_account_info(),
            self.associated_token_program.to_account_info(),
        )
    }
}
