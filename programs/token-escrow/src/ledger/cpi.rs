use anchor_lang::prelude::*;
use anchor_spl::associated_token::{self, Create};
use anchor_spl::token::{self, CloseAccount, TransferChecked};

use crate::errors::EscrowError;
use crate::ledger::{Authority, Leg, TokenLedger};
use crate::pda::VaultSigner;

/// Accounts needed to allocate a new holding account.
struct Creator<'info> {
    payer: AccountInfo<'info>,
    system_program: AccountInfo<'info>,
    associated_token_program: AccountInfo<'info>,
}

/// [`TokenLedger`] backed by the SPL token program.
///
/// Legs name accounts by key; they are resolved against the account infos the
/// instruction handed in, so a leg can only touch accounts the transaction
/// already declared.
pub struct CpiLedger<'info> {
    token_program: AccountInfo<'info>,
    vault_authority: AccountInfo<'info>,
    accounts: Vec<AccountInfo<'info>>,
    mints: Vec<(AccountInfo<'info>, u8)>,
    creator: Option<Creator<'info>>,
}

impl<'info> CpiLedger<'info> {
    pub fn new(token_program: AccountInfo<'info>, vault_authority: AccountInfo<'info>) -> Self {
        Self {
            token_program,
            vault_authority,
            accounts: Vec::new(),
            mints: Vec::new(),
            creator: None,
        }
    }

    pub fn with_accounts(mut self, accounts: impl IntoIterator<Item = AccountInfo<'info>>) -> Self {
        self.accounts.extend(accounts);
        self
    }

    pub fn with_mint(mut self, mint: AccountInfo<'info>, decimals: u8) -> Self {
        self.mints.push((mint, decimals));
        self
    }

    pub fn with_creator(
        mut self,
        payer: AccountInfo<'info>,
        system_program: AccountInfo<'info>,
        associated_token_program: AccountInfo<'info>,
    ) -> Self {
        self.creator = Some(Creator {
            payer,
            system_program,
            associated_token_program,
        });
        self
    }

    fn account(&self, key: &Pubkey) -> Result<AccountInfo<'info>> {
        if self.vault_authority.key == key {
            return Ok(self.vault_authority.clone());
        }
        self.accounts
            .iter()
            .find(|info| info.key == key)
            .cloned()
            .ok_or_else(|| error!(EscrowError::AccountMismatch))
    }

    fn mint(&self, key: &Pubkey) -> Result<(AccountInfo<'info>, u8)> {
        self.mints
            .iter()
            .find(|(info, _)| info.key == key)
            .cloned()
            .ok_or_else(|| error!(EscrowError::TypeMismatch))
    }

    fn authority(&self, authority: &Authority) -> Result<AccountInfo<'info>> {
        match authority {
            Authority::Holder(holder) => self.account(holder),
            Authority::Vault => Ok(self.vault_authority.clone()),
        }
    }
}

impl<'info> TokenLedger for CpiLedger<'info> {
    fn create_holding_account(&mut self, account: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Result<()> {
        let creator = self
            .creator
            .as_ref()
            .ok_or_else(|| error!(EscrowError::AccountMismatch))?;
        let (mint, _) = self.mint(mint)?;
        let cpi_accounts = Create {
            payer: creator.payer.clone(),
            associated_token: self.account(account)?,
            authority: self.account(owner)?,
            mint,
            system_program: creator.system_program.clone(),
            token_program: self.token_program.clone(),
        };
        associated_token::create(CpiContext::new(
            creator.associated_token_program.clone(),
            cpi_accounts,
        ))
    }

    fn transfer(&mut self, leg: &Leg, vault: &VaultSigner) -> Result<()> {
        let (mint, decimals) = self.mint(&leg.mint)?;
        let cpi_accounts = TransferChecked {
            from: self.account(&leg.from)?,
            mint,
            to: self.account(&leg.to)?,
            authority: self.authority(&leg.authority)?,
        };
        let seeds = vault.seeds();
        let signer: &[&[&[u8]]] = &[&seeds[..]];
        let mut cpi_ctx = CpiContext::new(self.token_program.clone(), cpi_accounts);
        if leg.authority == Authority::Vault {
            cpi_ctx = cpi_ctx.with_signer(signer);
        }
        token::transfer_checked(cpi_ctx, leg.amount, decimals)
    }

    fn close_account(&mut self, account: &Pubkey, destination: &Pubkey, vault: &VaultSigner) -> Result<()> {
        let cpi_accounts = CloseAccount {
            account: self.account(account)?,
            destination: self.account(destination)?,
            authority: self.vault_authority.clone(),
        };
        let seeds = vault.seeds();
        token::close_account(
            CpiContext::new(self.token_program.clone(), cpi_accounts).with_signer(&[&seeds[..]]),
        )
    }
}
