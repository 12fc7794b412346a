//! In-process token ledger.
//!
//! Holds mints, holding accounts and escrow records in memory and runs the
//! escrow operations through the same state machine as the on-chain handlers.
//! Every operation executes against a staged copy that replaces the live
//! state only when the whole operation succeeds.

use std::collections::BTreeMap;

use anchor_lang::prelude::*;

use crate::errors::EscrowError;
use crate::ledger::{Authority, Leg, TokenLedger};
use crate::machine::{
    self, CancelSnapshot, ExchangeSnapshot, OpenSnapshot, OpenTerms, TokenAccountView,
};
use crate::pda::{self, VaultSigner};
use crate::state::EscrowState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoldingAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// Accounts an initializer supplies to `open`.
#[derive(Clone, Copy, Debug)]
pub struct OpenAccounts {
    pub deposit_mint: Pubkey,
    pub receive_mint: Pubkey,
    pub deposit_account: Pubkey,
    pub receive_account: Pubkey,
}

/// Accounts a taker supplies to `exchange`.
#[derive(Clone, Copy, Debug)]
pub struct ExchangeAccounts {
    pub deposit_mint: Pubkey,
    pub receive_mint: Pubkey,
    pub payment_account: Pubkey,
    pub receive_account: Pubkey,
}

/// Accounts an initializer supplies to `cancel`.
#[derive(Clone, Copy, Debug)]
pub struct CancelAccounts {
    pub deposit_mint: Pubkey,
    pub refund_account: Pubkey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryLedger {
    program_id: Pubkey,
    mints: BTreeMap<Pubkey, u8>,
    accounts: BTreeMap<Pubkey, HoldingAccount>,
    records: BTreeMap<Pubkey, EscrowState>,
}

impl MemoryLedger {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            mints: BTreeMap::new(),
            accounts: BTreeMap::new(),
            records: BTreeMap::new(),
        }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Create a token type.
    pub fn create_mint(&mut self, decimals: u8) -> Pubkey {
        let mint = Pubkey::new_unique();
        self.mints.insert(mint, decimals);
        mint
    }

    /// Create an empty holding account for `mint` owned by `owner`.
    pub fn create_token_account(&mut self, owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
        let account = Pubkey::new_unique();
        self.create_holding_account(&account, owner, mint)?;
        Ok(account)
    }

    pub fn mint_to(&mut self, account: &Pubkey, amount: u64) -> Result<()> {
        let holding = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| error!(EscrowError::AccountMismatch))?;
        holding.amount = holding
            .amount
            .checked_add(amount)
            .ok_or_else(|| error!(EscrowError::InvalidAmount))?;
        Ok(())
    }

    pub fn balance_of(&self, account: &Pubkey) -> Result<u64> {
        self.accounts
            .get(account)
            .map(|holding| holding.amount)
            .ok_or_else(|| error!(EscrowError::AccountMismatch))
    }

    pub fn holding_account(&self, account: &Pubkey) -> Option<&HoldingAccount> {
        self.accounts.get(account)
    }

    /// Total units of `mint` across every holding account.
    pub fn supply(&self, mint: &Pubkey) -> u128 {
        self.accounts
            .values()
            .filter(|holding| holding.mint == *mint)
            .map(|holding| u128::from(holding.amount))
            .sum()
    }

    pub fn escrow_state(&self, identifier: &str) -> Option<&EscrowState> {
        let (address, _) = pda::escrow_state_address(identifier, &self.program_id).ok()?;
        self.records.get(&address)
    }

    pub fn vault_address(&self, mint: &Pubkey) -> Pubkey {
        pda::vault_address(mint, &self.program_id)
    }

    /// Open an escrow on behalf of `initializer`, returning the record address.
    pub fn open(
        &mut self,
        initializer: &Pubkey,
        accounts: &OpenAccounts,
        terms: &OpenTerms,
    ) -> Result<Pubkey> {
        self.atomically(|ledger| {
            let program_id = ledger.program_id;
            let vault_address = pda::vault_address(&accounts.deposit_mint, &program_id);
            // an invalid identifier is reported by the state machine, after the amounts
            let record_address = pda::escrow_state_address(&terms.identifier, &program_id)
                .map(|(address, _)| address)
                .unwrap_or_default();
            let plan = machine::plan_open(
                terms,
                &OpenSnapshot {
                    program_id: &program_id,
                    initializer: *initializer,
                    deposit_mint: accounts.deposit_mint,
                    receive_mint: accounts.receive_mint,
                    deposit_account: ledger.view(&accounts.deposit_account)?,
                    receive_account: ledger.view(&accounts.receive_account)?,
                    record_address,
                    record_exists: ledger.records.contains_key(&record_address),
                    vault_address,
                    vault: ledger.view(&vault_address).ok(),
                },
            )?;

            ledger.records.insert(plan.record_address, plan.record.clone());
            plan.commit(ledger, &VaultSigner::derive(&program_id))?;
            Ok(plan.record_address)
        })
    }

    /// Complete the escrow at `identifier` on behalf of `taker`.
    pub fn exchange(
        &mut self,
        taker: &Pubkey,
        identifier: &str,
        accounts: &ExchangeAccounts,
    ) -> Result<()> {
        self.atomically(|ledger| {
            let program_id = ledger.program_id;
            let record_address = pda::escrow_state_address(identifier, &program_id)?.0;
            let record = ledger.records.get(&record_address).cloned();
            // supplied by the caller on chain; here they are read off the record
            let (initializer, initializer_receive, initializer_deposit) = match &record {
                Some(record) => (
                    record.initializer_key,
                    record.initializer_receive_token_account,
                    record.initializer_deposit_token_account,
                ),
                None => return err!(EscrowError::NotFound),
            };
            let vault_address = pda::vault_address(&accounts.deposit_mint, &program_id);

            let plan = machine::plan_exchange(&ExchangeSnapshot {
                program_id: &program_id,
                identifier,
                record_address,
                record: record.as_ref(),
                taker: *taker,
                deposit_mint: accounts.deposit_mint,
                receive_mint: accounts.receive_mint,
                taker_payment_account: ledger.view(&accounts.payment_account)?,
                taker_receive_account: ledger.view(&accounts.receive_account)?,
                initializer,
                initializer_receive_account: ledger.view(&initializer_receive)?,
                initializer_deposit_account: ledger.view(&initializer_deposit).ok(),
                vault_address,
                vault: ledger.view(&vault_address).ok(),
            })?;

            plan.commit(ledger, &VaultSigner::derive(&program_id))?;
            ledger.records.remove(&plan.record_address);
            Ok(())
        })
    }

    /// Cancel the escrow at `identifier` on behalf of `caller`.
    pub fn cancel(&mut self, caller: &Pubkey, identifier: &str, accounts: &CancelAccounts) -> Result<()> {
        self.atomically(|ledger| {
            let program_id = ledger.program_id;
            let record_address = pda::escrow_state_address(identifier, &program_id)?.0;
            let record = ledger.records.get(&record_address).cloned();
            let vault_address = pda::vault_address(&accounts.deposit_mint, &program_id);

            let plan = machine::plan_cancel(&CancelSnapshot {
                program_id: &program_id,
                identifier,
                record_address,
                record: record.as_ref(),
                caller: *caller,
                deposit_mint: accounts.deposit_mint,
                initializer_deposit_account: ledger.view(&accounts.refund_account)?,
                vault_address,
                vault: ledger.view(&vault_address).ok(),
            })?;

            plan.commit(ledger, &VaultSigner::derive(&program_id))?;
            ledger.records.remove(&plan.record_address);
            Ok(())
        })
    }

    fn atomically<T>(&mut self, operation: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut staged = self.clone();
        let output = operation(&mut staged)?;
        *self = staged;
        Ok(output)
    }

    fn view(&self, key: &Pubkey) -> Result<TokenAccountView> {
        let holding = self
            .accounts
            .get(key)
            .ok_or_else(|| error!(EscrowError::AccountMismatch))?;
        Ok(TokenAccountView {
            key: *key,
            mint: holding.mint,
            owner: holding.owner,
            amount: holding.amount,
        })
    }
}

impl TokenLedger for MemoryLedger {
    fn create_holding_account(&mut self, account: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Result<()> {
        require!(self.mints.contains_key(mint), EscrowError::TypeMismatch);
        require!(!self.accounts.contains_key(account), EscrowError::AlreadyExists);
        self.accounts.insert(
            *account,
            HoldingAccount {
                mint: *mint,
                owner: *owner,
                amount: 0,
            },
        );
        Ok(())
    }

    fn transfer(&mut self, leg: &Leg, vault: &VaultSigner) -> Result<()> {
        let source = *self
            .accounts
            .get(&leg.from)
            .ok_or_else(|| error!(EscrowError::AccountMismatch))?;
        let destination = *self
            .accounts
            .get(&leg.to)
            .ok_or_else(|| error!(EscrowError::AccountMismatch))?;

        let signer = match leg.authority {
            Authority::Holder(holder) => holder,
            Authority::Vault => vault.address(),
        };
        require_keys_eq!(source.owner, signer, EscrowError::Unauthorized);
        require_keys_eq!(source.mint, leg.mint, EscrowError::TypeMismatch);
        require_keys_eq!(destination.mint, leg.mint, EscrowError::TypeMismatch);
        require_gte!(source.amount, leg.amount, EscrowError::InsufficientFunds);

        if leg.from == leg.to {
            return Ok(());
        }
        let credited = destination
            .amount
            .checked_add(leg.amount)
            .ok_or_else(|| error!(EscrowError::InvalidAmount))?;
        self.accounts.insert(
            leg.from,
            HoldingAccount {
                amount: source.amount - leg.amount,
                ..source
            },
        );
        self.accounts.insert(
            leg.to,
            HoldingAccount {
                amount: credited,
                ..destination
            },
        );
        Ok(())
    }

    fn close_account(&mut self, account: &Pubkey, _destination: &Pubkey, vault: &VaultSigner) -> Result<()> {
        let holding = self
            .accounts
            .get(account)
            .ok_or_else(|| error!(EscrowError::AccountMismatch))?;
        require_keys_eq!(holding.owner, vault.address(), EscrowError::Unauthorized);
        require_eq!(holding.amount, 0, EscrowError::VaultBalanceMismatch);
        self.accounts.remove(account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_exact_amount() {
        let mut ledger = MemoryLedger::new(crate::ID);
        let mint = ledger.create_mint(0);
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let from = ledger.create_token_account(&alice, &mint).unwrap();
        let to = ledger.create_token_account(&bob, &mint).unwrap();
        ledger.mint_to(&from, 10).unwrap();

        let leg = Leg {
            from,
            to,
            mint,
            amount: 4,
            authority: Authority::Holder(alice),
        };
        ledger.transfer(&leg, &VaultSigner::derive(&crate::ID)).unwrap();

        assert_eq!(ledger.balance_of(&from).unwrap(), 6);
        assert_eq!(ledger.balance_of(&to).unwrap(), 4);
        assert_eq!(ledger.supply(&mint), 10);
    }

    #[test]
    fn transfer_requires_the_holder() {
        let mut ledger = MemoryLedger::new(crate::ID);
        let mint = ledger.create_mint(0);
        let alice = Pubkey::new_unique();
        let from = ledger.create_token_account(&alice, &mint).unwrap();
        let to = ledger.create_token_account(&alice, &mint).unwrap();
        ledger.mint_to(&from, 10).unwrap();

        let by_stranger = Leg {
            from,
            to,
            mint,
            amount: 1,
            authority: Authority::Holder(Pubkey::new_unique()),
        };
        assert!(ledger.transfer(&by_stranger, &VaultSigner::derive(&crate::ID)).is_err());

        let by_vault = Leg {
            authority: Authority::Vault,
            ..by_stranger
        };
        assert!(ledger.transfer(&by_vault, &VaultSigner::derive(&crate::ID)).is_err());
        assert_eq!(ledger.balance_of(&from).unwrap(), 10);
    }

    #[test]
    fn transfer_rejects_overdraft() {
        let mut ledger = MemoryLedger::new(crate::ID);
        let mint = ledger.create_mint(0);
        let alice = Pubkey::new_unique();
        let from = ledger.create_token_account(&alice, &mint).unwrap();
        let to = ledger.create_token_account(&alice, &mint).unwrap();
        ledger.mint_to(&from, 3).unwrap();

        let leg = Leg {
            from,
            to,
            mint,
            amount: 4,
            authority: Authority::Holder(alice),
        };
        assert!(ledger.transfer(&leg, &VaultSigner::derive(&crate::ID)).is_err());
        assert_eq!(ledger.balance_of(&from).unwrap(), 3);
        assert_eq!(ledger.balance_of(&to).unwrap(), 0);
    }

    #[test]
    fn failed_operation_leaves_no_trace() {
        let mut ledger = MemoryLedger::new(crate::ID);
        let mint = ledger.create_mint(0);
        let alice = Pubkey::new_unique();
        let account = ledger.create_token_account(&alice, &mint).unwrap();

        let result: Result<()> = ledger.atomically(|staged| {
            staged.mint_to(&account, 5)?;
            err!(EscrowError::InvalidAmount)
        });

        assert!(result.is_err());
        assert_eq!(ledger.balance_of(&account).unwrap(), 0);
    }

    #[test]
    fn vault_close_requires_empty_balance() {
        let mut ledger = MemoryLedger::new(crate::ID);
        let mint = ledger.create_mint(0);
        let signer = VaultSigner::derive(&crate::ID);
        let vault = ledger.vault_address(&mint);
        ledger
            .create_holding_account(&vault, &signer.address(), &mint)
            .unwrap();
        ledger.mint_to(&vault, 1).unwrap();

        assert!(ledger.close_account(&vault, &Pubkey::new_unique(), &signer).is_err());
        assert!(ledger.holding_account(&vault).is_some());
    }
}
