//! Escrow state machine.
//!
//! Each operation is split in two: a pure planning step that runs every check
//! against a snapshot of the accounts involved, and a commit step that replays
//! the planned transfers against a [`TokenLedger`]. Nothing is mutated until
//! planning has succeeded, so a failed operation has no side effect to undo.

use anchor_lang::prelude::*;

use crate::errors::EscrowError;
use crate::ledger::{Authority, Leg, TokenLedger};
use crate::pda::{self, VaultSigner};
use crate::state::EscrowState;

/// Terms chosen by the initializer when opening an escrow.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct OpenTerms {
    pub identifier: String,
    pub deposit_amount: u64,
    pub requested_amount: u64,
}

/// The parts of a token holding account the state machine reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAccountView {
    pub key: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

pub struct OpenSnapshot<'a> {
    pub program_id: &'a Pubkey,
    pub initializer: Pubkey,
    pub deposit_mint: Pubkey,
    pub receive_mint: Pubkey,
    pub deposit_account: TokenAccountView,
    pub receive_account: TokenAccountView,
    /// Address supplied for the escrow record.
    pub record_address: Pubkey,
    pub record_exists: bool,
    /// Address supplied for the vault, and its state if it already exists.
    pub vault_address: Pubkey,
    pub vault: Option<TokenAccountView>,
}

pub struct ExchangeSnapshot<'a> {
    pub program_id: &'a Pubkey,
    pub identifier: &'a str,
    pub record_address: Pubkey,
    pub record: Option<&'a EscrowState>,
    pub taker: Pubkey,
    pub deposit_mint: Pubkey,
    pub receive_mint: Pubkey,
    pub taker_payment_account: TokenAccountView,
    pub taker_receive_account: TokenAccountView,
    pub initializer: Pubkey,
    pub initializer_receive_account: TokenAccountView,
    /// Only needed when the vault holds more than the deposit.
    pub initializer_deposit_account: Option<TokenAccountView>,
    pub vault_address: Pubkey,
    pub vault: Option<TokenAccountView>,
}

pub struct CancelSnapshot<'a> {
    pub program_id: &'a Pubkey,
    pub identifier: &'a str,
    pub record_address: Pubkey,
    pub record: Option<&'a EscrowState>,
    pub caller: Pubkey,
    pub deposit_mint: Pubkey,
    pub initializer_deposit_account: TokenAccountView,
    pub vault_address: Pubkey,
    pub vault: Option<TokenAccountView>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenPlan {
    pub record_address: Pubkey,
    pub record: EscrowState,
    /// The vault must be allocated before the deposit lands in it.
    pub create_vault: bool,
    pub vault_authority: Pubkey,
    pub deposit: Leg,
}

/// Terminal transition of an open escrow: transfers in order, then the vault
/// is closed and the record destroyed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementPlan {
    pub record_address: Pubkey,
    pub legs: Vec<Leg>,
    pub vault: Pubkey,
    /// Receives the rent of the vault and of the record.
    pub rent_destination: Pubkey,
}

pub fn plan_open(terms: &OpenTerms, snapshot: &OpenSnapshot) -> Result<OpenPlan> {
    require_gt!(terms.deposit_amount, 0, EscrowError::InvalidAmount);
    require_gt!(terms.requested_amount, 0, EscrowError::InvalidAmount);

    let (record_address, bump) = pda::escrow_state_address(&terms.identifier, snapshot.program_id)?;
    require_keys_eq!(
        snapshot.record_address,
        record_address,
        EscrowError::AccountMismatch
    );
    require!(!snapshot.record_exists, EscrowError::AlreadyExists);

    require_keys_eq!(
        snapshot.deposit_account.owner,
        snapshot.initializer,
        EscrowError::Unauthorized
    );
    require_keys_eq!(
        snapshot.receive_account.owner,
        snapshot.initializer,
        EscrowError::Unauthorized
    );

    require_keys_neq!(
        snapshot.deposit_mint,
        snapshot.receive_mint,
        EscrowError::TypeMismatch
    );
    require_keys_eq!(
        snapshot.deposit_account.mint,
        snapshot.deposit_mint,
        EscrowError::TypeMismatch
    );
    require_keys_eq!(
        snapshot.receive_account.mint,
        snapshot.receive_mint,
        EscrowError::TypeMismatch
    );

    let (vault_authority, vault_authority_bump) = pda::vault_authority_address(snapshot.program_id);
    let vault_address = pda::vault_address(&snapshot.deposit_mint, snapshot.program_id);
    require_keys_eq!(
        snapshot.vault_address,
        vault_address,
        EscrowError::AccountMismatch
    );
    if let Some(vault) = &snapshot.vault {
        assert_vault(vault, &vault_authority, &snapshot.deposit_mint)?;
        // one open escrow per vault
        require_eq!(vault.amount, 0, EscrowError::AlreadyExists);
    }

    require_gte!(
        snapshot.deposit_account.amount,
        terms.deposit_amount,
        EscrowError::InsufficientFunds
    );

    Ok(OpenPlan {
        record_address,
        record: EscrowState {
            identifier: terms.identifier.clone(),
            initializer_key: snapshot.initializer,
            initializer_deposit_token_account: snapshot.deposit_account.key,
            initializer_receive_token_account: snapshot.receive_account.key,
            deposit_mint: snapshot.deposit_mint,
            receive_mint: snapshot.receive_mint,
            vault_account: vault_address,
            deposit_amount: terms.deposit_amount,
            requested_amount: terms.requested_amount,
            vault_authority_bump,
            bump,
        },
        create_vault: snapshot.vault.is_none(),
        vault_authority,
        deposit: Leg {
            from: snapshot.deposit_account.key,
            to: vault_address,
            mint: snapshot.deposit_mint,
            amount: terms.deposit_amount,
            authority: Authority::Holder(snapshot.initializer),
        },
    })
}

pub fn plan_exchange(snapshot: &ExchangeSnapshot) -> Result<SettlementPlan> {
    let record = live_record(
        snapshot.identifier,
        snapshot.program_id,
        &snapshot.record_address,
        snapshot.record,
    )?;

    require_keys_eq!(
        snapshot.taker_payment_account.owner,
        snapshot.taker,
        EscrowError::Unauthorized
    );

    require_keys_eq!(snapshot.deposit_mint, record.deposit_mint, EscrowError::TypeMismatch);
    require_keys_eq!(snapshot.receive_mint, record.receive_mint, EscrowError::TypeMismatch);
    require_keys_eq!(
        snapshot.taker_payment_account.mint,
        record.receive_mint,
        EscrowError::TypeMismatch
    );
    require_keys_eq!(
        snapshot.taker_receive_account.mint,
        record.deposit_mint,
        EscrowError::TypeMismatch
    );

    require_keys_eq!(snapshot.initializer, record.initializer_key, EscrowError::AccountMismatch);
    require_keys_eq!(
        snapshot.initializer_receive_account.key,
        record.initializer_receive_token_account,
        EscrowError::AccountMismatch
    );
    require_keys_neq!(
        snapshot.taker_receive_account.key,
        record.vault_account,
        EscrowError::AccountMismatch
    );
    let vault = recorded_vault(
        record,
        snapshot.program_id,
        &snapshot.vault_address,
        snapshot.vault.as_ref(),
    )?;

    let surplus = surplus_leg(record, vault);
    if let Some(leg) = &surplus {
        let refund = snapshot
            .initializer_deposit_account
            .as_ref()
            .ok_or_else(|| error!(EscrowError::AccountMismatch))?;
        require_keys_eq!(refund.key, leg.to, EscrowError::AccountMismatch);
        require_keys_eq!(refund.mint, record.deposit_mint, EscrowError::TypeMismatch);
        assert_can_credit(refund, leg.amount)?;
    }

    require_gte!(
        snapshot.taker_payment_account.amount,
        record.requested_amount,
        EscrowError::InsufficientFunds
    );

    assert_can_credit(&snapshot.initializer_receive_account, record.requested_amount)?;
    assert_can_credit(&snapshot.taker_receive_account, record.deposit_amount)?;

    let mut legs = vec![
        Leg {
            from: snapshot.taker_payment_account.key,
            to: record.initializer_receive_token_account,
            mint: record.receive_mint,
            amount: record.requested_amount,
            authority: Authority::Holder(snapshot.taker),
        },
        Leg {
            from: vault.key,
            to: snapshot.taker_receive_account.key,
            mint: record.deposit_mint,
            amount: record.deposit_amount,
            authority: Authority::Vault,
        },
    ];
    legs.extend(surplus);

    Ok(SettlementPlan {
        record_address: snapshot.record_address,
        legs,
        vault: vault.key,
        rent_destination: record.initializer_key,
    })
}

pub fn plan_cancel(snapshot: &CancelSnapshot) -> Result<SettlementPlan> {
    let record = live_record(
        snapshot.identifier,
        snapshot.program_id,
        &snapshot.record_address,
        snapshot.record,
    )?;

    require_keys_eq!(snapshot.caller, record.initializer_key, EscrowError::Unauthorized);

    require_keys_eq!(snapshot.deposit_mint, record.deposit_mint, EscrowError::TypeMismatch);
    require_keys_eq!(
        snapshot.initializer_deposit_account.mint,
        record.deposit_mint,
        EscrowError::TypeMismatch
    );

    require_keys_eq!(
        snapshot.initializer_deposit_account.key,
        record.initializer_deposit_token_account,
        EscrowError::AccountMismatch
    );
    let vault = recorded_vault(
        record,
        snapshot.program_id,
        &snapshot.vault_address,
        snapshot.vault.as_ref(),
    )?;

    assert_can_credit(&snapshot.initializer_deposit_account, vault.amount)?;

    let mut legs = vec![Leg {
        from: vault.key,
        to: record.initializer_deposit_token_account,
        mint: record.deposit_mint,
        amount: record.deposit_amount,
        authority: Authority::Vault,
    }];
    legs.extend(surplus_leg(record, vault));

    Ok(SettlementPlan {
        record_address: snapshot.record_address,
        legs,
        vault: vault.key,
        rent_destination: record.initializer_key,
    })
}

impl OpenPlan {
    pub fn commit<L: TokenLedger>(&self, ledger: &mut L, vault: &VaultSigner) -> Result<()> {
        if self.create_vault {
            ledger.create_holding_account(&self.deposit.to, &self.vault_authority, &self.deposit.mint)?;
        }
        ledger.transfer(&self.deposit, vault)
    }
}

impl SettlementPlan {
    pub fn commit<L: TokenLedger>(&self, ledger: &mut L, vault: &VaultSigner) -> Result<()> {
        for leg in &self.legs {
            ledger.transfer(leg, vault)?;
        }
        ledger.close_account(&self.vault, &self.rent_destination, vault)
    }
}

fn live_record<'a>(
    identifier: &str,
    program_id: &Pubkey,
    record_address: &Pubkey,
    record: Option<&'a EscrowState>,
) -> Result<&'a EscrowState> {
    let (expected, _) = pda::escrow_state_address(identifier, program_id)?;
    require_keys_eq!(*record_address, expected, EscrowError::AccountMismatch);

    let record = record.ok_or_else(|| error!(EscrowError::NotFound))?;
    // stored identifier must be the one the address was derived from
    require!(record.identifier == identifier, EscrowError::AccountMismatch);
    Ok(record)
}

/// The vault named by the record, checked to still hold at least the deposit.
/// Anyone can send tokens to the vault, so it may hold more.
fn recorded_vault<'a>(
    record: &EscrowState,
    program_id: &Pubkey,
    vault_address: &Pubkey,
    vault: Option<&'a TokenAccountView>,
) -> Result<&'a TokenAccountView> {
    require_keys_eq!(*vault_address, record.vault_account, EscrowError::AccountMismatch);
    let vault = vault.ok_or_else(|| error!(EscrowError::AccountMismatch))?;
    let (vault_authority, _) = pda::vault_authority_address(program_id);
    assert_vault(vault, &vault_authority, &record.deposit_mint)?;
    require_gte!(vault.amount, record.deposit_amount, EscrowError::VaultBalanceMismatch);
    Ok(vault)
}

/// Sweeps whatever the vault holds beyond the deposit back to the initializer,
/// so the vault can be closed.
fn surplus_leg(record: &EscrowState, vault: &TokenAccountView) -> Option<Leg> {
    let surplus = vault.amount.saturating_sub(record.deposit_amount);
    (surplus > 0).then(|| Leg {
        from: vault.key,
        to: record.initializer_deposit_token_account,
        mint: record.deposit_mint,
        amount: surplus,
        authority: Authority::Vault,
    })
}

fn assert_vault(vault: &TokenAccountView, authority: &Pubkey, mint: &Pubkey) -> Result<()> {
    require_keys_eq!(vault.owner, *authority, EscrowError::AccountMismatch);
    require_keys_eq!(vault.mint, *mint, EscrowError::TypeMismatch);
    Ok(())
}

fn assert_can_credit(account: &TokenAccountView, amount: u64) -> Result<()> {
    account
        .amount
        .checked_add(amount)
        .map(|_| ())
        .ok_or_else(|| error!(EscrowError::InvalidAmount))
}
