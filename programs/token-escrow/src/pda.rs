//! Deterministic addresses and the keyless vault authority.
//!
//! Every address the escrow touches is a pure function of seed bytes and the
//! program id, so any party can recompute it without a lookup.

use anchor_lang::prelude::*;
use anchor_spl::associated_token::get_associated_token_address;

use crate::errors::EscrowError;
use crate::state::{ESCROW_STATE_SEED, MAX_IDENTIFIER_LEN, VAULT_AUTHORITY_PDA_SEED};

pub fn validate_identifier(identifier: &str) -> Result<()> {
    require!(
        !identifier.is_empty() && identifier.len() <= MAX_IDENTIFIER_LEN,
        EscrowError::InvalidIdentifier
    );
    Ok(())
}

/// Address and bump of the escrow record for `identifier`.
pub fn escrow_state_address(identifier: &str, program_id: &Pubkey) -> Result<(Pubkey, u8)> {
    validate_identifier(identifier)?;
    Pubkey::try_find_program_address(&[ESCROW_STATE_SEED, identifier.as_bytes()], program_id)
        .ok_or_else(|| error!(EscrowError::InvalidIdentifier))
}

pub fn vault_authority_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_AUTHORITY_PDA_SEED], program_id)
}

/// The custody vault for a token type: the associated token account of the
/// vault authority for `mint`.
pub fn vault_address(mint: &Pubkey, program_id: &Pubkey) -> Pubkey {
    let (authority, _) = vault_authority_address(program_id);
    get_associated_token_address(&authority, mint)
}

/// Signing capability of the vault authority.
///
/// Only the state machine can construct one, and it is handed to the ledger
/// for the duration of a single commit.
#[derive(Debug)]
pub struct VaultSigner {
    address: Pubkey,
    bump: [u8; 1],
}

impl VaultSigner {
    pub(crate) fn derive(program_id: &Pubkey) -> Self {
        let (address, bump) = vault_authority_address(program_id);
        Self {
            address,
            bump: [bump],
        }
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn bump(&self) -> u8 {
        self.bump[0]
    }

    pub(crate) fn seeds(&self) -> [&[u8]; 2] {
        [VAULT_AUTHORITY_PDA_SEED, &self.bump]
    }
}
