use anchor_lang::prelude::*;

pub const ESCROW_STATE_SEED: &[u8] = b"state";
pub const VAULT_AUTHORITY_PDA_SEED: &[u8] = b"authority";

/// A derivation seed is at most 32 bytes, which bounds the identifier.
pub const MAX_IDENTIFIER_LEN: usize = 32;

pub const ESCROW_STATE_SPACE: usize = 8 // internal anchor discriminator
    + EscrowState::INIT_SPACE;

/// Terms and participants of one open trade. Written once by `initialize`,
/// destroyed by `exchange` or `cancel`.
#[account]
#[derive(InitSpace, Debug, PartialEq, Eq)]
pub struct EscrowState {
    #[max_len(32)]
    pub identifier: String,
    pub initializer_key: Pubkey,
    pub initializer_deposit_token_account: Pubkey,
    pub initializer_receive_token_account: Pubkey,
    pub deposit_mint: Pubkey,
    pub receive_mint: Pubkey,
    pub vault_account: Pubkey,
    pub deposit_amount: u64,
    pub requested_amount: u64,
    pub vault_authority_bump: u8,
    pub bump: u8,
}
