use anchor_lang::prelude::*;

#[event]
pub struct EscrowOpened {
    pub escrow_state: Pubkey,
    pub identifier: String,
    pub initializer: Pubkey,
    pub deposit_mint: Pubkey,
    pub receive_mint: Pubkey,
    pub deposit_amount: u64,
    pub requested_amount: u64,
}

#[event]
pub struct EscrowExchanged {
    pub escrow_state: Pubkey,
    pub identifier: String,
    pub initializer: Pubkey,
    pub taker: Pubkey,
    pub deposit_amount: u64,
    pub requested_amount: u64,
}

#[event]
pub struct EscrowCancelled {
    pub escrow_state: Pubkey,
    pub identifier: String,
    pub initializer: Pubkey,
    pub deposit_amount: u64,
}
