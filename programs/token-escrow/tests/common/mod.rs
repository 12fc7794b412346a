#![allow(dead_code)]

use anchor_lang::error::Error;
use anchor_lang::prelude::*;
use token_escrow::errors::EscrowError;
use token_escrow::ledger::memory::{CancelAccounts, ExchangeAccounts, OpenAccounts};
use token_escrow::ledger::MemoryLedger;
use token_escrow::OpenTerms;

pub fn code(err: Error) -> u32 {
    match err {
        Error::AnchorError(e) => e.error_code_number,
        Error::ProgramError(e) => panic!("unexpected program error {e:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(result: Result<T>, expected: EscrowError) {
    assert_eq!(code(result.unwrap_err()), u32::from(expected));
}

pub struct Party {
    pub key: Pubkey,
    pub a: Pubkey,
    pub b: Pubkey,
}

/// Two token types and two funded parties: the initializer holds 500 A,
/// the taker holds 1000 B.
pub struct World {
    pub ledger: MemoryLedger,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub initializer: Party,
    pub taker: Party,
}

impl World {
    pub fn new() -> Self {
        let mut ledger = MemoryLedger::new(token_escrow::ID);
        let mint_a = ledger.create_mint(6);
        let mint_b = ledger.create_mint(9);
        let initializer = party(&mut ledger, &mint_a, &mint_b, 500, 0);
        let taker = party(&mut ledger, &mint_a, &mint_b, 0, 1000);
        Self {
            ledger,
            mint_a,
            mint_b,
            initializer,
            taker,
        }
    }

    pub fn party(&mut self, a: u64, b: u64) -> Party {
        party(&mut self.ledger, &self.mint_a, &self.mint_b, a, b)
    }

    pub fn open_accounts(&self) -> OpenAccounts {
        OpenAccounts {
            deposit_mint: self.mint_a,
            receive_mint: self.mint_b,
            deposit_account: self.initializer.a,
            receive_account: self.initializer.b,
        }
    }

    pub fn exchange_accounts(&self, taker: &Party) -> ExchangeAccounts {
        ExchangeAccounts {
            deposit_mint: self.mint_a,
            receive_mint: self.mint_b,
            payment_account: taker.b,
            receive_account: taker.a,
        }
    }

    pub fn cancel_accounts(&self) -> CancelAccounts {
        CancelAccounts {
            deposit_mint: self.mint_a,
            refund_account: self.initializer.a,
        }
    }

    pub fn open(&mut self, identifier: &str, deposit_amount: u64, requested_amount: u64) -> Result<Pubkey> {
        let accounts = self.open_accounts();
        self.ledger.open(
            &self.initializer.key,
            &accounts,
            &terms(identifier, deposit_amount, requested_amount),
        )
    }

    pub fn exchange(&mut self, identifier: &str) -> Result<()> {
        let accounts = self.exchange_accounts(&self.taker);
        self.ledger.exchange(&self.taker.key, identifier, &accounts)
    }

    pub fn cancel(&mut self, identifier: &str) -> Result<()> {
        let accounts = self.cancel_accounts();
        self.ledger.cancel(&self.initializer.key, identifier, &accounts)
    }

    pub fn balance(&self, account: &Pubkey) -> u64 {
        self.ledger.balance_of(account).unwrap()
    }
}

pub fn terms(identifier: &str, deposit_amount: u64, requested_amount: u64) -> OpenTerms {
    OpenTerms {
        identifier: identifier.to_string(),
        deposit_amount,
        requested_amount,
    }
}

fn party(ledger: &mut MemoryLedger, mint_a: &Pubkey, mint_b: &Pubkey, a: u64, b: u64) -> Party {
    let key = Pubkey::new_unique();
    let account_a = ledger.create_token_account(&key, mint_a).unwrap();
    let account_b = ledger.create_token_account(&key, mint_b).unwrap();
    ledger.mint_to(&account_a, a).unwrap();
    ledger.mint_to(&account_b, b).unwrap();
    Party {
        key,
        a: account_a,
        b: account_b,
    }
}
