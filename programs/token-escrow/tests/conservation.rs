//! Property tests over random operation sequences: tokens are never created
//! or destroyed, failed operations leave no trace, and every live escrow is
//! backed by at least its deposit even when outsiders send tokens to a vault.

mod common;

use anchor_lang::prelude::*;
use proptest::prelude::*;
use token_escrow::ledger::memory::{CancelAccounts, ExchangeAccounts, OpenAccounts};
use token_escrow::ledger::MemoryLedger;

const IDENTIFIERS: [&str; 3] = ["alpha", "beta", "gamma"];

#[derive(Clone, Debug)]
enum Op {
    Open {
        actor: usize,
        identifier: usize,
        deposit_b: bool,
        deposit_amount: u64,
        requested_amount: u64,
    },
    Exchange { actor: usize, identifier: usize },
    Cancel { actor: usize, identifier: usize },
    Donate { deposit_b: bool, amount: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..3usize, any::<bool>(), 0..400u64, 0..400u64).prop_map(
            |(actor, identifier, deposit_b, deposit_amount, requested_amount)| Op::Open {
                actor,
                identifier,
                deposit_b,
                deposit_amount,
                requested_amount,
            }
        ),
        (0..3usize, 0..3usize).prop_map(|(actor, identifier)| Op::Exchange { actor, identifier }),
        (0..3usize, 0..3usize).prop_map(|(actor, identifier)| Op::Cancel { actor, identifier }),
        (any::<bool>(), 1..20u64).prop_map(|(deposit_b, amount)| Op::Donate { deposit_b, amount }),
    ]
}

struct Holder {
    key: Pubkey,
    a: Pubkey,
    b: Pubkey,
}

impl Holder {
    fn account_for(&self, mint: &Pubkey, mint_a: &Pubkey) -> Pubkey {
        if mint == mint_a {
            self.a
        } else {
            self.b
        }
    }
}

fn apply(ledger: &mut MemoryLedger, holders: &[Holder], mint_a: &Pubkey, mint_b: &Pubkey, op: &Op) -> Result<()> {
    match *op {
        Op::Open {
            actor,
            identifier,
            deposit_b,
            deposit_amount,
            requested_amount,
        } => {
            let holder = &holders[actor];
            let (deposit_mint, receive_mint) = if deposit_b { (*mint_b, *mint_a) } else { (*mint_a, *mint_b) };
            let accounts = OpenAccounts {
                deposit_mint,
                receive_mint,
                deposit_account: holder.account_for(&deposit_mint, mint_a),
                receive_account: holder.account_for(&receive_mint, mint_a),
            };
            ledger
                .open(
                    &holder.key,
                    &accounts,
                    &common::terms(IDENTIFIERS[identifier], deposit_amount, requested_amount),
                )
                .map(|_| ())
        }
        Op::Exchange { actor, identifier } => {
            let holder = &holders[actor];
            let (deposit_mint, receive_mint) = match ledger.escrow_state(IDENTIFIERS[identifier]) {
                Some(record) => (record.deposit_mint, record.receive_mint),
                None => (*mint_a, *mint_b),
            };
            let accounts = ExchangeAccounts {
                deposit_mint,
                receive_mint,
                payment_account: holder.account_for(&receive_mint, mint_a),
                receive_account: holder.account_for(&deposit_mint, mint_a),
            };
            ledger.exchange(&holder.key, IDENTIFIERS[identifier], &accounts)
        }
        Op::Cancel { actor, identifier } => {
            let holder = &holders[actor];
            let deposit_mint = ledger
                .escrow_state(IDENTIFIERS[identifier])
                .map(|record| record.deposit_mint)
                .unwrap_or(*mint_a);
            let accounts = CancelAccounts {
                deposit_mint,
                refund_account: holder.account_for(&deposit_mint, mint_a),
            };
            ledger.cancel(&holder.key, IDENTIFIERS[identifier], &accounts)
        }
        Op::Donate { deposit_b, amount } => {
            let mint = if deposit_b { mint_b } else { mint_a };
            let vault = ledger.vault_address(mint);
            ledger.mint_to(&vault, amount)
        }
    }
}

proptest! {
    #[test]
    fn operations_conserve_supply(ops in proptest::collection::vec(op(), 1..40)) {
        let mut ledger = MemoryLedger::new(token_escrow::ID);
        let mint_a = ledger.create_mint(0);
        let mint_b = ledger.create_mint(0);
        let holders: Vec<Holder> = (0..3)
            .map(|_| {
                let key = Pubkey::new_unique();
                let a = ledger.create_token_account(&key, &mint_a).unwrap();
                let b = ledger.create_token_account(&key, &mint_b).unwrap();
                ledger.mint_to(&a, 500).unwrap();
                ledger.mint_to(&b, 500).unwrap();
                Holder { key, a, b }
            })
            .collect();
        let mut supply_a = ledger.supply(&mint_a);
        let mut supply_b = ledger.supply(&mint_b);

        for op in &ops {
            let before = ledger.clone();
            match (apply(&mut ledger, &holders, &mint_a, &mint_b, op), op) {
                (Err(_), _) => {
                    prop_assert_eq!(&ledger, &before);
                }
                (Ok(()), Op::Donate { deposit_b: false, amount }) => supply_a += u128::from(*amount),
                (Ok(()), Op::Donate { deposit_b: true, amount }) => supply_b += u128::from(*amount),
                (Ok(()), _) => {}
            }

            prop_assert_eq!(ledger.supply(&mint_a), supply_a);
            prop_assert_eq!(ledger.supply(&mint_b), supply_b);

            for identifier in IDENTIFIERS {
                if let Some(record) = ledger.escrow_state(identifier) {
                    let vault = ledger.holding_account(&record.vault_account);
                    let backing = vault.map(|vault| vault.amount).unwrap_or_default();
                    prop_assert!(backing >= record.deposit_amount);
                }
            }
        }
    }

    #[test]
    fn exchange_moves_exactly_the_agreed_amounts(
        deposit_amount in 1..=500u64,
        requested_amount in 1..=1000u64,
    ) {
        let mut world = common::World::new();
        world.open("test", deposit_amount, requested_amount).unwrap();
        world.exchange("test").unwrap();

        prop_assert_eq!(world.balance(&world.initializer.a), 500 - deposit_amount);
        prop_assert_eq!(world.balance(&world.initializer.b), requested_amount);
        prop_assert_eq!(world.balance(&world.taker.a), deposit_amount);
        prop_assert_eq!(world.balance(&world.taker.b), 1000 - requested_amount);
    }
}
