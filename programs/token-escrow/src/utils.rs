use anchor_lang::prelude::*;
use anchor_lang::system_program;
use anchor_spl::token::{self, TokenAccount};

use crate::errors::EscrowError;
use crate::machine::TokenAccountView;
use crate::state::EscrowState;

pub fn assert_owned_by(account_info: &AccountInfo, owner: &Pubkey) -> Result<()> {
    require_keys_eq!(
        *account_info.owner,
        *owner,
        EscrowError::IncorrectAccountInfoOwner
    );
    Ok(())
}

/// The escrow record stored in `account_info`, or `None` once it has been
/// destroyed (or was never created).
pub fn load_escrow_state(account_info: &AccountInfo, program_id: &Pubkey) -> Result<Option<EscrowState>> {
    if account_info.data_is_empty() {
        return Ok(None);
    }
    assert_owned_by(account_info, program_id)?;
    let data = account_info.try_borrow_data()?;
    Ok(Some(EscrowState::try_deserialize(&mut &data[..])?))
}

/// The token account stored in `account_info`, or `None` if it is not
/// allocated.
pub fn load_token_account(account_info: &AccountInfo) -> Result<Option<TokenAccount>> {
    if account_info.data_is_empty() {
        return Ok(None);
    }
    assert_owned_by(account_info, &token::ID)?;
    let data = account_info.try_borrow_data()?;
    Ok(Some(TokenAccount::try_deserialize(&mut &data[..])?))
}

pub fn token_account_view(key: Pubkey, account: &TokenAccount) -> TokenAccountView {
    TokenAccountView {
        key,
        mint: account.mint,
        owner: account.owner,
        amount: account.amount,
    }
}

/// How to bring an empty record address up to a rent-exempt allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFunding {
    /// Nothing lives at the address yet.
    Create { lamports: u64 },
    /// Someone already sent lamports to the address; top it up, then
    /// allocate and assign it in place.
    Adopt { top_up: u64 },
}

pub fn record_funding(current_lamports: u64, rent_exempt_minimum: u64) -> RecordFunding {
    if current_lamports == 0 {
        RecordFunding::Create {
            lamports: rent_exempt_minimum,
        }
    } else {
        RecordFunding::Adopt {
            top_up: rent_exempt_minimum.saturating_sub(current_lamports),
        }
    }
}

/// Destroy a program-owned account, sending its rent to `destination`.
pub fn close_escrow_state<'info>(
    account_info: &AccountInfo<'info>,
    destination: &AccountInfo<'info>,
) -> Result<()> {
    let lamports = account_info.lamports();
    **destination.try_borrow_mut_lamports()? += lamports;
    **account_info.try_borrow_mut_lamports()? = 0;

    account_info.try_borrow_mut_data()?.fill(0);
    account_info.assign(&system_program::ID);
    Ok(())
}
