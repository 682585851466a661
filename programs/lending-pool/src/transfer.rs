//! Token movement between users and the pool vaults
//!
//! The engine only sees the `TokenTransfer` trait. On-chain it is backed by
//! SPL Token CPIs; a failed transfer fails the whole instruction.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
};

use crate::error::LendingError;

pub trait TokenTransfer {
    /// Move `amount` of `asset` from `from` into the pool. `from` must have
    /// authorized the transfer.
    fn pull(&mut self, from: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult;

    /// Move `amount` of `asset` from the pool to `to`
    fn push(&mut self, to: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult;
}

/// Token accounts involved for one asset of an instruction
pub struct TransferLeg<'a, 'info> {
    pub mint: Pubkey,
    /// Counterparty token account (user, liquidator)
    pub user_token: &'a AccountInfo<'info>,
    /// Pool vault for `mint`
    pub vault: &'a AccountInfo<'info>,
}

/// SPL Token implementation. Pulls are signed by the user wallet, pushes by
/// the pool PDA.
pub struct SplTokenTransfer<'a, 'info> {
    pub token_program: &'a AccountInfo<'info>,
    pub user_authority: &'a AccountInfo<'info>,
    pub pool_authority: &'a AccountInfo<'info>,
    pub pool_seeds: &'a [&'a [u8]],
    pub legs: Vec<TransferLeg<'a, 'info>>,
}

impl<'a, 'info> SplTokenTransfer<'a, 'info> {
    fn leg(&self, asset: &Pubkey) -> Result<&TransferLeg<'a, 'info>, ProgramError> {
        self.legs
            .iter()
            .find(|leg| leg.mint == *asset)
            .ok_or_else(|| LendingError::InvalidTokenAccount.into())
    }
}

impl<'a, 'info> TokenTransfer for SplTokenTransfer<'a, 'info> {
    fn pull(&mut self, from: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult {
        if self.user_authority.key != from || !self.user_authority.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let leg = self.leg(asset)?;
        let ix = spl_token::instruction::transfer(
            self.token_program.key,
            leg.user_token.key,
            leg.vault.key,
            self.user_authority.key,
            &[],
            amount,
        )?;

        invoke(
            &ix,
            &[
                leg.user_token.clone(),
                leg.vault.clone(),
                self.user_authority.clone(),
                self.token_program.clone(),
            ],
        )?;

        msg!("Pulled {} of {} from {}", amount, asset, from);
        Ok(())
    }

    fn push(&mut self, to: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult {
        let leg = self.leg(asset)?;

        let ix = spl_token::instruction::transfer(
            self.token_program.key,
            leg.vault.key,
            leg.user_token.key,
            self.pool_authority.key,
            &[],
            amount,
        )?;

        invoke_signed(
            &ix,
            &[
                leg.vault.clone(),
                leg.user_token.clone(),
                self.pool_authority.clone(),
                self.token_program.clone(),
            ],
            &[self.pool_seeds],
        )?;

        msg!("Pushed {} of {} to {}", amount, asset, to);
        Ok(())
    }
}

/// Unpack a token account and check its mint (and owner when given)
pub fn check_token_account(
    info: &AccountInfo,
    mint: &Pubkey,
    owner: Option<&Pubkey>,
) -> Result<spl_token::state::Account, ProgramError> {
    if info.owner != &spl_token::id() {
        return Err(LendingError::InvalidTokenAccount.into());
    }

    let account = spl_token::state::Account::unpack(&info.data.borrow())?;
    if account.mint != *mint {
        return Err(LendingError::InvalidTokenAccount.into());
    }

    if let Some(owner) = owner {
        if account.owner != *owner {
            return Err(LendingError::InvalidTokenAccount.into());
        }
    }

    Ok(account)
}

/// Decimals of an SPL mint
pub fn mint_decimals(info: &AccountInfo) -> Result<u8, ProgramError> {
    if info.owner != &spl_token::id() {
        return Err(LendingError::InvalidTokenAccount.into());
    }
    let mint = spl_token::state::Mint::unpack(&info.data.borrow())?;
    Ok(mint.decimals)
}
