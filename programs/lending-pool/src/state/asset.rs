use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{error::LendingError, math};

/// Registry entry for a supported asset
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    /// Token mint, the asset identifier
    pub mint: Pubkey,

    /// Pool token account holding this asset (owned by the pool PDA)
    pub vault: Pubkey,

    /// Mint decimals
    pub decimals: u8,

    /// USD price, 6 decimals (1_000_000 = $1.00). Admin supplied.
    pub price_usd: u64,

    /// Supported flag
    pub is_supported: bool,

    /// Sum of all deposited amounts
    pub total_deposits: u64,

    /// Sum of all realized borrowed principals
    pub total_borrows: u64,
}

impl AssetConfig {
    pub const LEN: usize = 32 + // mint
        32 + // vault
        1 + // decimals
        8 + // price_usd
        1 + // is_supported
        8 + // total_deposits
        8; // total_borrows

    pub fn new(mint: Pubkey, vault: Pubkey, decimals: u8) -> Self {
        Self {
            mint,
            vault,
            decimals,
            price_usd: 0,
            is_supported: true,
            total_deposits: 0,
            total_borrows: 0,
        }
    }

    /// Deposits not currently lent out
    pub fn available_liquidity(&self) -> u64 {
        self.total_deposits.saturating_sub(self.total_borrows)
    }

    pub fn usd_value(&self, amount: u64) -> Result<u128, ProgramError> {
        math::usd_value(amount, self.decimals, self.price_usd)
    }

    pub fn usd_value_ceil(&self, amount: u64) -> Result<u128, ProgramError> {
        math::usd_value_ceil(amount, self.decimals, self.price_usd)
    }

    pub fn add_deposits(&mut self, amount: u64) -> Result<(), ProgramError> {
        self.total_deposits = self
            .total_deposits
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn sub_deposits(&mut self, amount: u64) {
        self.total_deposits = self.total_deposits.saturating_sub(amount);
    }

    pub fn add_borrows(&mut self, amount: u64) -> Result<(), ProgramError> {
        self.total_borrows = self
            .total_borrows
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn sub_borrows(&mut self, amount: u64) {
        self.total_borrows = self.total_borrows.saturating_sub(amount);
    }
}
