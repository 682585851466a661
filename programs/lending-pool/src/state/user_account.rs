use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{constants::MAX_ASSETS, error::LendingError};

/// Per-user ledger: one position per touched asset
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized
    pub is_initialized: bool,

    /// Pool this account belongs to
    pub pool: Pubkey,

    /// Wallet owning the positions
    pub owner: Pubkey,

    /// PDA bump
    pub bump: u8,

    /// Positions, created zero-valued on first touch
    pub positions: Vec<Position>,
}

/// Balance of one user in one asset
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Asset mint
    pub asset: Pubkey,

    /// Collateral supplied
    pub deposited_amount: u64,

    /// Debt with interest realized up to `last_accrual_timestamp`
    pub borrowed_principal: u64,

    /// Unix timestamp of the last realization, 0 while there is no debt
    pub last_accrual_timestamp: i64,
}

impl Position {
    pub const LEN: usize = 32 + 8 + 8 + 8;

    pub fn empty(asset: Pubkey) -> Self {
        Self {
            asset,
            deposited_amount: 0,
            borrowed_principal: 0,
            last_accrual_timestamp: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deposited_amount == 0 && self.borrowed_principal == 0
    }
}

impl UserAccount {
    pub const DISCRIMINATOR: [u8; 8] = [85, 83, 82, 95, 65, 67, 67, 84]; // "USR_ACCT"

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // pool
        32 + // owner
        1 + // bump
        4 + (MAX_ASSETS * Position::LEN) + // positions vec
        32; // padding

    pub fn new(pool: Pubkey, owner: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            pool,
            owner,
            bump,
            positions: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        if !self.is_initialized {
            return Err(LendingError::AccountNotInitialized.into());
        }

        Ok(())
    }

    /// Position for `asset`, zero-valued if never touched
    pub fn position(&self, asset: &Pubkey) -> Position {
        self.positions
            .iter()
            .find(|p| p.asset == *asset)
            .copied()
            .unwrap_or_else(|| Position::empty(*asset))
    }

    /// Write back a position, creating the slot on first touch
    pub fn set_position(&mut self, position: Position) -> Result<(), ProgramError> {
        if let Some(existing) = self.positions.iter_mut().find(|p| p.asset == position.asset) {
            *existing = position;
            return Ok(());
        }

        // Untouched and still zero: nothing to record
        if position.is_empty() {
            return Ok(());
        }

        if self.positions.len() >= MAX_ASSETS {
            return Err(LendingError::TooManyAssets.into());
        }

        self.positions.push(position);
        Ok(())
    }

    pub fn has_debt(&self) -> bool {
        self.positions.iter().any(|p| p.borrowed_principal > 0)
    }
}
