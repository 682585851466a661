use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::*,
    error::LendingError,
    state::AssetConfig,
};

/// Pool account: asset registry, risk parameters and vault authority
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct LendingPool {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized flag
    pub is_initialized: bool,

    /// Admin allowed to list assets, set prices and tune risk parameters
    pub authority: Pubkey,

    /// PDA bump
    pub bump: u8,

    /// Risk parameters
    pub risk_params: RiskParameters,

    /// Asset registry. Entries are never removed.
    pub assets: Vec<AssetConfig>,

    /// Last admin update timestamp
    pub last_update: i64,
}

/// Protocol-wide risk parameters
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskParameters {
    /// Annual linear interest rate in basis points (default: 1_000 = 10%)
    pub interest_rate_bps: u16,

    /// Share of collateral value counted against debt (default: 8_000 = 80%)
    pub liquidation_threshold_bps: u16,

    /// Extra collateral paid to liquidators on top of the repaid value
    /// (default: 0)
    pub liquidation_bonus_bps: u16,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            interest_rate_bps: DEFAULT_INTEREST_RATE_BPS,
            liquidation_threshold_bps: DEFAULT_LIQUIDATION_THRESHOLD_BPS,
            liquidation_bonus_bps: DEFAULT_LIQUIDATION_BONUS_BPS,
        }
    }
}

impl RiskParameters {
    pub const LEN: usize = 2 + 2 + 2;

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.liquidation_threshold_bps == 0
            || self.liquidation_threshold_bps as u64 > BPS_DENOMINATOR
        {
            return Err(LendingError::InvalidRiskParameters.into());
        }

        if self.liquidation_bonus_bps > MAX_LIQUIDATION_BONUS_BPS {
            return Err(LendingError::InvalidRiskParameters.into());
        }

        Ok(())
    }
}

impl LendingPool {
    pub const DISCRIMINATOR: [u8; 8] = [76, 69, 78, 68, 95, 80, 76, 76]; // "LEND_PLL"

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // authority
        1 + // bump
        RiskParameters::LEN +
        4 + (MAX_ASSETS * AssetConfig::LEN) + // assets vec
        8 + // last_update
        64; // padding

    pub fn new(authority: Pubkey, bump: u8, risk_params: RiskParameters) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            authority,
            bump,
            risk_params,
            assets: Vec::new(),
            last_update: 0,
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

    pub fn require_authority(&self, signer: &Pubkey) -> Result<(), ProgramError> {
        if self.authority != *signer {
            return Err(LendingError::Unauthorized.into());
        }
        Ok(())
    }

    pub fn find_asset(&self, mint: &Pubkey) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.mint == *mint && a.is_supported)
    }

    /// Registered and supported asset, or `AssetNotSupported`
    pub fn asset(&self, mint: &Pubkey) -> Result<&AssetConfig, ProgramError> {
        self.find_asset(mint)
            .ok_or_else(|| LendingError::AssetNotSupported.into())
    }

    pub fn asset_mut(&mut self, mint: &Pubkey) -> Result<&mut AssetConfig, ProgramError> {
        self.assets
            .iter_mut()
            .find(|a| a.mint == *mint && a.is_supported)
            .ok_or_else(|| LendingError::AssetNotSupported.into())
    }

    pub fn supported_assets(&self) -> impl Iterator<Item = &AssetConfig> {
        self.assets.iter().filter(|a| a.is_supported)
    }

    pub fn add_asset(&mut self, asset: AssetConfig) -> Result<(), ProgramError> {
        if self.assets.iter().any(|a| a.mint == asset.mint) {
            return Err(LendingError::AssetAlreadySupported.into());
        }

        if self.assets.len() >= MAX_ASSETS {
            return Err(LendingError::TooManyAssets.into());
        }

        self.assets.push(asset);
        Ok(())
    }
}
