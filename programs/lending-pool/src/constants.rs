//! Protocol constants

/// Seed of the pool PDA (registry, risk parameters, vault authority)
pub const POOL_SEED: &[u8] = b"lending_pool";

/// Seed of the per-user position account PDA
pub const USER_ACCOUNT_SEED: &[u8] = b"user_account";

/// Basis point denominator (10_000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Linear interest is computed over a 365 day year
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// USD prices and USD values use 6 decimals (1_000_000 = $1.00)
pub const PRICE_SCALE: u64 = 1_000_000;

/// Health factor fixed point (1_000_000 = 1.0)
pub const HEALTH_FACTOR_ONE: u128 = 1_000_000;

/// Health factor reported when an account has no debt
pub const HEALTH_FACTOR_INFINITE: u128 = u128::MAX;

/// Default protocol-wide annual rate: 10%
pub const DEFAULT_INTEREST_RATE_BPS: u16 = 1_000;

/// Default liquidation threshold: 80% of collateral value
pub const DEFAULT_LIQUIDATION_THRESHOLD_BPS: u16 = 8_000;

/// Default liquidation bonus paid in seized collateral: none
pub const DEFAULT_LIQUIDATION_BONUS_BPS: u16 = 0;

/// Upper bound on the liquidation bonus (50%)
pub const MAX_LIQUIDATION_BONUS_BPS: u16 = 5_000;

/// Maximum number of assets the registry (and a user account) can hold
pub const MAX_ASSETS: usize = 16;

/// Largest mint precision the USD conversion supports
pub const MAX_ASSET_DECIMALS: u8 = 18;
