//! Liquidation math and unsafe-account discovery

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::BPS_DENOMINATOR,
    error::LendingError,
    math,
    risk::{self, AccountSnapshot},
    state::{AssetConfig, LendingPool, UserAccount},
};

/// Account eligible for liquidation
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct LiquidationCandidate {
    pub owner: Pubkey,
    pub snapshot: AccountSnapshot,
}

impl LiquidationCandidate {
    pub const LEN: usize = 32 + // owner
        16 + // total_collateral_usd
        16 + // total_debt_usd
        16; // health_factor
}

/// Snapshot of `account`, or `NotLiquidatable` unless its health factor is
/// strictly below 1.0
pub fn require_liquidatable(
    pool: &LendingPool,
    account: &UserAccount,
    now: i64,
) -> Result<AccountSnapshot, ProgramError> {
    let snapshot = risk::account_snapshot(pool, account, now)?;
    if !snapshot.is_liquidatable() {
        return Err(LendingError::NotLiquidatable.into());
    }
    Ok(snapshot)
}

/// Collateral owed to a liquidator for repaying `repay_amount` of debt.
///
/// seized_usd = repay_usd * (1 + bonus), converted at the collateral price
/// and capped at `available`. A zero collateral price seizes everything.
pub fn seized_collateral(
    debt_asset: &AssetConfig,
    collateral_asset: &AssetConfig,
    repay_amount: u64,
    liquidation_bonus_bps: u16,
    available: u64,
) -> Result<u64, ProgramError> {
    let repay_usd = debt_asset.usd_value(repay_amount)?;
    let seized_usd = math::apply_bps(
        repay_usd,
        BPS_DENOMINATOR + liquidation_bonus_bps as u64,
    )?;

    let seized = math::token_amount(
        seized_usd,
        collateral_asset.decimals,
        collateral_asset.price_usd,
    )?;

    Ok(seized.min(available))
}

/// Accounts with health factor below 1.0, most unsafe first
pub fn scan_liquidatable<'a, I>(
    pool: &LendingPool,
    accounts: I,
    now: i64,
) -> Result<Vec<LiquidationCandidate>, ProgramError>
where
    I: IntoIterator<Item = &'a UserAccount>,
{
    let mut candidates: Vec<LiquidationCandidate> = Vec::new();

    for account in accounts {
        let snapshot = risk::account_snapshot(pool, account, now)?;
        if !snapshot.is_liquidatable() {
            continue;
        }

        let entry = LiquidationCandidate {
            owner: account.owner,
            snapshot,
        };

        // Insert sorted by health factor
        let insert_pos = candidates
            .iter()
            .position(|c| c.snapshot.health_factor > snapshot.health_factor)
            .unwrap_or(candidates.len());
        candidates.insert(insert_pos, entry);
    }

    Ok(candidates)
}
