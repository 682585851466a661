//! Risk engine: USD aggregation and health factor
//!
//! Every figure is computed on demand from positions and current prices.
//! Collateral is valued rounding down and debt rounding up so that rounding
//! never makes an account look safer than it is.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::{HEALTH_FACTOR_INFINITE, HEALTH_FACTOR_ONE},
    error::LendingError,
    interest, math,
    state::{LendingPool, UserAccount},
};

/// Aggregated account figures (USD with 6 decimals)
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub total_collateral_usd: u128,
    pub total_debt_usd: u128,
    /// 6-decimal fixed point, `u128::MAX` when there is no debt
    pub health_factor: u128,
}

impl AccountSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.health_factor >= HEALTH_FACTOR_ONE
    }

    pub fn is_liquidatable(&self) -> bool {
        self.health_factor < HEALTH_FACTOR_ONE
    }

    pub fn has_debt(&self) -> bool {
        self.total_debt_usd > 0
    }

    pub fn health_factor_is_infinite(&self) -> bool {
        self.health_factor == HEALTH_FACTOR_INFINITE
    }
}

/// One row of a user's position overview
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PositionView {
    pub asset: Pubkey,
    pub deposited_amount: u64,
    pub accrued_debt: u64,
    pub deposited_usd: u128,
    pub debt_usd: u128,
    /// deposited_usd - debt_usd
    pub net_usd: i128,
}

impl PositionView {
    pub const LEN: usize = 32 + // asset
        8 + // deposited_amount
        8 + // accrued_debt
        16 + // deposited_usd
        16 + // debt_usd
        16; // net_usd
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PositionOverview {
    pub positions: Vec<PositionView>,
    pub net_worth_usd: i128,
}

impl PositionOverview {
    pub fn encoded_len(&self) -> usize {
        4 + self.positions.len() * PositionView::LEN + 16
    }

    /// Shrink the row list until the encoding fits in `max_len` bytes.
    /// Untouched assets are dropped first, then trailing rows.
    /// `net_worth_usd` still covers every asset.
    pub fn fit_to(&mut self, max_len: usize) {
        if self.encoded_len() <= max_len {
            return;
        }

        self.positions
            .retain(|p| p.deposited_amount > 0 || p.accrued_debt > 0);

        let max_rows = max_len.saturating_sub(4 + 16) / PositionView::LEN;
        self.positions.truncate(max_rows);
    }
}

/// Collateral and debt totals plus health factor, over every supported asset
pub fn account_snapshot(
    pool: &LendingPool,
    account: &UserAccount,
    now: i64,
) -> Result<AccountSnapshot, ProgramError> {
    let rate = pool.risk_params.interest_rate_bps;
    let mut total_collateral_usd: u128 = 0;
    let mut total_debt_usd: u128 = 0;

    for asset in pool.supported_assets() {
        let position = account.position(&asset.mint);
        if position.is_empty() {
            continue;
        }

        let collateral = asset.usd_value(position.deposited_amount)?;
        let debt = asset.usd_value_ceil(interest::accrued_debt(&position, rate, now)?)?;

        total_collateral_usd = total_collateral_usd
            .checked_add(collateral)
            .ok_or(LendingError::ArithmeticOverflow)?;
        total_debt_usd = total_debt_usd
            .checked_add(debt)
            .ok_or(LendingError::ArithmeticOverflow)?;
    }

    let health_factor = math::health_factor(
        total_collateral_usd,
        total_debt_usd,
        pool.risk_params.liquidation_threshold_bps,
    )?;

    Ok(AccountSnapshot {
        total_collateral_usd,
        total_debt_usd,
        health_factor,
    })
}

/// Reject a proposed account state whose health factor is below 1.0
pub fn require_healthy(
    pool: &LendingPool,
    proposed: &UserAccount,
    now: i64,
) -> Result<AccountSnapshot, ProgramError> {
    let snapshot = account_snapshot(pool, proposed, now)?;
    if snapshot.has_debt() && !snapshot.is_healthy() {
        return Err(LendingError::InsufficientCollateral.into());
    }
    Ok(snapshot)
}

/// Per-asset breakdown with USD values and net worth
pub fn position_overview(
    pool: &LendingPool,
    account: &UserAccount,
    now: i64,
) -> Result<PositionOverview, ProgramError> {
    let rate = pool.risk_params.interest_rate_bps;
    let mut positions = Vec::new();
    let mut net_worth_usd: i128 = 0;

    for asset in pool.supported_assets() {
        let position = account.position(&asset.mint);
        let accrued_debt = interest::accrued_debt(&position, rate, now)?;
        let deposited_usd = asset.usd_value(position.deposited_amount)?;
        let debt_usd = asset.usd_value_ceil(accrued_debt)?;
        let net_usd = to_i128(deposited_usd)? - to_i128(debt_usd)?;

        net_worth_usd = net_worth_usd
            .checked_add(net_usd)
            .ok_or(LendingError::ArithmeticOverflow)?;

        positions.push(PositionView {
            asset: asset.mint,
            deposited_amount: position.deposited_amount,
            accrued_debt,
            deposited_usd,
            debt_usd,
            net_usd,
        });
    }

    Ok(PositionOverview {
        positions,
        net_worth_usd,
    })
}

fn to_i128(value: u128) -> Result<i128, ProgramError> {
    i128::try_from(value).map_err(|_| LendingError::ArithmeticOverflow.into())
}
