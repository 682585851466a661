//! Linear interest accrual
//!
//! Debt grows at a single protocol-wide annual rate. `accrued` is a pure
//! read; `realize` folds the accrued amount into principal and must run
//! before any principal mutation.

use solana_program::{msg, program_error::ProgramError};

use crate::{
    constants::{BPS_DENOMINATOR, SECONDS_PER_YEAR},
    error::LendingError,
    math::mul_div,
    state::{AssetConfig, Position},
};

/// Interest accrued on `position` since its last realization
pub fn accrued(position: &Position, rate_bps: u16, now: i64) -> Result<u64, ProgramError> {
    if position.borrowed_principal == 0 || position.last_accrual_timestamp == 0 {
        return Ok(0);
    }

    let elapsed = now.saturating_sub(position.last_accrual_timestamp).max(0) as u128;
    if elapsed == 0 {
        return Ok(0);
    }

    let interest = mul_div(
        position.borrowed_principal as u128 * rate_bps as u128,
        elapsed,
        BPS_DENOMINATOR as u128 * SECONDS_PER_YEAR as u128,
    )?;

    u64::try_from(interest).map_err(|_| LendingError::ArithmeticOverflow.into())
}

/// Principal plus unrealized interest
pub fn accrued_debt(position: &Position, rate_bps: u16, now: i64) -> Result<u64, ProgramError> {
    position
        .borrowed_principal
        .checked_add(accrued(position, rate_bps, now)?)
        .ok_or_else(|| LendingError::ArithmeticOverflow.into())
}

/// Fold accrued interest into principal and restart the clock.
///
/// The pool's `total_borrows` grows by the same amount. Returns the
/// interest realized.
pub fn realize(
    position: &mut Position,
    asset: &mut AssetConfig,
    rate_bps: u16,
    now: i64,
) -> Result<u64, ProgramError> {
    let interest = accrued(position, rate_bps, now)?;

    if interest > 0 {
        position.borrowed_principal = position
            .borrowed_principal
            .checked_add(interest)
            .ok_or(LendingError::ArithmeticOverflow)?;
        asset.add_borrows(interest)?;
        msg!("Realized {} interest on {}", interest, position.asset);
    }

    position.last_accrual_timestamp = if position.borrowed_principal > 0 {
        now.max(position.last_accrual_timestamp)
    } else {
        0
    };

    Ok(interest)
}
