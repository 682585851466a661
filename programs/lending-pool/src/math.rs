use solana_program::program_error::ProgramError;

use crate::{
    constants::{HEALTH_FACTOR_INFINITE, HEALTH_FACTOR_ONE, PRICE_SCALE},
    error::LendingError,
};

/// `a * b / c` rounded down, checked
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, ProgramError> {
    if c == 0 {
        return Err(LendingError::ArithmeticOverflow.into());
    }
    a.checked_mul(b)
        .map(|product| product / c)
        .ok_or_else(|| LendingError::ArithmeticOverflow.into())
}

/// `a * b / c` rounded up, checked
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> Result<u128, ProgramError> {
    if c == 0 {
        return Err(LendingError::ArithmeticOverflow.into());
    }
    let product = a
        .checked_mul(b)
        .ok_or(LendingError::ArithmeticOverflow)?;
    let quotient = product / c;
    if product % c == 0 {
        Ok(quotient)
    } else {
        quotient
            .checked_add(1)
            .ok_or_else(|| LendingError::ArithmeticOverflow.into())
    }
}

/// 10^decimals as u128
pub fn pow10(decimals: u8) -> Result<u128, ProgramError> {
    10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| LendingError::ArithmeticOverflow.into())
}

/// USD value (6 decimals) of a token amount, rounded down
pub fn usd_value(amount: u64, decimals: u8, price_usd: u64) -> Result<u128, ProgramError> {
    mul_div(amount as u128, price_usd as u128, pow10(decimals)?)
}

/// USD value (6 decimals) of a token amount, rounded up
pub fn usd_value_ceil(amount: u64, decimals: u8, price_usd: u64) -> Result<u128, ProgramError> {
    mul_div_ceil(amount as u128, price_usd as u128, pow10(decimals)?)
}

/// Token amount worth `usd` at `price_usd`, rounded down.
/// A zero price yields `u64::MAX` so callers cap it at what is available.
pub fn token_amount(usd: u128, decimals: u8, price_usd: u64) -> Result<u64, ProgramError> {
    if price_usd == 0 {
        return Ok(u64::MAX);
    }
    let amount = mul_div(usd, pow10(decimals)?, price_usd as u128)?;
    Ok(amount.min(u64::MAX as u128) as u64)
}

/// Scale a value by `bps / 10_000`
pub fn apply_bps(value: u128, bps: u64) -> Result<u128, ProgramError> {
    mul_div(value, bps as u128, crate::constants::BPS_DENOMINATOR as u128)
}

/// collateral * threshold / debt as a 6-decimal fixed point;
/// infinite when there is no debt
pub fn health_factor(
    collateral_usd: u128,
    debt_usd: u128,
    liquidation_threshold_bps: u16,
) -> Result<u128, ProgramError> {
    if debt_usd == 0 {
        return Ok(HEALTH_FACTOR_INFINITE);
    }
    let adjusted = apply_bps(
        collateral_usd
            .checked_mul(HEALTH_FACTOR_ONE)
            .ok_or(LendingError::ArithmeticOverflow)?,
        liquidation_threshold_bps as u64,
    )?;
    Ok(adjusted / debt_usd)
}

/// Whole USD for log lines
pub fn usd_to_display(value: u128) -> u128 {
    value / PRICE_SCALE as u128
}
