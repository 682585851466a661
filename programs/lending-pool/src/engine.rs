use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::MAX_ASSET_DECIMALS,
    error::LendingError,
    events::{
        AssetAdded, AssetPriceUpdated, Borrow, Deposit, Liquidation, Repay,
        RiskParametersUpdated, Withdraw,
    },
    interest, liquidation,
    math::usd_to_display,
    risk::{self, AccountSnapshot, PositionOverview},
    state::{AssetConfig, LendingPool, RiskParameters, UserAccount},
    transfer::TokenTransfer,
};

/// Lending engine.
///
/// Every mutating operation builds the proposed next pool and account
/// state from clones, validates it, performs the token transfers and only
/// then commits. An error leaves `pool` and the accounts untouched.
pub struct LendingEngine;

impl LendingEngine {
    // === Admin ===

    pub fn initialize_pool(
        authority: Pubkey,
        bump: u8,
        risk_params: RiskParameters,
        now: i64,
    ) -> Result<LendingPool, ProgramError> {
        risk_params.validate()?;

        let mut pool = LendingPool::new(authority, bump, risk_params);
        pool.last_update = now;

        msg!(
            "Pool initialized - rate: {} bps, threshold: {} bps, bonus: {} bps",
            risk_params.interest_rate_bps,
            risk_params.liquidation_threshold_bps,
            risk_params.liquidation_bonus_bps
        );

        Ok(pool)
    }

    /// List `mint` with price 0. It can be deposited right away but not
    /// borrowed until a price is set.
    pub fn add_supported_asset(
        pool: &mut LendingPool,
        signer: &Pubkey,
        mint: Pubkey,
        vault: Pubkey,
        decimals: u8,
        now: i64,
    ) -> Result<AssetAdded, ProgramError> {
        pool.require_authority(signer)?;

        if decimals > MAX_ASSET_DECIMALS {
            return Err(LendingError::InvalidTokenAccount.into());
        }

        pool.add_asset(AssetConfig::new(mint, vault, decimals))?;
        pool.last_update = now;

        msg!("Asset {} added with {} decimals", mint, decimals);

        Ok(AssetAdded {
            asset: mint,
            vault,
            decimals,
        })
    }

    pub fn set_asset_price(
        pool: &mut LendingPool,
        signer: &Pubkey,
        mint: &Pubkey,
        price_usd: u64,
        now: i64,
    ) -> Result<AssetPriceUpdated, ProgramError> {
        pool.require_authority(signer)?;

        let asset = pool.asset_mut(mint)?;
        let old_price_usd = asset.price_usd;
        asset.price_usd = price_usd;
        pool.last_update = now;

        msg!("Price of {} set: {} -> {}", mint, old_price_usd, price_usd);

        Ok(AssetPriceUpdated {
            asset: *mint,
            old_price_usd,
            new_price_usd: price_usd,
            timestamp: now,
        })
    }

    pub fn update_risk_parameters(
        pool: &mut LendingPool,
        signer: &Pubkey,
        interest_rate_bps: Option<u16>,
        liquidation_threshold_bps: Option<u16>,
        liquidation_bonus_bps: Option<u16>,
        now: i64,
    ) -> Result<RiskParametersUpdated, ProgramError> {
        pool.require_authority(signer)?;

        let mut params = pool.risk_params;
        if let Some(value) = interest_rate_bps {
            params.interest_rate_bps = value;
        }
        if let Some(value) = liquidation_threshold_bps {
            params.liquidation_threshold_bps = value;
        }
        if let Some(value) = liquidation_bonus_bps {
            params.liquidation_bonus_bps = value;
        }

        params.validate()?;

        pool.risk_params = params;
        pool.last_update = now;

        msg!("Risk parameters updated");

        Ok(RiskParametersUpdated {
            interest_rate_bps: params.interest_rate_bps,
            liquidation_threshold_bps: params.liquidation_threshold_bps,
            liquidation_bonus_bps: params.liquidation_bonus_bps,
        })
    }

    // === Positions ===

    pub fn deposit<T: TokenTransfer>(
        pool: &mut LendingPool,
        account: &mut UserAccount,
        asset: &Pubkey,
        amount: u64,
        transfer: &mut T,
    ) -> Result<Deposit, ProgramError> {
        if amount == 0 {
            return Err(LendingError::AmountCantBeZero.into());
        }

        let mut next_pool = pool.clone();
        let mut next_account = account.clone();

        next_pool.asset_mut(asset)?.add_deposits(amount)?;

        let mut position = next_account.position(asset);
        position.deposited_amount = position
            .deposited_amount
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        next_account.set_position(position)?;

        transfer.pull(&account.owner, asset, amount)?;

        *pool = next_pool;
        *account = next_account;

        msg!("Deposited {} of {}", amount, asset);

        Ok(Deposit {
            user: account.owner,
            asset: *asset,
            amount,
        })
    }

    pub fn withdraw<T: TokenTransfer>(
        pool: &mut LendingPool,
        account: &mut UserAccount,
        asset: &Pubkey,
        amount: u64,
        now: i64,
        transfer: &mut T,
    ) -> Result<Withdraw, ProgramError> {
        if amount == 0 {
            return Err(LendingError::AmountCantBeZero.into());
        }

        let mut next_pool = pool.clone();
        let mut next_account = account.clone();

        let mut position = next_account.position(asset);
        next_pool.asset(asset)?;
        if amount > position.deposited_amount {
            return Err(LendingError::InsufficientBalance.into());
        }

        position.deposited_amount -= amount;
        next_account.set_position(position)?;
        next_pool.asset_mut(asset)?.sub_deposits(amount);

        // Collateral side only: debt is unaffected by a withdrawal
        let snapshot = risk::require_healthy(&next_pool, &next_account, now)?;

        transfer.push(&account.owner, asset, amount)?;

        *pool = next_pool;
        *account = next_account;

        msg!(
            "Withdrew {} of {} - collateral: ${}",
            amount,
            asset,
            usd_to_display(snapshot.total_collateral_usd)
        );

        Ok(Withdraw {
            user: account.owner,
            asset: *asset,
            amount,
        })
    }

    pub fn borrow<T: TokenTransfer>(
        pool: &mut LendingPool,
        account: &mut UserAccount,
        asset: &Pubkey,
        amount: u64,
        now: i64,
        transfer: &mut T,
    ) -> Result<Borrow, ProgramError> {
        if amount == 0 {
            return Err(LendingError::AmountCantBeZero.into());
        }

        let mut next_pool = pool.clone();
        let mut next_account = account.clone();
        let rate = next_pool.risk_params.interest_rate_bps;

        let config = next_pool.asset(asset)?;
        // Debt in an unpriced asset would be valued at $0
        if config.price_usd == 0 {
            return Err(LendingError::AssetNotSupported.into());
        }
        if config.available_liquidity() < amount {
            return Err(LendingError::InsufficientBalance.into());
        }

        let mut position = next_account.position(asset);
        let asset_config = next_pool.asset_mut(asset)?;
        interest::realize(&mut position, asset_config, rate, now)?;

        position.borrowed_principal = position
            .borrowed_principal
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        position.last_accrual_timestamp = now.max(position.last_accrual_timestamp);
        asset_config.add_borrows(amount)?;
        next_account.set_position(position)?;

        let snapshot = risk::require_healthy(&next_pool, &next_account, now)?;

        transfer.push(&account.owner, asset, amount)?;

        *pool = next_pool;
        *account = next_account;

        msg!(
            "Borrowed {} of {} - health factor: {}",
            amount,
            asset,
            snapshot.health_factor
        );

        Ok(Borrow {
            user: account.owner,
            asset: *asset,
            amount,
        })
    }

    pub fn repay<T: TokenTransfer>(
        pool: &mut LendingPool,
        account: &mut UserAccount,
        asset: &Pubkey,
        amount: u64,
        now: i64,
        transfer: &mut T,
    ) -> Result<Repay, ProgramError> {
        if amount == 0 {
            return Err(LendingError::AmountCantBeZero.into());
        }

        let mut next_pool = pool.clone();
        let mut next_account = account.clone();
        let rate = next_pool.risk_params.interest_rate_bps;

        let mut position = next_account.position(asset);
        let asset_config = next_pool.asset_mut(asset)?;
        interest::realize(&mut position, asset_config, rate, now)?;

        let actual_repaid = amount.min(position.borrowed_principal);
        position.borrowed_principal -= actual_repaid;
        if position.borrowed_principal == 0 {
            position.last_accrual_timestamp = 0;
        }
        asset_config.sub_borrows(actual_repaid);
        next_account.set_position(position)?;

        if actual_repaid > 0 {
            transfer.pull(&account.owner, asset, actual_repaid)?;
        }

        *pool = next_pool;
        *account = next_account;

        msg!(
            "Repaid {} of {} (requested {}), remaining principal {}",
            actual_repaid,
            asset,
            amount,
            position.borrowed_principal
        );

        Ok(Repay {
            user: account.owner,
            asset: *asset,
            actual_repaid,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn liquidate<T: TokenTransfer>(
        pool: &mut LendingPool,
        borrower: &mut UserAccount,
        liquidator: &Pubkey,
        debt_asset: &Pubkey,
        collateral_asset: &Pubkey,
        repay_amount: u64,
        now: i64,
        transfer: &mut T,
    ) -> Result<Liquidation, ProgramError> {
        if repay_amount == 0 {
            return Err(LendingError::AmountCantBeZero.into());
        }

        let mut next_pool = pool.clone();
        let mut next_account = borrower.clone();
        let params = next_pool.risk_params;

        let debt_config = next_pool.asset(debt_asset)?.clone();
        let collateral_config = next_pool.asset(collateral_asset)?.clone();

        let snapshot = liquidation::require_liquidatable(&next_pool, &next_account, now)?;

        // Repay side
        let mut debt_position = next_account.position(debt_asset);
        let debt_asset_config = next_pool.asset_mut(debt_asset)?;
        interest::realize(&mut debt_position, debt_asset_config, params.interest_rate_bps, now)?;

        let actual_repay = repay_amount.min(debt_position.borrowed_principal);
        if actual_repay == 0 {
            return Err(LendingError::NotLiquidatable.into());
        }

        debt_position.borrowed_principal -= actual_repay;
        if debt_position.borrowed_principal == 0 {
            debt_position.last_accrual_timestamp = 0;
        }
        debt_asset_config.sub_borrows(actual_repay);
        next_account.set_position(debt_position)?;

        // Seize side; re-read so a same-asset liquidation sees the repay
        let mut collateral_position = next_account.position(collateral_asset);
        let seized_amount = liquidation::seized_collateral(
            &debt_config,
            &collateral_config,
            actual_repay,
            params.liquidation_bonus_bps,
            collateral_position.deposited_amount,
        )?;

        collateral_position.deposited_amount -= seized_amount;
        next_account.set_position(collateral_position)?;
        next_pool.asset_mut(collateral_asset)?.sub_deposits(seized_amount);

        transfer.pull(liquidator, debt_asset, actual_repay)?;
        if seized_amount > 0 {
            transfer.push(liquidator, collateral_asset, seized_amount)?;
        }

        *pool = next_pool;
        *borrower = next_account;

        msg!(
            "Liquidated {}: repaid {} of {}, seized {} of {} (health factor was {})",
            borrower.owner,
            actual_repay,
            debt_asset,
            seized_amount,
            collateral_asset,
            snapshot.health_factor
        );

        Ok(Liquidation {
            liquidator: *liquidator,
            borrower: borrower.owner,
            debt_asset: *debt_asset,
            collateral_asset: *collateral_asset,
            repay_amount: actual_repay,
            seized_amount,
        })
    }

    // === Queries ===

    pub fn get_account_data(
        pool: &LendingPool,
        account: &UserAccount,
        now: i64,
    ) -> Result<AccountSnapshot, ProgramError> {
        risk::account_snapshot(pool, account, now)
    }

    pub fn get_accrued_debt(
        pool: &LendingPool,
        account: &UserAccount,
        asset: &Pubkey,
        now: i64,
    ) -> Result<u64, ProgramError> {
        pool.asset(asset)?;
        interest::accrued_debt(
            &account.position(asset),
            pool.risk_params.interest_rate_bps,
            now,
        )
    }

    pub fn get_position_overview(
        pool: &LendingPool,
        account: &UserAccount,
        now: i64,
    ) -> Result<PositionOverview, ProgramError> {
        risk::position_overview(pool, account, now)
    }
}
