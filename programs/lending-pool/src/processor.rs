use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke_signed, set_return_data, MAX_RETURN_DATA},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::{clock::Clock, Sysvar},
};

use crate::{
    constants::{POOL_SEED, USER_ACCOUNT_SEED},
    engine::LendingEngine,
    error::LendingError,
    events::{Event, PoolInitialized},
    instructions::LendingInstruction,
    liquidation::{self, LiquidationCandidate},
    state::{LendingPool, RiskParameters, UserAccount},
    transfer::{self, SplTokenTransfer, TransferLeg},
};

pub struct Processor;

impl Processor {
    fn borsh_deserialize_unchecked<T: BorshDeserialize>(data: &[u8]) -> Result<T, ProgramError> {
        let mut cursor: &[u8] = data;
        T::deserialize(&mut cursor).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LendingInstruction::unpack(instruction_data)?;

        match instruction {
            LendingInstruction::InitializePool {
                interest_rate_bps,
                liquidation_threshold_bps,
                liquidation_bonus_bps,
            } => {
                msg!("Instruction: InitializePool");
                Self::process_initialize_pool(
                    program_id,
                    accounts,
                    interest_rate_bps,
                    liquidation_threshold_bps,
                    liquidation_bonus_bps,
                )
            }
            LendingInstruction::AddSupportedAsset => {
                msg!("Instruction: AddSupportedAsset");
                Self::process_add_supported_asset(program_id, accounts)
            }
            LendingInstruction::SetAssetPrice { asset, price_usd } => {
                msg!("Instruction: SetAssetPrice");
                Self::process_set_asset_price(program_id, accounts, asset, price_usd)
            }
            LendingInstruction::UpdateRiskParameters {
                interest_rate_bps,
                liquidation_threshold_bps,
                liquidation_bonus_bps,
            } => {
                msg!("Instruction: UpdateRiskParameters");
                Self::process_update_risk_parameters(
                    program_id,
                    accounts,
                    interest_rate_bps,
                    liquidation_threshold_bps,
                    liquidation_bonus_bps,
                )
            }
            LendingInstruction::Deposit { asset, amount } => {
                msg!("Instruction: Deposit");
                Self::process_deposit(program_id, accounts, asset, amount)
            }
            LendingInstruction::Withdraw { asset, amount } => {
                msg!("Instruction: Withdraw");
                Self::process_withdraw(program_id, accounts, asset, amount)
            }
            LendingInstruction::Borrow { asset, amount } => {
                msg!("Instruction: Borrow");
                Self::process_borrow(program_id, accounts, asset, amount)
            }
            LendingInstruction::Repay { asset, amount } => {
                msg!("Instruction: Repay");
                Self::process_repay(program_id, accounts, asset, amount)
            }
            LendingInstruction::Liquidate {
                debt_asset,
                collateral_asset,
                repay_amount,
            } => {
                msg!("Instruction: Liquidate");
                Self::process_liquidate(
                    program_id,
                    accounts,
                    debt_asset,
                    collateral_asset,
                    repay_amount,
                )
            }
            LendingInstruction::GetAccountData => {
                msg!("Instruction: GetAccountData");
                Self::process_get_account_data(program_id, accounts)
            }
            LendingInstruction::GetAccruedDebt { asset } => {
                msg!("Instruction: GetAccruedDebt");
                Self::process_get_accrued_debt(program_id, accounts, asset)
            }
            LendingInstruction::GetPositionOverview => {
                msg!("Instruction: GetPositionOverview");
                Self::process_get_position_overview(program_id, accounts)
            }
            LendingInstruction::ScanLiquidatable => {
                msg!("Instruction: ScanLiquidatable");
                Self::process_scan_liquidatable(program_id, accounts)
            }
        }
    }

    // === Admin ===

    fn process_initialize_pool(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        interest_rate_bps: Option<u16>,
        liquidation_threshold_bps: Option<u16>,
        liquidation_bonus_bps: Option<u16>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (pool_pubkey, pool_bump) = Pubkey::find_program_address(&[POOL_SEED], program_id);
        if pool_pubkey != *pool_info.key {
            return Err(LendingError::InvalidPDA.into());
        }

        if !pool_info.data_is_empty() {
            return Err(LendingError::AccountAlreadyInitialized.into());
        }

        let defaults = RiskParameters::default();
        let risk_params = RiskParameters {
            interest_rate_bps: interest_rate_bps.unwrap_or(defaults.interest_rate_bps),
            liquidation_threshold_bps: liquidation_threshold_bps
                .unwrap_or(defaults.liquidation_threshold_bps),
            liquidation_bonus_bps: liquidation_bonus_bps.unwrap_or(defaults.liquidation_bonus_bps),
        };

        let now = Clock::get()?.unix_timestamp;
        let pool = LendingEngine::initialize_pool(*authority_info.key, pool_bump, risk_params, now)?;

        let rent = Rent::get()?;
        invoke_signed(
            &system_instruction::create_account(
                authority_info.key,
                pool_info.key,
                rent.minimum_balance(LendingPool::LEN),
                LendingPool::LEN as u64,
                program_id,
            ),
            &[
                authority_info.clone(),
                pool_info.clone(),
                system_program_info.clone(),
            ],
            &[&[POOL_SEED, &[pool_bump]]],
        )?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;

        PoolInitialized {
            pool: *pool_info.key,
            authority: *authority_info.key,
            interest_rate_bps: risk_params.interest_rate_bps,
            liquidation_threshold_bps: risk_params.liquidation_threshold_bps,
            liquidation_bonus_bps: risk_params.liquidation_bonus_bps,
        }
        .emit();

        Ok(())
    }

    fn process_add_supported_asset(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let mint_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut pool = Self::load_pool(program_id, pool_info)?;
        pool.require_authority(authority_info.key)?;

        let decimals = transfer::mint_decimals(mint_info)?;
        // Vault must be a token account of this mint controlled by the pool PDA
        transfer::check_token_account(vault_info, mint_info.key, Some(pool_info.key))?;

        let now = Clock::get()?.unix_timestamp;
        let event = LendingEngine::add_supported_asset(
            &mut pool,
            authority_info.key,
            *mint_info.key,
            *vault_info.key,
            decimals,
            now,
        )?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        event.emit();

        Ok(())
    }

    fn process_set_asset_price(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        asset: Pubkey,
        price_usd: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut pool = Self::load_pool(program_id, pool_info)?;
        let now = Clock::get()?.unix_timestamp;
        let event = LendingEngine::set_asset_price(&mut pool, authority_info.key, &asset, price_usd, now)?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        event.emit();

        Ok(())
    }

    fn process_update_risk_parameters(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        interest_rate_bps: Option<u16>,
        liquidation_threshold_bps: Option<u16>,
        liquidation_bonus_bps: Option<u16>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut pool = Self::load_pool(program_id, pool_info)?;
        let now = Clock::get()?.unix_timestamp;
        let event = LendingEngine::update_risk_parameters(
            &mut pool,
            authority_info.key,
            interest_rate_bps,
            liquidation_threshold_bps,
            liquidation_bonus_bps,
            now,
        )?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        event.emit();

        Ok(())
    }

    // === Positions ===

    fn process_deposit(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        asset: Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let user_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let user_account_info = next_account_info(account_info_iter)?;
        let user_token_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !user_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program_info)?;

        let mut pool = Self::load_pool(program_id, pool_info)?;
        Self::check_leg(&pool, &asset, user_token_info, vault_info, user_info.key)?;

        let (mut user_account, _) = Self::load_or_create_user_account(
            program_id,
            pool_info.key,
            user_info,
            user_account_info,
            system_program_info,
        )?;

        let bump = [pool.bump];
        let pool_seeds: &[&[u8]] = &[POOL_SEED, &bump];
        let mut spl = SplTokenTransfer {
            token_program: token_program_info,
            user_authority: user_info,
            pool_authority: pool_info,
            pool_seeds,
            legs: vec![TransferLeg {
                mint: asset,
                user_token: user_token_info,
                vault: vault_info,
            }],
        };

        let event = LendingEngine::deposit(&mut pool, &mut user_account, &asset, amount, &mut spl)?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        user_account.serialize(&mut &mut user_account_info.data.borrow_mut()[..])?;
        event.emit();

        Ok(())
    }

    fn process_withdraw(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        asset: Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let user_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let user_account_info = next_account_info(account_info_iter)?;
        let user_token_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        if !user_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program_info)?;

        let mut pool = Self::load_pool(program_id, pool_info)?;
        Self::check_leg(&pool, &asset, user_token_info, vault_info, user_info.key)?;

        let (mut user_account, exists) =
            Self::load_user_account(program_id, pool_info.key, user_info.key, user_account_info)?;

        let bump = [pool.bump];
        let pool_seeds: &[&[u8]] = &[POOL_SEED, &bump];
        let mut spl = SplTokenTransfer {
            token_program: token_program_info,
            user_authority: user_info,
            pool_authority: pool_info,
            pool_seeds,
            legs: vec![TransferLeg {
                mint: asset,
                user_token: user_token_info,
                vault: vault_info,
            }],
        };

        let now = Clock::get()?.unix_timestamp;
        let event =
            LendingEngine::withdraw(&mut pool, &mut user_account, &asset, amount, now, &mut spl)?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        if exists {
            user_account.serialize(&mut &mut user_account_info.data.borrow_mut()[..])?;
        }
        event.emit();

        Ok(())
    }

    fn process_borrow(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        asset: Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let user_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let user_account_info = next_account_info(account_info_iter)?;
        let user_token_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !user_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program_info)?;

        let mut pool = Self::load_pool(program_id, pool_info)?;
        Self::check_leg(&pool, &asset, user_token_info, vault_info, user_info.key)?;

        let (mut user_account, _) = Self::load_or_create_user_account(
            program_id,
            pool_info.key,
            user_info,
            user_account_info,
            system_program_info,
        )?;

        let bump = [pool.bump];
        let pool_seeds: &[&[u8]] = &[POOL_SEED, &bump];
        let mut spl = SplTokenTransfer {
            token_program: token_program_info,
            user_authority: user_info,
            pool_authority: pool_info,
            pool_seeds,
            legs: vec![TransferLeg {
                mint: asset,
                user_token: user_token_info,
                vault: vault_info,
            }],
        };

        let now = Clock::get()?.unix_timestamp;
        let event =
            LendingEngine::borrow(&mut pool, &mut user_account, &asset, amount, now, &mut spl)?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        user_account.serialize(&mut &mut user_account_info.data.borrow_mut()[..])?;
        event.emit();

        Ok(())
    }

    fn process_repay(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        asset: Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let user_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let user_account_info = next_account_info(account_info_iter)?;
        let user_token_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        if !user_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program_info)?;

        let mut pool = Self::load_pool(program_id, pool_info)?;
        Self::check_leg(&pool, &asset, user_token_info, vault_info, user_info.key)?;

        let (mut user_account, exists) =
            Self::load_user_account(program_id, pool_info.key, user_info.key, user_account_info)?;

        let bump = [pool.bump];
        let pool_seeds: &[&[u8]] = &[POOL_SEED, &bump];
        let mut spl = SplTokenTransfer {
            token_program: token_program_info,
            user_authority: user_info,
            pool_authority: pool_info,
            pool_seeds,
            legs: vec![TransferLeg {
                mint: asset,
                user_token: user_token_info,
                vault: vault_info,
            }],
        };

        let now = Clock::get()?.unix_timestamp;
        let event =
            LendingEngine::repay(&mut pool, &mut user_account, &asset, amount, now, &mut spl)?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        if exists {
            user_account.serialize(&mut &mut user_account_info.data.borrow_mut()[..])?;
        }
        event.emit();

        Ok(())
    }

    fn process_liquidate(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        debt_asset: Pubkey,
        collateral_asset: Pubkey,
        repay_amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let liquidator_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let borrower_account_info = next_account_info(account_info_iter)?;
        let liquidator_debt_token_info = next_account_info(account_info_iter)?;
        let debt_vault_info = next_account_info(account_info_iter)?;
        let liquidator_collateral_token_info = next_account_info(account_info_iter)?;
        let collateral_vault_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        if !liquidator_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program_info)?;

        let mut pool = Self::load_pool(program_id, pool_info)?;
        Self::check_leg(
            &pool,
            &debt_asset,
            liquidator_debt_token_info,
            debt_vault_info,
            liquidator_info.key,
        )?;
        Self::check_leg(
            &pool,
            &collateral_asset,
            liquidator_collateral_token_info,
            collateral_vault_info,
            liquidator_info.key,
        )?;

        let mut borrower = Self::load_existing_user_account(program_id, pool_info.key, borrower_account_info)?;

        let bump = [pool.bump];
        let pool_seeds: &[&[u8]] = &[POOL_SEED, &bump];
        let mut spl = SplTokenTransfer {
            token_program: token_program_info,
            user_authority: liquidator_info,
            pool_authority: pool_info,
            pool_seeds,
            legs: vec![
                TransferLeg {
                    mint: debt_asset,
                    user_token: liquidator_debt_token_info,
                    vault: debt_vault_info,
                },
                TransferLeg {
                    mint: collateral_asset,
                    user_token: liquidator_collateral_token_info,
                    vault: collateral_vault_info,
                },
            ],
        };

        let now = Clock::get()?.unix_timestamp;
        let event = LendingEngine::liquidate(
            &mut pool,
            &mut borrower,
            liquidator_info.key,
            &debt_asset,
            &collateral_asset,
            repay_amount,
            now,
            &mut spl,
        )?;

        pool.serialize(&mut &mut pool_info.data.borrow_mut()[..])?;
        borrower.serialize(&mut &mut borrower_account_info.data.borrow_mut()[..])?;
        event.emit();

        Ok(())
    }

    // === Queries ===

    fn process_get_account_data(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let pool_info = next_account_info(account_info_iter)?;
        let user_account_info = next_account_info(account_info_iter)?;

        let pool = Self::load_pool(program_id, pool_info)?;
        let user_account = Self::load_user_account_for_query(program_id, pool_info.key, user_account_info)?;

        let now = Clock::get()?.unix_timestamp;
        let snapshot = LendingEngine::get_account_data(&pool, &user_account, now)?;

        msg!(
            "Collateral: {} Debt: {} Health factor: {}",
            snapshot.total_collateral_usd,
            snapshot.total_debt_usd,
            snapshot.health_factor
        );
        set_return_data(&snapshot.try_to_vec()?);

        Ok(())
    }

    fn process_get_accrued_debt(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        asset: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let pool_info = next_account_info(account_info_iter)?;
        let user_account_info = next_account_info(account_info_iter)?;

        let pool = Self::load_pool(program_id, pool_info)?;
        let user_account = Self::load_user_account_for_query(program_id, pool_info.key, user_account_info)?;

        let now = Clock::get()?.unix_timestamp;
        let debt = LendingEngine::get_accrued_debt(&pool, &user_account, &asset, now)?;

        msg!("Accrued debt in {}: {}", asset, debt);
        set_return_data(&debt.to_le_bytes());

        Ok(())
    }

    fn process_get_position_overview(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let pool_info = next_account_info(account_info_iter)?;
        let user_account_info = next_account_info(account_info_iter)?;

        let pool = Self::load_pool(program_id, pool_info)?;
        let user_account = Self::load_user_account_for_query(program_id, pool_info.key, user_account_info)?;

        let now = Clock::get()?.unix_timestamp;
        let mut overview = LendingEngine::get_position_overview(&pool, &user_account, now)?;
        overview.fit_to(MAX_RETURN_DATA);

        msg!(
            "Positions: {} Net worth: {}",
            overview.positions.len(),
            overview.net_worth_usd
        );
        set_return_data(&overview.try_to_vec()?);

        Ok(())
    }

    fn process_scan_liquidatable(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let pool_info = next_account_info(account_info_iter)?;

        let pool = Self::load_pool(program_id, pool_info)?;

        let mut user_accounts = Vec::new();
        for info in account_info_iter {
            // Never-touched users have nothing to liquidate
            if info.data_is_empty() {
                continue;
            }
            user_accounts.push(Self::load_existing_user_account(program_id, pool_info.key, info)?);
        }

        let now = Clock::get()?.unix_timestamp;
        let mut candidates = liquidation::scan_liquidatable(&pool, &user_accounts, now)?;

        msg!(
            "Scanned {} accounts, {} liquidatable",
            user_accounts.len(),
            candidates.len()
        );

        // Most unsafe first, so truncation keeps the urgent ones
        candidates.truncate((MAX_RETURN_DATA - 4) / LiquidationCandidate::LEN);
        set_return_data(&candidates.try_to_vec()?);

        Ok(())
    }

    // === Account helpers ===

    fn check_token_program(info: &AccountInfo) -> ProgramResult {
        if *info.key != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(())
    }

    fn load_pool(program_id: &Pubkey, pool_info: &AccountInfo) -> Result<LendingPool, ProgramError> {
        if pool_info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        let pool = Self::borsh_deserialize_unchecked::<LendingPool>(&pool_info.data.borrow())?;
        pool.validate()?;

        let expected = Pubkey::create_program_address(&[POOL_SEED, &[pool.bump]], program_id)
            .map_err(|_| LendingError::InvalidPDA)?;
        if expected != *pool_info.key {
            return Err(LendingError::InvalidPDA.into());
        }

        Ok(pool)
    }

    /// Token accounts for `asset` must match the registry vault and belong
    /// to `owner`. Unsupported assets are left for the engine to reject.
    fn check_leg(
        pool: &LendingPool,
        asset: &Pubkey,
        user_token_info: &AccountInfo,
        vault_info: &AccountInfo,
        owner: &Pubkey,
    ) -> ProgramResult {
        let config = match pool.find_asset(asset) {
            Some(config) => config,
            None => return Ok(()),
        };

        if *vault_info.key != config.vault {
            return Err(LendingError::InvalidTokenAccount.into());
        }
        transfer::check_token_account(user_token_info, asset, Some(owner))?;

        Ok(())
    }

    fn user_account_address(
        program_id: &Pubkey,
        pool: &Pubkey,
        owner: &Pubkey,
        info: &AccountInfo,
    ) -> Result<u8, ProgramError> {
        let (expected, bump) = Pubkey::find_program_address(
            &[USER_ACCOUNT_SEED, pool.as_ref(), owner.as_ref()],
            program_id,
        );
        if expected != *info.key {
            return Err(LendingError::InvalidPDA.into());
        }
        Ok(bump)
    }

    fn deserialize_user_account(
        program_id: &Pubkey,
        pool: &Pubkey,
        info: &AccountInfo,
    ) -> Result<UserAccount, ProgramError> {
        if info.owner != program_id {
            return Err(ProgramError::IncorrectProgramId);
        }

        let account = Self::borsh_deserialize_unchecked::<UserAccount>(&info.data.borrow())?;
        account.validate()?;

        if account.pool != *pool {
            return Err(ProgramError::InvalidAccountData);
        }

        Ok(account)
    }

    /// User account of `owner`; an empty in-memory ledger when it was never
    /// created. The flag reports whether it exists on chain.
    fn load_user_account(
        program_id: &Pubkey,
        pool: &Pubkey,
        owner: &Pubkey,
        info: &AccountInfo,
    ) -> Result<(UserAccount, bool), ProgramError> {
        let bump = Self::user_account_address(program_id, pool, owner, info)?;

        if info.data_is_empty() {
            return Ok((UserAccount::new(*pool, *owner, bump), false));
        }

        let account = Self::deserialize_user_account(program_id, pool, info)?;
        if account.owner != *owner {
            return Err(LendingError::Unauthorized.into());
        }

        Ok((account, true))
    }

    /// User account of the signing `payer`, created on first touch
    fn load_or_create_user_account<'info>(
        program_id: &Pubkey,
        pool: &Pubkey,
        payer_info: &AccountInfo<'info>,
        info: &AccountInfo<'info>,
        system_program_info: &AccountInfo<'info>,
    ) -> Result<(UserAccount, bool), ProgramError> {
        let (account, exists) = Self::load_user_account(program_id, pool, payer_info.key, info)?;
        if exists {
            return Ok((account, true));
        }

        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let rent = Rent::get()?;
        invoke_signed(
            &system_instruction::create_account(
                payer_info.key,
                info.key,
                rent.minimum_balance(UserAccount::LEN),
                UserAccount::LEN as u64,
                program_id,
            ),
            &[payer_info.clone(), info.clone(), system_program_info.clone()],
            &[&[
                USER_ACCOUNT_SEED,
                pool.as_ref(),
                payer_info.key.as_ref(),
                &[account.bump],
            ]],
        )?;

        msg!("User account created for {}", payer_info.key);

        Ok((account, false))
    }

    fn load_existing_user_account(
        program_id: &Pubkey,
        pool: &Pubkey,
        info: &AccountInfo,
    ) -> Result<UserAccount, ProgramError> {
        if info.data_is_empty() {
            return Err(LendingError::AccountNotInitialized.into());
        }

        let account = Self::deserialize_user_account(program_id, pool, info)?;
        let expected = Pubkey::create_program_address(
            &[
                USER_ACCOUNT_SEED,
                pool.as_ref(),
                account.owner.as_ref(),
                &[account.bump],
            ],
            program_id,
        )
        .map_err(|_| LendingError::InvalidPDA)?;
        if expected != *info.key {
            return Err(LendingError::InvalidPDA.into());
        }

        Ok(account)
    }

    /// Queries treat a never-created account as an empty ledger
    fn load_user_account_for_query(
        program_id: &Pubkey,
        pool: &Pubkey,
        info: &AccountInfo,
    ) -> Result<UserAccount, ProgramError> {
        if info.data_is_empty() {
            return Ok(UserAccount::new(*pool, Pubkey::default(), 0));
        }
        Self::load_existing_user_account(program_id, pool, info)
    }
}
