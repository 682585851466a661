use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    constants::{POOL_SEED, USER_ACCOUNT_SEED},
    error::LendingError,
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum LendingInstruction {
    /// Create the pool account. Unset parameters take their defaults.
    /// Accounts:
    /// 0. `[signer, writable]` Authority (payer)
    /// 1. `[writable]` Pool PDA
    /// 2. `[]` System program
    InitializePool {
        interest_rate_bps: Option<u16>,
        liquidation_threshold_bps: Option<u16>,
        liquidation_bonus_bps: Option<u16>,
    },

    /// List an asset. Its price starts at 0.
    /// Accounts:
    /// 0. `[signer]` Authority
    /// 1. `[writable]` Pool PDA
    /// 2. `[]` Asset mint
    /// 3. `[]` Vault token account (owner: pool PDA)
    AddSupportedAsset,

    /// Overwrite an asset's USD price (6 decimals)
    /// Accounts:
    /// 0. `[signer]` Authority
    /// 1. `[writable]` Pool PDA
    SetAssetPrice {
        asset: Pubkey,
        price_usd: u64,
    },

    /// Update risk parameters
    /// Accounts:
    /// 0. `[signer]` Authority
    /// 1. `[writable]` Pool PDA
    UpdateRiskParameters {
        interest_rate_bps: Option<u16>,
        liquidation_threshold_bps: Option<u16>,
        liquidation_bonus_bps: Option<u16>,
    },

    /// Supply collateral
    /// Accounts:
    /// 0. `[signer, writable]` User (payer on first touch)
    /// 1. `[writable]` Pool PDA
    /// 2. `[writable]` User account PDA
    /// 3. `[writable]` User token account
    /// 4. `[writable]` Vault token account
    /// 5. `[]` Token program
    /// 6. `[]` System program
    Deposit {
        asset: Pubkey,
        amount: u64,
    },

    /// Take collateral back
    /// Accounts:
    /// 0. `[signer]` User
    /// 1. `[writable]` Pool PDA
    /// 2. `[writable]` User account PDA
    /// 3. `[writable]` User token account
    /// 4. `[writable]` Vault token account
    /// 5. `[]` Token program
    Withdraw {
        asset: Pubkey,
        amount: u64,
    },

    /// Borrow against collateral
    /// Accounts: same as `Deposit`
    Borrow {
        asset: Pubkey,
        amount: u64,
    },

    /// Repay debt; overpayment is capped at the debt
    /// Accounts: same as `Withdraw`
    Repay {
        asset: Pubkey,
        amount: u64,
    },

    /// Repay an unsafe borrower's debt for their collateral
    /// Accounts:
    /// 0. `[signer]` Liquidator
    /// 1. `[writable]` Pool PDA
    /// 2. `[writable]` Borrower account PDA
    /// 3. `[writable]` Liquidator token account for the debt asset
    /// 4. `[writable]` Debt asset vault
    /// 5. `[writable]` Liquidator token account for the collateral asset
    /// 6. `[writable]` Collateral asset vault
    /// 7. `[]` Token program
    Liquidate {
        debt_asset: Pubkey,
        collateral_asset: Pubkey,
        repay_amount: u64,
    },

    /// Return data: `AccountSnapshot`
    /// Accounts:
    /// 0. `[]` Pool PDA
    /// 1. `[]` User account PDA
    GetAccountData,

    /// Return data: accrued debt as `u64`
    /// Accounts: same as `GetAccountData`
    GetAccruedDebt {
        asset: Pubkey,
    },

    /// Return data: `PositionOverview`
    /// Accounts: same as `GetAccountData`
    GetPositionOverview,

    /// Return data: `Vec<LiquidationCandidate>`
    /// Accounts:
    /// 0. `[]` Pool PDA
    /// 1+. `[]` User account PDAs to scan
    ScanLiquidatable,
}

impl LendingInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        if input.is_empty() {
            return Err(ProgramError::InvalidInstructionData);
        }

        Self::try_from_slice(input).map_err(|_| LendingError::InvalidInstruction.into())
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        Ok(self.try_to_vec()?)
    }
}

pub fn find_pool_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_SEED], program_id)
}

pub fn find_user_account_address(program_id: &Pubkey, pool: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[USER_ACCOUNT_SEED, pool.as_ref(), owner.as_ref()], program_id)
}

// Helper functions to create instructions

pub fn initialize_pool(
    program_id: &Pubkey,
    authority: &Pubkey,
    interest_rate_bps: Option<u16>,
    liquidation_threshold_bps: Option<u16>,
    liquidation_bonus_bps: Option<u16>,
) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(pool, false),
            AccountMeta::new_readonly(solana_program::system_program::id(), false),
        ],
        data: LendingInstruction::InitializePool {
            interest_rate_bps,
            liquidation_threshold_bps,
            liquidation_bonus_bps,
        }
        .pack()?,
    })
}

pub fn add_supported_asset(
    program_id: &Pubkey,
    authority: &Pubkey,
    mint: &Pubkey,
    vault: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(pool, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*vault, false),
        ],
        data: LendingInstruction::AddSupportedAsset.pack()?,
    })
}

pub fn set_asset_price(
    program_id: &Pubkey,
    authority: &Pubkey,
    asset: &Pubkey,
    price_usd: u64,
) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(pool, false),
        ],
        data: LendingInstruction::SetAssetPrice {
            asset: *asset,
            price_usd,
        }
        .pack()?,
    })
}

pub fn update_risk_parameters(
    program_id: &Pubkey,
    authority: &Pubkey,
    interest_rate_bps: Option<u16>,
    liquidation_threshold_bps: Option<u16>,
    liquidation_bonus_bps: Option<u16>,
) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(pool, false),
        ],
        data: LendingInstruction::UpdateRiskParameters {
            interest_rate_bps,
            liquidation_threshold_bps,
            liquidation_bonus_bps,
        }
        .pack()?,
    })
}

/// Deposit or Borrow: the user account may be created on first touch
fn funding_accounts(
    program_id: &Pubkey,
    user: &Pubkey,
    user_token: &Pubkey,
    vault: &Pubkey,
) -> Vec<AccountMeta> {
    let (pool, _) = find_pool_address(program_id);
    let (user_account, _) = find_user_account_address(program_id, &pool, user);

    vec![
        AccountMeta::new(*user, true),
        AccountMeta::new(pool, false),
        AccountMeta::new(user_account, false),
        AccountMeta::new(*user_token, false),
        AccountMeta::new(*vault, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(solana_program::system_program::id(), false),
    ]
}

/// Withdraw or Repay
fn settlement_accounts(
    program_id: &Pubkey,
    user: &Pubkey,
    user_token: &Pubkey,
    vault: &Pubkey,
) -> Vec<AccountMeta> {
    let (pool, _) = find_pool_address(program_id);
    let (user_account, _) = find_user_account_address(program_id, &pool, user);

    vec![
        AccountMeta::new_readonly(*user, true),
        AccountMeta::new(pool, false),
        AccountMeta::new(user_account, false),
        AccountMeta::new(*user_token, false),
        AccountMeta::new(*vault, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ]
}

pub fn deposit(
    program_id: &Pubkey,
    user: &Pubkey,
    user_token: &Pubkey,
    vault: &Pubkey,
    asset: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: funding_accounts(program_id, user, user_token, vault),
        data: LendingInstruction::Deposit { asset: *asset, amount }.pack()?,
    })
}

pub fn borrow(
    program_id: &Pubkey,
    user: &Pubkey,
    user_token: &Pubkey,
    vault: &Pubkey,
    asset: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: funding_accounts(program_id, user, user_token, vault),
        data: LendingInstruction::Borrow { asset: *asset, amount }.pack()?,
    })
}

pub fn withdraw(
    program_id: &Pubkey,
    user: &Pubkey,
    user_token: &Pubkey,
    vault: &Pubkey,
    asset: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: settlement_accounts(program_id, user, user_token, vault),
        data: LendingInstruction::Withdraw { asset: *asset, amount }.pack()?,
    })
}

pub fn repay(
    program_id: &Pubkey,
    user: &Pubkey,
    user_token: &Pubkey,
    vault: &Pubkey,
    asset: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: settlement_accounts(program_id, user, user_token, vault),
        data: LendingInstruction::Repay { asset: *asset, amount }.pack()?,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn liquidate(
    program_id: &Pubkey,
    liquidator: &Pubkey,
    borrower: &Pubkey,
    liquidator_debt_token: &Pubkey,
    debt_vault: &Pubkey,
    liquidator_collateral_token: &Pubkey,
    collateral_vault: &Pubkey,
    debt_asset: &Pubkey,
    collateral_asset: &Pubkey,
    repay_amount: u64,
) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id);
    let (borrower_account, _) = find_user_account_address(program_id, &pool, borrower);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*liquidator, true),
            AccountMeta::new(pool, false),
            AccountMeta::new(borrower_account, false),
            AccountMeta::new(*liquidator_debt_token, false),
            AccountMeta::new(*debt_vault, false),
            AccountMeta::new(*liquidator_collateral_token, false),
            AccountMeta::new(*collateral_vault, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::Liquidate {
            debt_asset: *debt_asset,
            collateral_asset: *collateral_asset,
            repay_amount,
        }
        .pack()?,
    })
}

fn query(
    program_id: &Pubkey,
    user: &Pubkey,
    instruction: LendingInstruction,
) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id);
    let (user_account, _) = find_user_account_address(program_id, &pool, user);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(pool, false),
            AccountMeta::new_readonly(user_account, false),
        ],
        data: instruction.pack()?,
    })
}

pub fn get_account_data(program_id: &Pubkey, user: &Pubkey) -> Result<Instruction, ProgramError> {
    query(program_id, user, LendingInstruction::GetAccountData)
}

pub fn get_accrued_debt(
    program_id: &Pubkey,
    user: &Pubkey,
    asset: &Pubkey,
) -> Result<Instruction, ProgramError> {
    query(program_id, user, LendingInstruction::GetAccruedDebt { asset: *asset })
}

pub fn get_position_overview(program_id: &Pubkey, user: &Pubkey) -> Result<Instruction, ProgramError> {
    query(program_id, user, LendingInstruction::GetPositionOverview)
}

pub fn scan_liquidatable(program_id: &Pubkey, users: &[Pubkey]) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id);

    let mut accounts = vec![AccountMeta::new_readonly(pool, false)];
    accounts.extend(users.iter().map(|user| {
        let (user_account, _) = find_user_account_address(program_id, &pool, user);
        AccountMeta::new_readonly(user_account, false)
    }));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: LendingInstruction::ScanLiquidatable.pack()?,
    })
}
