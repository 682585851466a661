use std::collections::HashMap;

use lending_pool::{
    constants::{HEALTH_FACTOR_INFINITE, SECONDS_PER_YEAR},
    engine::LendingEngine,
    error::LendingError,
    liquidation,
    state::{LendingPool, RiskParameters, UserAccount},
    transfer::TokenTransfer,
};
use solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey};
use spl_token::error::TokenError;

const UNIT: u64 = 1_000_000_000;
const T0: i64 = 1_700_000_000;

/// In-memory token ledger: wallet balances per (owner, mint) and vault
/// balances per mint
#[derive(Default)]
struct MockTransfer {
    wallets: HashMap<(Pubkey, Pubkey), u64>,
    vaults: HashMap<Pubkey, u64>,
    fail: bool,
    calls: usize,
}

impl MockTransfer {
    fn fund(&mut self, owner: &Pubkey, asset: &Pubkey, amount: u64) {
        *self.wallets.entry((*owner, *asset)).or_default() += amount;
    }

    fn wallet(&self, owner: &Pubkey, asset: &Pubkey) -> u64 {
        self.wallets.get(&(*owner, *asset)).copied().unwrap_or(0)
    }

    fn vault(&self, asset: &Pubkey) -> u64 {
        self.vaults.get(asset).copied().unwrap_or(0)
    }
}

impl TokenTransfer for MockTransfer {
    fn pull(&mut self, from: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult {
        self.calls += 1;
        if self.fail {
            return Err(TokenError::OwnerMismatch.into());
        }

        let balance = self.wallets.entry((*from, *asset)).or_default();
        if *balance < amount {
            return Err(TokenError::InsufficientFunds.into());
        }
        *balance -= amount;
        *self.vaults.entry(*asset).or_default() += amount;
        Ok(())
    }

    fn push(&mut self, to: &Pubkey, asset: &Pubkey, amount: u64) -> ProgramResult {
        self.calls += 1;
        if self.fail {
            return Err(TokenError::OwnerMismatch.into());
        }

        let vault = self.vaults.entry(*asset).or_default();
        if *vault < amount {
            return Err(TokenError::InsufficientFunds.into());
        }
        *vault -= amount;
        *self.wallets.entry((*to, *asset)).or_default() += amount;
        Ok(())
    }
}

struct Fixture {
    pool: LendingPool,
    pool_key: Pubkey,
    authority: Pubkey,
    usdc: Pubkey,
    dai: Pubkey,
    tokens: MockTransfer,
}

impl Fixture {
    /// Pool with USDC and DAI at $1.00, 9 decimals each, default risk
    /// parameters, and a lender supplying 100 USDC of liquidity
    fn new() -> Self {
        let authority = Pubkey::new_unique();
        let mut pool =
            LendingEngine::initialize_pool(authority, 255, RiskParameters::default(), T0).unwrap();

        let usdc = Pubkey::new_unique();
        let dai = Pubkey::new_unique();
        for mint in [usdc, dai] {
            LendingEngine::add_supported_asset(&mut pool, &authority, mint, Pubkey::new_unique(), 9, T0)
                .unwrap();
            LendingEngine::set_asset_price(&mut pool, &authority, &mint, 1_000_000, T0).unwrap();
        }

        let mut fixture = Self {
            pool,
            pool_key: Pubkey::new_unique(),
            authority,
            usdc,
            dai,
            tokens: MockTransfer::default(),
        };

        let mut lender = fixture.account();
        fixture.tokens.fund(&lender.owner, &usdc, 100 * UNIT);
        LendingEngine::deposit(&mut fixture.pool, &mut lender, &usdc, 100 * UNIT, &mut fixture.tokens)
            .unwrap();

        fixture
    }

    fn account(&self) -> UserAccount {
        UserAccount::new(self.pool_key, Pubkey::new_unique(), 254)
    }

    /// Fresh user with `collateral` DAI deposited and `debt` USDC borrowed at T0
    fn borrower(&mut self, collateral: u64, debt: u64) -> UserAccount {
        let mut account = self.account();
        self.tokens.fund(&account.owner, &self.dai, collateral);
        LendingEngine::deposit(&mut self.pool, &mut account, &self.dai, collateral, &mut self.tokens)
            .unwrap();
        if debt > 0 {
            LendingEngine::borrow(&mut self.pool, &mut account, &self.usdc, debt, T0, &mut self.tokens)
                .unwrap();
        }
        account
    }

    fn set_price(&mut self, asset: Pubkey, price_usd: u64) {
        let authority = self.authority;
        LendingEngine::set_asset_price(&mut self.pool, &authority, &asset, price_usd, T0).unwrap();
    }
}

fn lending_error(error: LendingError) -> ProgramError {
    error.into()
}

#[test]
fn test_deposit_and_withdraw() {
    let mut f = Fixture::new();
    let dai = f.dai;
    let mut account = f.account();
    f.tokens.fund(&account.owner, &dai, 10 * UNIT);

    let event = LendingEngine::deposit(&mut f.pool, &mut account, &dai, 10 * UNIT, &mut f.tokens).unwrap();
    assert_eq!(event.amount, 10 * UNIT);
    assert_eq!(account.position(&dai).deposited_amount, 10 * UNIT);
    assert_eq!(f.pool.asset(&dai).unwrap().total_deposits, 10 * UNIT);
    assert_eq!(f.tokens.wallet(&account.owner, &dai), 0);

    LendingEngine::withdraw(&mut f.pool, &mut account, &dai, 4 * UNIT, T0, &mut f.tokens).unwrap();
    assert_eq!(account.position(&dai).deposited_amount, 6 * UNIT);
    assert_eq!(f.pool.asset(&dai).unwrap().total_deposits, 6 * UNIT);
    assert_eq!(f.tokens.wallet(&account.owner, &dai), 4 * UNIT);
    assert_eq!(f.tokens.vault(&dai), 6 * UNIT);

    let err = LendingEngine::withdraw(&mut f.pool, &mut account, &dai, 7 * UNIT, T0, &mut f.tokens)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::InsufficientBalance));
}

#[test]
fn test_input_validation_order() {
    let mut f = Fixture::new();
    let mut account = f.account();
    let unknown = Pubkey::new_unique();

    // Zero amount is reported before the asset check
    let err = LendingEngine::deposit(&mut f.pool, &mut account, &unknown, 0, &mut f.tokens).unwrap_err();
    assert_eq!(err, lending_error(LendingError::AmountCantBeZero));

    let err = LendingEngine::deposit(&mut f.pool, &mut account, &unknown, 1, &mut f.tokens).unwrap_err();
    assert_eq!(err, lending_error(LendingError::AssetNotSupported));

    let err = LendingEngine::borrow(&mut f.pool, &mut account, &unknown, 1, T0, &mut f.tokens).unwrap_err();
    assert_eq!(err, lending_error(LendingError::AssetNotSupported));

    let usdc = f.usdc;
    let err = LendingEngine::repay(&mut f.pool, &mut account, &usdc, 0, T0, &mut f.tokens).unwrap_err();
    assert_eq!(err, lending_error(LendingError::AmountCantBeZero));
}

#[test]
fn test_borrow_up_to_liquidation_threshold() {
    let mut f = Fixture::new();
    let usdc = f.usdc;
    let mut account = f.borrower(10 * UNIT, 0);

    // 10 DAI at 80% supports exactly 8 USDC
    LendingEngine::borrow(&mut f.pool, &mut account, &usdc, 8 * UNIT, T0, &mut f.tokens).unwrap();
    let snapshot = LendingEngine::get_account_data(&f.pool, &account, T0).unwrap();
    assert_eq!(snapshot.total_collateral_usd, 10_000_000);
    assert_eq!(snapshot.total_debt_usd, 8_000_000);
    assert_eq!(snapshot.health_factor, 1_000_000);

    let pool_before = f.pool.clone();
    let account_before = account.clone();
    let calls_before = f.tokens.calls;

    // One cent more breaks the threshold
    let err = LendingEngine::borrow(&mut f.pool, &mut account, &usdc, UNIT / 100, T0, &mut f.tokens)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::InsufficientCollateral));
    assert_eq!(f.pool, pool_before);
    assert_eq!(account, account_before);
    assert_eq!(f.tokens.calls, calls_before);
}

#[test]
fn test_borrow_limited_by_pool_liquidity() {
    let mut f = Fixture::new();
    let usdc = f.usdc;
    let mut account = f.borrower(1_000 * UNIT, 0);

    let err = LendingEngine::borrow(&mut f.pool, &mut account, &usdc, 101 * UNIT, T0, &mut f.tokens)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::InsufficientBalance));
}

#[test]
fn test_withdraw_blocked_when_it_breaks_health() {
    let mut f = Fixture::new();
    let dai = f.dai;
    let mut account = f.borrower(10 * UNIT, 8 * UNIT);

    let err = LendingEngine::withdraw(&mut f.pool, &mut account, &dai, UNIT, T0, &mut f.tokens)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::InsufficientCollateral));
    assert_eq!(account.position(&dai).deposited_amount, 10 * UNIT);
}

#[test]
fn test_interest_accrues_and_repay_is_capped() {
    let mut f = Fixture::new();
    let usdc = f.usdc;
    let mut account = f.borrower(100 * UNIT, 5 * UNIT);
    let half_year = T0 + (SECONDS_PER_YEAR / 2) as i64;

    // 5 USDC at 10% for half a year
    let debt = LendingEngine::get_accrued_debt(&f.pool, &account, &usdc, half_year).unwrap();
    assert_eq!(debt, 5_250_000_000);

    // Queries do not realize interest
    assert_eq!(account.position(&usdc).borrowed_principal, 5 * UNIT);

    f.tokens.fund(&account.owner, &usdc, 10 * UNIT);
    let event = LendingEngine::repay(&mut f.pool, &mut account, &usdc, 10 * UNIT, half_year, &mut f.tokens)
        .unwrap();
    assert_eq!(event.actual_repaid, 5_250_000_000);

    let position = account.position(&usdc);
    assert_eq!(position.borrowed_principal, 0);
    assert_eq!(position.last_accrual_timestamp, 0);
    assert_eq!(f.pool.asset(&usdc).unwrap().total_borrows, 0);

    // 5 borrowed plus 10 funded, less 5.25 repaid
    assert_eq!(f.tokens.wallet(&account.owner, &usdc), 9_750_000_000);
}

#[test]
fn test_repay_without_debt_moves_nothing() {
    let mut f = Fixture::new();
    let usdc = f.usdc;
    let mut account = f.borrower(10 * UNIT, 0);
    let calls_before = f.tokens.calls;

    let event = LendingEngine::repay(&mut f.pool, &mut account, &usdc, UNIT, T0, &mut f.tokens).unwrap();
    assert_eq!(event.actual_repaid, 0);
    assert_eq!(f.tokens.calls, calls_before);
}

#[test]
fn test_partial_repay_realizes_interest() {
    let mut f = Fixture::new();
    let usdc = f.usdc;
    let mut account = f.borrower(100 * UNIT, 5 * UNIT);
    let half_year = T0 + (SECONDS_PER_YEAR / 2) as i64;

    f.tokens.fund(&account.owner, &usdc, UNIT);
    LendingEngine::repay(&mut f.pool, &mut account, &usdc, UNIT, half_year, &mut f.tokens).unwrap();

    let position = account.position(&usdc);
    assert_eq!(position.borrowed_principal, 4_250_000_000);
    assert_eq!(position.last_accrual_timestamp, half_year);
    assert_eq!(f.pool.asset(&usdc).unwrap().total_borrows, 4_250_000_000);
}

#[test]
fn test_liquidation_after_price_drop() {
    let mut f = Fixture::new();
    let (usdc, dai) = (f.usdc, f.dai);
    let mut borrower = f.borrower(10 * UNIT, 5 * UNIT);
    let liquidator = Pubkey::new_unique();
    f.tokens.fund(&liquidator, &usdc, 2 * UNIT);

    // Healthy at $1.00
    let err = LendingEngine::liquidate(
        &mut f.pool, &mut borrower, &liquidator, &usdc, &dai, 2 * UNIT, T0, &mut f.tokens,
    )
    .unwrap_err();
    assert_eq!(err, lending_error(LendingError::NotLiquidatable));

    f.set_price(dai, 400_000);
    let snapshot = LendingEngine::get_account_data(&f.pool, &borrower, T0).unwrap();
    assert_eq!(snapshot.health_factor, 640_000);
    assert!(snapshot.is_liquidatable());

    let event = LendingEngine::liquidate(
        &mut f.pool, &mut borrower, &liquidator, &usdc, &dai, 2 * UNIT, T0, &mut f.tokens,
    )
    .unwrap();

    // $2.00 of debt buys $2.00 of DAI at $0.40
    assert_eq!(event.repay_amount, 2 * UNIT);
    assert_eq!(event.seized_amount, 5 * UNIT);
    assert_eq!(event.borrower, borrower.owner);
    assert_eq!(borrower.position(&usdc).borrowed_principal, 3 * UNIT);
    assert_eq!(borrower.position(&dai).deposited_amount, 5 * UNIT);
    assert_eq!(f.tokens.wallet(&liquidator, &usdc), 0);
    assert_eq!(f.tokens.wallet(&liquidator, &dai), 5 * UNIT);
    assert_eq!(f.pool.asset(&dai).unwrap().total_deposits, 5 * UNIT);
    assert_eq!(f.pool.asset(&usdc).unwrap().total_borrows, 3 * UNIT);
}

#[test]
fn test_liquidation_bonus_and_repay_cap() {
    let mut f = Fixture::new();
    let (usdc, dai) = (f.usdc, f.dai);
    let authority = f.authority;
    LendingEngine::update_risk_parameters(&mut f.pool, &authority, None, None, Some(1_000), T0).unwrap();

    let mut borrower = f.borrower(10 * UNIT, 7 * UNIT);
    f.set_price(dai, 400_000);

    let liquidator = Pubkey::new_unique();
    f.tokens.fund(&liquidator, &usdc, 50 * UNIT);

    // Repay is capped at the 7 USDC owed; $7.70 with bonus exceeds the
    // $4.00 of collateral, so everything is seized
    let event = LendingEngine::liquidate(
        &mut f.pool, &mut borrower, &liquidator, &usdc, &dai, 50 * UNIT, T0, &mut f.tokens,
    )
    .unwrap();
    assert_eq!(event.repay_amount, 7 * UNIT);
    assert_eq!(event.seized_amount, 10 * UNIT);
    assert_eq!(f.tokens.wallet(&liquidator, &usdc), 43 * UNIT);
    assert!(borrower.position(&dai).is_empty());
    assert!(!borrower.has_debt());
}

#[test]
fn test_liquidation_requires_debt_in_repaid_asset() {
    let mut f = Fixture::new();
    let dai = f.dai;
    let mut borrower = f.borrower(10 * UNIT, 7 * UNIT);
    f.set_price(dai, 400_000);

    let liquidator = Pubkey::new_unique();
    f.tokens.fund(&liquidator, &dai, UNIT);

    let err = LendingEngine::liquidate(
        &mut f.pool, &mut borrower, &liquidator, &dai, &dai, UNIT, T0, &mut f.tokens,
    )
    .unwrap_err();
    assert_eq!(err, lending_error(LendingError::NotLiquidatable));
}

#[test]
fn test_failed_transfer_leaves_state_unchanged() {
    let mut f = Fixture::new();
    let (usdc, dai) = (f.usdc, f.dai);
    let mut account = f.borrower(10 * UNIT, 0);
    let pool_before = f.pool.clone();
    let account_before = account.clone();

    // Wallet is empty
    let err = LendingEngine::deposit(&mut f.pool, &mut account, &dai, UNIT, &mut f.tokens).unwrap_err();
    assert_eq!(err, ProgramError::from(TokenError::InsufficientFunds));
    assert_eq!(f.pool, pool_before);
    assert_eq!(account, account_before);

    f.tokens.fail = true;
    assert!(LendingEngine::borrow(&mut f.pool, &mut account, &usdc, UNIT, T0, &mut f.tokens).is_err());
    assert_eq!(f.pool, pool_before);
    assert_eq!(account, account_before);
}

#[test]
fn test_admin_operations_require_authority() {
    let mut f = Fixture::new();
    let dai = f.dai;
    let authority = f.authority;
    let intruder = Pubkey::new_unique();

    let err = LendingEngine::set_asset_price(&mut f.pool, &intruder, &dai, 1, T0).unwrap_err();
    assert_eq!(err, lending_error(LendingError::Unauthorized));

    let err = LendingEngine::add_supported_asset(
        &mut f.pool, &intruder, Pubkey::new_unique(), Pubkey::new_unique(), 6, T0,
    )
    .unwrap_err();
    assert_eq!(err, lending_error(LendingError::Unauthorized));

    let err = LendingEngine::update_risk_parameters(&mut f.pool, &intruder, Some(0), None, None, T0)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::Unauthorized));

    let err = LendingEngine::add_supported_asset(&mut f.pool, &authority, dai, Pubkey::new_unique(), 9, T0)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::AssetAlreadySupported));

    let err = LendingEngine::set_asset_price(&mut f.pool, &authority, &Pubkey::new_unique(), 1, T0)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::AssetNotSupported));

    let err = LendingEngine::update_risk_parameters(&mut f.pool, &authority, None, Some(10_001), None, T0)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::InvalidRiskParameters));
    assert_eq!(f.pool.risk_params, RiskParameters::default());
}

#[test]
fn test_price_update_event() {
    let mut f = Fixture::new();
    let dai = f.dai;
    let authority = f.authority;

    let event = LendingEngine::set_asset_price(&mut f.pool, &authority, &dai, 990_000, T0 + 60).unwrap();
    assert_eq!(event.old_price_usd, 1_000_000);
    assert_eq!(event.new_price_usd, 990_000);
    assert_eq!(event.timestamp, T0 + 60);
    assert_eq!(f.pool.asset(&dai).unwrap().price_usd, 990_000);
}

#[test]
fn test_scan_orders_most_unsafe_first() {
    let mut f = Fixture::new();
    let dai = f.dai;
    let safe = f.borrower(10 * UNIT, UNIT);
    let shaky = f.borrower(10 * UNIT, 5 * UNIT);
    let worst = f.borrower(10 * UNIT, 7 * UNIT);
    let idle = f.borrower(10 * UNIT, 0);

    f.set_price(dai, 400_000);

    let candidates = liquidation::scan_liquidatable(&f.pool, [&safe, &shaky, &idle, &worst], T0).unwrap();
    let owners: Vec<Pubkey> = candidates.iter().map(|c| c.owner).collect();
    assert_eq!(owners, vec![worst.owner, shaky.owner]);
    assert!(candidates[0].snapshot.health_factor < candidates[1].snapshot.health_factor);
}

#[test]
fn test_position_overview_reports_net_worth() {
    let mut f = Fixture::new();
    let (usdc, dai) = (f.usdc, f.dai);
    let account = f.borrower(10 * UNIT, 4 * UNIT);

    let overview = LendingEngine::get_position_overview(&f.pool, &account, T0).unwrap();
    assert_eq!(overview.net_worth_usd, 6_000_000);

    let dai_row = overview.positions.iter().find(|p| p.asset == dai).unwrap();
    assert_eq!(dai_row.deposited_usd, 10_000_000);
    let usdc_row = overview.positions.iter().find(|p| p.asset == usdc).unwrap();
    assert_eq!(usdc_row.debt_usd, 4_000_000);
    assert_eq!(usdc_row.net_usd, -4_000_000);

    let empty = f.account();
    let snapshot = LendingEngine::get_account_data(&f.pool, &empty, T0).unwrap();
    assert_eq!(snapshot.health_factor, HEALTH_FACTOR_INFINITE);
}

#[test]
fn test_second_borrow_realizes_interest_first() {
    let mut f = Fixture::new();
    let usdc = f.usdc;
    let mut account = f.borrower(100 * UNIT, 5 * UNIT);
    let half_year = T0 + (SECONDS_PER_YEAR / 2) as i64;

    LendingEngine::borrow(&mut f.pool, &mut account, &usdc, UNIT, half_year, &mut f.tokens).unwrap();

    // 5 grew to 5.25 before the extra 1 was added
    let position = account.position(&usdc);
    assert_eq!(position.borrowed_principal, 6_250_000_000);
    assert_eq!(position.last_accrual_timestamp, half_year);
    assert_eq!(f.pool.asset(&usdc).unwrap().total_borrows, 6_250_000_000);
}

#[test]
fn test_liquidation_caps_repay_at_realized_debt() {
    let mut f = Fixture::new();
    let (usdc, dai) = (f.usdc, f.dai);
    let mut borrower = f.borrower(10 * UNIT, 7 * UNIT);
    f.set_price(dai, 400_000);
    let half_year = T0 + (SECONDS_PER_YEAR / 2) as i64;

    let liquidator = Pubkey::new_unique();
    f.tokens.fund(&liquidator, &usdc, 50 * UNIT);

    // 7 USDC owed for half a year at 10% is 7.35
    let event = LendingEngine::liquidate(
        &mut f.pool, &mut borrower, &liquidator, &usdc, &dai, 50 * UNIT, half_year, &mut f.tokens,
    )
    .unwrap();
    assert_eq!(event.repay_amount, 7_350_000_000);
    assert_eq!(event.seized_amount, 10 * UNIT);
    assert_eq!(f.tokens.wallet(&liquidator, &usdc), 42_650_000_000);

    let position = borrower.position(&usdc);
    assert_eq!(position.borrowed_principal, 0);
    assert_eq!(position.last_accrual_timestamp, 0);
    assert_eq!(f.pool.asset(&usdc).unwrap().total_borrows, 0);
}

#[test]
fn test_unpriced_asset_cannot_be_borrowed() {
    let mut f = Fixture::new();
    let authority = f.authority;
    let fresh = Pubkey::new_unique();
    LendingEngine::add_supported_asset(&mut f.pool, &authority, fresh, Pubkey::new_unique(), 9, T0)
        .unwrap();

    // Deposits are accepted before a price is set
    let mut lender = f.account();
    f.tokens.fund(&lender.owner, &fresh, 50 * UNIT);
    LendingEngine::deposit(&mut f.pool, &mut lender, &fresh, 50 * UNIT, &mut f.tokens).unwrap();

    let mut borrower = f.account();
    let err = LendingEngine::borrow(&mut f.pool, &mut borrower, &fresh, 50 * UNIT, T0, &mut f.tokens)
        .unwrap_err();
    assert_eq!(err, lending_error(LendingError::AssetNotSupported));
    assert!(!borrower.has_debt());
}
