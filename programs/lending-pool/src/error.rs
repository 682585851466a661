use num_derive::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum LendingError {
    #[error("Amount can't be zero")]
    AmountCantBeZero = 0,

    #[error("Asset not supported")]
    AssetNotSupported = 1,

    #[error("Asset already supported")]
    AssetAlreadySupported = 2,

    #[error("Insufficient balance")]
    InsufficientBalance = 3,

    #[error("Insufficient collateral")]
    InsufficientCollateral = 4,

    #[error("Position is not liquidatable")]
    NotLiquidatable = 5,

    #[error("Unauthorized")]
    Unauthorized = 6,

    #[error("Invalid instruction")]
    InvalidInstruction = 7,

    #[error("Account not initialized")]
    AccountNotInitialized = 8,

    #[error("Account already initialized")]
    AccountAlreadyInitialized = 9,

    #[error("Invalid PDA")]
    InvalidPDA = 10,

    #[error("Invalid token account")]
    InvalidTokenAccount = 11,

    #[error("Too many assets")]
    TooManyAssets = 12,

    #[error("Invalid risk parameters")]
    InvalidRiskParameters = 13,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 14,
}

impl PrintProgramError for LendingError {
    fn print<E>(&self) {
        use solana_program::msg;
        msg!("LendingError: {}", self);
    }
}

impl From<LendingError> for ProgramError {
    fn from(e: LendingError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for LendingError {
    fn type_of() -> &'static str {
        "LendingError"
    }
}
