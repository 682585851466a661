// Collateralized Lending Pool
// Native Solana implementation - NO ANCHOR

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    pubkey::Pubkey,
};

pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod instructions;
pub mod interest;
pub mod liquidation;
pub mod math;
pub mod processor;
pub mod risk;
pub mod state;
pub mod transfer;

use processor::Processor;

// Declare program ID
solana_program::declare_id!("LendPoo111111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
solana_program::entrypoint!(process_instruction);

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    Processor::process(program_id, accounts, instruction_data)
}
