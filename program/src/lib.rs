// Automated raffle
// Players enter for a fixed fee, a keeper closes each round once the interval
// has passed, and the VRF coordinator's callback picks and pays the winner.

pub mod config;
pub mod events;
pub mod raffle_entrypoint;
pub mod raffle_error;
pub mod raffle_instruction;
pub mod raffle_processor;
pub mod raffle_state;
pub mod utils;

// VRF module for randomness
pub mod vrf;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    raffle_processor::Processor::process(program_id, accounts, instruction_data)
}
