// Local VRF coordinator
// Issues randomness requests against prepaid subscriptions and delivers the
// words to the requesting program through a signed callback.

pub mod callback;
pub mod entrypoint;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
