// Randomness requests against the VRF coordinator program
use solana_program::{
    account_info::AccountInfo,
    msg,
    program::{get_return_data, invoke_signed},
    program_error::ProgramError,
};
use vrf_coordinator_mock::{callback::RandomWord, instruction as coordinator_instruction};

use crate::{raffle_error::RaffleError, raffle_state::Raffle};

/// Coordinator accounts a randomness request touches
pub struct CoordinatorAccounts<'a, 'b> {
    pub program: &'a AccountInfo<'b>,
    pub config: &'a AccountInfo<'b>,
    pub subscription: &'a AccountInfo<'b>,
    /// Request PDA for the coordinator's next request id
    pub request: &'a AccountInfo<'b>,
}

/// Asks the coordinator for `raffle.num_words()` random words.
///
/// `consumer` is the raffle PDA and signs with `consumer_seeds`. Returns the
/// request id handed back by the coordinator.
pub fn request_random_words<'a>(
    raffle: &Raffle,
    coordinator: &CoordinatorAccounts<'_, 'a>,
    consumer: &AccountInfo<'a>,
    payer: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    consumer_seeds: &[&[u8]],
) -> Result<u64, ProgramError> {
    if coordinator.program.key != raffle.vrf_coordinator_program() {
        msg!("Coordinator program {} is not the configured one", coordinator.program.key);
        return Err(RaffleError::InvalidCoordinator.into());
    }
    if coordinator.config.key != raffle.vrf_coordinator() {
        msg!("Coordinator config {} is not the configured one", coordinator.config.key);
        return Err(RaffleError::InvalidCoordinator.into());
    }

    let ix = coordinator_instruction::request_random_words(
        coordinator.program.key,
        consumer.key,
        payer.key,
        coordinator.request.key,
        raffle.gas_lane(),
        raffle.subscription_id(),
        raffle.request_confirmations(),
        raffle.callback_compute_limit(),
        raffle.num_words(),
    )?;

    invoke_signed(
        &ix,
        &[
            consumer.clone(),
            payer.clone(),
            coordinator.config.clone(),
            coordinator.subscription.clone(),
            coordinator.request.clone(),
            system_program.clone(),
            coordinator.program.clone(),
        ],
        &[consumer_seeds],
    )?;

    let (returned_by, data) = get_return_data().ok_or(RaffleError::InvalidRequestId)?;
    if returned_by != *coordinator.program.key {
        return Err(RaffleError::InvalidRequestId.into());
    }
    let request_id = parse_request_id(&data)?;
    msg!("Coordinator accepted request {}", request_id);
    Ok(request_id)
}

fn parse_request_id(data: &[u8]) -> Result<u64, RaffleError> {
    let bytes: [u8; 8] = data.try_into().map_err(|_| RaffleError::InvalidRequestId)?;
    match u64::from_le_bytes(bytes) {
        0 => Err(RaffleError::InvalidRequestId),
        request_id => Ok(request_id),
    }
}

/// Index selected by `word mod count`, reading the word as a big-endian
/// 256-bit integer
pub fn winner_index(word: &RandomWord, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let modulus = count as u128;
    let remainder = word
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | u128::from(*byte)) % modulus);
    remainder as usize
}
