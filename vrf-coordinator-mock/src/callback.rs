//! Consumer side of the fulfillment callback.
//!
//! A consumer program reserves instruction tag [`FULFILL_RANDOM_WORDS_TAG`]
//! for the callback. The coordinator invokes it with its config PDA as the
//! first (signing) account, followed by the accounts supplied to
//! `FulfillRandomWords`.
//!
//! Payload after the tag: `request_id: u64 LE`, `count: u32 LE`, then
//! `count` 32-byte words.

use arrayref::{array_ref, array_refs};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    keccak,
    program_error::ProgramError,
    pubkey::Pubkey,
};

pub const FULFILL_RANDOM_WORDS_TAG: u8 = 0xFF;

/// A single random value, read as a big-endian 256-bit integer
pub type RandomWord = [u8; 32];

const HEADER_LEN: usize = 8 + 4;

pub fn pack_fulfill_random_words(request_id: u64, random_words: &[RandomWord]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + HEADER_LEN + random_words.len() * 32);
    buf.push(FULFILL_RANDOM_WORDS_TAG);
    buf.extend_from_slice(&request_id.to_le_bytes());
    buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
    for word in random_words {
        buf.extend_from_slice(word);
    }
    buf
}

/// Unpacks the payload that follows the tag byte
pub fn unpack_fulfill_random_words(input: &[u8]) -> Result<(u64, Vec<RandomWord>), ProgramError> {
    if input.len() < HEADER_LEN {
        return Err(ProgramError::InvalidInstructionData);
    }
    let header = array_ref![input, 0, HEADER_LEN];
    let (request_id, count) = array_refs![header, 8, 4];
    let count = u32::from_le_bytes(*count) as usize;

    let body = &input[HEADER_LEN..];
    if count.checked_mul(32) != Some(body.len()) {
        return Err(ProgramError::InvalidInstructionData);
    }

    let random_words = body
        .chunks_exact(32)
        .map(|chunk| *array_ref![chunk, 0, 32])
        .collect();
    Ok((u64::from_le_bytes(*request_id), random_words))
}

/// Words the coordinator delivers for `request_id`.
///
/// Deterministic, so off-chain fulfillers can work out the consumer's
/// outcome (and the accounts it needs) before sending the fulfillment.
pub fn random_words_for(request_id: u64, num_words: u32) -> Vec<RandomWord> {
    (0..num_words)
        .map(|index| keccak::hashv(&[&request_id.to_le_bytes(), &index.to_le_bytes()]).0)
        .collect()
}

/// Builds the callback instruction the coordinator sends to a consumer
pub fn fulfill_random_words(
    consumer_program: &Pubkey,
    coordinator: &Pubkey,
    consumer_accounts: &[AccountMeta],
    request_id: u64,
    random_words: &[RandomWord],
) -> Instruction {
    let mut accounts = Vec::with_capacity(consumer_accounts.len() + 1);
    accounts.push(AccountMeta::new_readonly(*coordinator, true));
    accounts.extend_from_slice(consumer_accounts);

    Instruction {
        program_id: *consumer_program,
        accounts,
        data: pack_fulfill_random_words(request_id, random_words),
    }
}
