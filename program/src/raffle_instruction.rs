use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;
use vrf_coordinator_mock::{
    callback::{self, RandomWord, FULFILL_RANDOM_WORDS_TAG},
    state::{find_config_address, find_request_address, find_subscription_address},
};

use crate::{config::RaffleConfig, raffle_error::RaffleError, utils::find_raffle_address};

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle with its deployment parameters
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Deployer, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA)
    /// 2. `[]` The VRF coordinator program
    /// 3. `[]` The system program
    InitializeRaffle {
        config: RaffleConfig,
    },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player, pays `amount`
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Report whether upkeep is needed. The answer is returned as program
    /// return data: borsh `(bool, Vec<u8>)`.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep { check_data: Vec<u8> },

    /// Close entries and request randomness for the round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Keeper, pays for the coordinator request account
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The VRF coordinator program
    /// 3. `[writable]` Coordinator config
    /// 4. `[writable]` Coordinator subscription
    /// 5. `[writable]` Coordinator request account for the next request id
    /// 6. `[]` The system program
    PerformUpkeep { perform_data: Vec<u8> },

    /// Randomness delivery from the coordinator; pays the pot to the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` Coordinator config
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winner selected by the random words
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<RandomWord>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input.split_first().ok_or(RaffleError::InvalidInstruction)?;

        Ok(match *tag {
            0 => Self::InitializeRaffle {
                config: RaffleConfig::unpack(rest)?,
            },
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => {
                let (check_data, _) = Self::unpack_bytes(rest)?;
                Self::CheckUpkeep { check_data }
            }
            3 => {
                let (perform_data, _) = Self::unpack_bytes(rest)?;
                Self::PerformUpkeep { perform_data }
            }
            FULFILL_RANDOM_WORDS_TAG => {
                let (request_id, random_words) = callback::unpack_fulfill_random_words(rest)?;
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle { config } => {
                buf.push(0);
                config.pack(&mut buf);
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep { check_data } => {
                buf.push(2);
                Self::pack_bytes(&mut buf, check_data);
            }
            Self::PerformUpkeep { perform_data } => {
                buf.push(3);
                Self::pack_bytes(&mut buf, perform_data);
            }
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf = callback::pack_fulfill_random_words(*request_id, random_words);
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (value, rest) = input.split_at(8);
        let value = value
            .try_into()
            .map(u64::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstruction)?;
        Ok((value, rest))
    }

    fn unpack_bytes(input: &[u8]) -> Result<(Vec<u8>, &[u8]), ProgramError> {
        if input.len() < 4 {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (len, rest) = input.split_at(4);
        let len = len
            .try_into()
            .map(u32::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstruction)? as usize;
        if rest.len() < len {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (bytes, rest) = rest.split_at(len);
        Ok((bytes.to_vec(), rest))
    }

    fn pack_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    deployer: &Pubkey,
    coordinator_program: &Pubkey,
    config: RaffleConfig,
) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::InitializeRaffle { config }.pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*deployer, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(*coordinator_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Create enter_raffle instruction
pub fn enter_raffle(program_id: &Pubkey, player: &Pubkey, amount: u64) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::EnterRaffle { amount }.pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, check_data: &[u8]) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id);
    let data = RaffleInstruction::CheckUpkeep {
        check_data: check_data.to_vec(),
    }
    .pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(raffle, false)],
        data,
    })
}

/// Create perform_upkeep instruction; `request_id` is the id the coordinator
/// will assign next
pub fn perform_upkeep(
    program_id: &Pubkey,
    keeper: &Pubkey,
    coordinator_program: &Pubkey,
    subscription_id: u64,
    request_id: u64,
    perform_data: &[u8],
) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id);
    let (config, _) = find_config_address(coordinator_program);
    let (subscription, _) = find_subscription_address(coordinator_program, subscription_id);
    let (request, _) = find_request_address(coordinator_program, request_id);
    let data = RaffleInstruction::PerformUpkeep {
        perform_data: perform_data.to_vec(),
    }
    .pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*keeper, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(*coordinator_program, false),
            AccountMeta::new(config, false),
            AccountMeta::new(subscription, false),
            AccountMeta::new(request, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Accounts the raffle's fulfillment callback expects after the coordinator
/// signer; pass them to the coordinator's `fulfill_random_words`
pub fn fulfillment_accounts(program_id: &Pubkey, winner: &Pubkey) -> Vec<AccountMeta> {
    let (raffle, _) = find_raffle_address(program_id);
    vec![AccountMeta::new(raffle, false), AccountMeta::new(*winner, false)]
}

/// Create fulfill_random_words instruction signed by `coordinator`
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: &[RandomWord],
) -> Result<Instruction, ProgramError> {
    Ok(callback::fulfill_random_words(
        program_id,
        coordinator,
        &fulfillment_accounts(program_id, winner),
        request_id,
        random_words,
    ))
}
