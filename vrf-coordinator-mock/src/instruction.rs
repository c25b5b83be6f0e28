use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    error::CoordinatorError,
    state::{find_config_address, find_request_address, find_subscription_address},
};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum CoordinatorInstruction {
    /// Create the coordinator config
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Admin, pays for the config account
    /// 1. `[writable]` Config PDA
    /// 2. `[]` System program
    Initialize {
        /// Flat lamport fee per fulfillment
        base_fee: u64,
        /// Lamports per delivered word
        fee_per_word: u64,
    },

    /// Create a subscription with the next free id
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Subscription owner, pays for the account
    /// 1. `[writable]` Config PDA
    /// 2. `[writable]` Subscription PDA for `subscription_counter + 1`
    /// 3. `[]` System program
    CreateSubscription,

    /// Deposit lamports into a subscription
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Funder
    /// 1. `[writable]` Subscription PDA
    /// 2. `[]` System program
    FundSubscription { subscription_id: u64, amount: u64 },

    /// Allow `consumer` to request randomness against the subscription
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Subscription PDA
    AddConsumer { subscription_id: u64, consumer: Pubkey },

    /// Request random words. The request id is returned as program return
    /// data (`u64` little endian).
    ///
    /// Accounts expected:
    /// 0. `[signer]` Consumer registered on the subscription
    /// 1. `[signer, writable]` Payer for the request account
    /// 2. `[writable]` Config PDA
    /// 3. `[writable]` Subscription PDA
    /// 4. `[writable]` Request PDA for `request_counter + 1`
    /// 5. `[]` System program
    RequestRandomWords {
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_compute_limit: u32,
        num_words: u32,
    },

    /// Deliver the words of a pending request to its consumer program
    ///
    /// Accounts expected:
    /// 0. `[writable]` Config PDA
    /// 1. `[writable]` Subscription PDA of the request
    /// 2. `[writable]` Request PDA
    /// 3. `[]` Consumer program
    /// 4.. Accounts forwarded to the consumer callback
    FulfillRandomWords { request_id: u64 },
}

impl CoordinatorInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| CoordinatorError::InvalidInstruction.into())
    }

    pub fn pack(&self) -> Vec<u8> {
        self.try_to_vec().unwrap_or_default()
    }
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    admin: &Pubkey,
    base_fee: u64,
    fee_per_word: u64,
) -> Result<Instruction, ProgramError> {
    let (config, _) = find_config_address(program_id);
    let data = CoordinatorInstruction::Initialize {
        base_fee,
        fee_per_word,
    }
    .pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(config, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Create create_subscription instruction; `subscription_id` must be the
/// coordinator's next id
pub fn create_subscription(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
) -> Result<Instruction, ProgramError> {
    let (config, _) = find_config_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(config, false),
            AccountMeta::new(subscription, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: CoordinatorInstruction::CreateSubscription.pack(),
    })
}

/// Create fund_subscription instruction
pub fn fund_subscription(
    program_id: &Pubkey,
    funder: &Pubkey,
    subscription_id: u64,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    let data = CoordinatorInstruction::FundSubscription {
        subscription_id,
        amount,
    }
    .pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(subscription, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Create add_consumer instruction
pub fn add_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
    consumer: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    let data = CoordinatorInstruction::AddConsumer {
        subscription_id,
        consumer: *consumer,
    }
    .pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(subscription, false),
        ],
        data,
    })
}

/// Create request_random_words instruction
#[allow(clippy::too_many_arguments)]
pub fn request_random_words(
    program_id: &Pubkey,
    consumer: &Pubkey,
    payer: &Pubkey,
    request: &Pubkey,
    key_hash: [u8; 32],
    subscription_id: u64,
    request_confirmations: u16,
    callback_compute_limit: u32,
    num_words: u32,
) -> Result<Instruction, ProgramError> {
    let (config, _) = find_config_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    let data = CoordinatorInstruction::RequestRandomWords {
        key_hash,
        subscription_id,
        request_confirmations,
        callback_compute_limit,
        num_words,
    }
    .pack();

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*consumer, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new(config, false),
            AccountMeta::new(subscription, false),
            AccountMeta::new(*request, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Create fulfill_random_words instruction; `consumer_accounts` are the
/// accounts the consumer's callback expects after the coordinator signer
pub fn fulfill_random_words(
    program_id: &Pubkey,
    subscription_id: u64,
    request_id: u64,
    consumer_program: &Pubkey,
    consumer_accounts: &[AccountMeta],
) -> Result<Instruction, ProgramError> {
    let (config, _) = find_config_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    let (request, _) = find_request_address(program_id, request_id);

    let mut accounts = vec![
        AccountMeta::new(config, false),
        AccountMeta::new(subscription, false),
        AccountMeta::new(request, false),
        AccountMeta::new_readonly(*consumer_program, false),
    ];
    accounts.extend_from_slice(consumer_accounts);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: CoordinatorInstruction::FulfillRandomWords { request_id }.pack(),
    })
}
