use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::Slot,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::error::CoordinatorError;

pub const CONFIG_SEED: &[u8] = b"coordinator-config";
pub const SUBSCRIPTION_SEED: &[u8] = b"subscription";
pub const REQUEST_SEED: &[u8] = b"request";

/// Upper bound on words delivered by a single fulfillment
pub const MAX_NUM_WORDS: u32 = 500;
pub const MAX_REQUEST_CONFIRMATIONS: u16 = 200;
/// Consumers a subscription can register
pub const MAX_CONSUMERS: usize = 10;

/// Global coordinator configuration, stored as a singleton PDA.
///
/// Seeds: `["coordinator-config"]`
///
/// The config PDA is also the key that signs every consumer callback, so
/// consumers authenticate fulfillments by checking for this signer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorConfig {
    pub is_initialized: bool,
    /// Deployer of the coordinator
    pub admin: Pubkey,
    /// Flat fee in lamports charged per fulfillment
    pub base_fee: u64,
    /// Additional lamports charged per delivered word
    pub fee_per_word: u64,
    /// Last issued request id (ids start at 1)
    pub request_counter: u64,
    /// Last issued subscription id (ids start at 1)
    pub subscription_counter: u64,
    pub bump: u8,
}

impl CoordinatorConfig {
    /// Lamports owed for delivering `num_words` words
    pub fn fulfillment_fee(&self, num_words: u32) -> Result<u64, CoordinatorError> {
        self.fee_per_word
            .checked_mul(num_words as u64)
            .and_then(|words_fee| words_fee.checked_add(self.base_fee))
            .ok_or(CoordinatorError::Overflow)
    }
}

impl Sealed for CoordinatorConfig {}

impl IsInitialized for CoordinatorConfig {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for CoordinatorConfig {
    const LEN: usize = 1 + 32 + 8 + 8 + 8 + 8 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, CoordinatorConfig::LEN];
        let (is_initialized, admin, base_fee, fee_per_word, request_counter, subscription_counter, bump) =
            array_refs![src, 1, 32, 8, 8, 8, 8, 1];

        Ok(CoordinatorConfig {
            is_initialized: is_initialized[0] != 0,
            admin: Pubkey::new_from_array(*admin),
            base_fee: u64::from_le_bytes(*base_fee),
            fee_per_word: u64::from_le_bytes(*fee_per_word),
            request_counter: u64::from_le_bytes(*request_counter),
            subscription_counter: u64::from_le_bytes(*subscription_counter),
            bump: bump[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, CoordinatorConfig::LEN];
        let (
            is_initialized_dst,
            admin_dst,
            base_fee_dst,
            fee_per_word_dst,
            request_counter_dst,
            subscription_counter_dst,
            bump_dst,
        ) = mut_array_refs![dst, 1, 32, 8, 8, 8, 8, 1];

        is_initialized_dst[0] = self.is_initialized as u8;
        admin_dst.copy_from_slice(self.admin.as_ref());
        *base_fee_dst = self.base_fee.to_le_bytes();
        *fee_per_word_dst = self.fee_per_word.to_le_bytes();
        *request_counter_dst = self.request_counter.to_le_bytes();
        *subscription_counter_dst = self.subscription_counter.to_le_bytes();
        bump_dst[0] = self.bump;
    }
}

/// A prepaid subscription consumers draw on when their requests are fulfilled.
///
/// Seeds: `["subscription", id.to_le_bytes()]`
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Subscription {
    pub is_initialized: bool,
    pub id: u64,
    pub owner: Pubkey,
    /// Lamports available for fulfillment fees
    pub balance: u64,
    pub req_count: u64,
    /// Accounts allowed to sign randomness requests against this subscription
    pub consumers: Vec<Pubkey>,
    pub bump: u8,
}

impl Subscription {
    pub const LEN: usize = 1 + 8 + 32 + 8 + 8 + 4 + 32 * MAX_CONSUMERS + 1;

    pub fn new(id: u64, owner: Pubkey, bump: u8) -> Self {
        Self {
            is_initialized: true,
            id,
            owner,
            balance: 0,
            req_count: 0,
            consumers: Vec::new(),
            bump,
        }
    }

    pub fn is_consumer(&self, consumer: &Pubkey) -> bool {
        self.consumers.contains(consumer)
    }

    /// Registers `consumer`; returns false when it was already present.
    pub fn add_consumer(&mut self, consumer: Pubkey) -> Result<bool, CoordinatorError> {
        if self.is_consumer(&consumer) {
            return Ok(false);
        }
        if self.consumers.len() >= MAX_CONSUMERS {
            return Err(CoordinatorError::TooManyConsumers);
        }
        self.consumers.push(consumer);
        Ok(true)
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), CoordinatorError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(CoordinatorError::InsufficientBalance)?;
        Ok(())
    }

    pub fn load(src: &[u8]) -> Result<Self, ProgramError> {
        let subscription = Self::deserialize(&mut &src[..])
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if !subscription.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(subscription)
    }

    pub fn store(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        self.serialize(&mut &mut dst[..])
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }
}

/// Status of a randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Awaiting fulfillment
    Pending,
    /// Words delivered to the consumer
    Fulfilled,
}

impl TryFrom<u8> for RequestStatus {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RequestStatus::Pending),
            1 => Ok(RequestStatus::Fulfilled),
            _ => Err("Invalid request status"),
        }
    }
}

impl From<RequestStatus> for u8 {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Pending => 0,
            RequestStatus::Fulfilled => 1,
        }
    }
}

/// One randomness request.
///
/// Seeds: `["request", request_id.to_le_bytes()]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomnessRequest {
    pub is_initialized: bool,
    pub request_id: u64,
    pub subscription_id: u64,
    /// Account that signed the request
    pub consumer: Pubkey,
    /// Program that receives the callback (owner of `consumer`)
    pub consumer_program: Pubkey,
    pub num_words: u32,
    pub callback_compute_limit: u32,
    /// Gas lane the consumer asked for
    pub key_hash: [u8; 32],
    pub request_slot: Slot,
    pub status: RequestStatus,
}

impl RandomnessRequest {
    pub fn is_pending(&self) -> bool {
        self.is_initialized && self.status == RequestStatus::Pending
    }
}

impl Sealed for RandomnessRequest {}

impl IsInitialized for RandomnessRequest {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for RandomnessRequest {
    const LEN: usize = 1 + 8 + 8 + 32 + 32 + 4 + 4 + 32 + 8 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RandomnessRequest::LEN];
        let (
            is_initialized,
            request_id,
            subscription_id,
            consumer,
            consumer_program,
            num_words,
            callback_compute_limit,
            key_hash,
            request_slot,
            status,
        ) = array_refs![src, 1, 8, 8, 32, 32, 4, 4, 32, 8, 1];

        let status = RequestStatus::try_from(status[0]).map_err(|_| ProgramError::InvalidAccountData)?;

        Ok(RandomnessRequest {
            is_initialized: is_initialized[0] != 0,
            request_id: u64::from_le_bytes(*request_id),
            subscription_id: u64::from_le_bytes(*subscription_id),
            consumer: Pubkey::new_from_array(*consumer),
            consumer_program: Pubkey::new_from_array(*consumer_program),
            num_words: u32::from_le_bytes(*num_words),
            callback_compute_limit: u32::from_le_bytes(*callback_compute_limit),
            key_hash: *key_hash,
            request_slot: u64::from_le_bytes(*request_slot),
            status,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RandomnessRequest::LEN];
        let (
            is_initialized_dst,
            request_id_dst,
            subscription_id_dst,
            consumer_dst,
            consumer_program_dst,
            num_words_dst,
            callback_compute_limit_dst,
            key_hash_dst,
            request_slot_dst,
            status_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 32, 32, 4, 4, 32, 8, 1];

        is_initialized_dst[0] = self.is_initialized as u8;
        *request_id_dst = self.request_id.to_le_bytes();
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        consumer_dst.copy_from_slice(self.consumer.as_ref());
        consumer_program_dst.copy_from_slice(self.consumer_program.as_ref());
        *num_words_dst = self.num_words.to_le_bytes();
        *callback_compute_limit_dst = self.callback_compute_limit.to_le_bytes();
        key_hash_dst.copy_from_slice(&self.key_hash);
        *request_slot_dst = self.request_slot.to_le_bytes();
        status_dst[0] = self.status.into();
    }
}

pub fn find_config_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONFIG_SEED], program_id)
}

pub fn find_subscription_address(program_id: &Pubkey, subscription_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes()], program_id)
}

pub fn find_request_address(program_id: &Pubkey, request_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REQUEST_SEED, &request_id.to_le_bytes()], program_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfillment_fee_adds_per_word_cost() {
        let config = CoordinatorConfig {
            is_initialized: true,
            admin: Pubkey::new_unique(),
            base_fee: 250_000,
            fee_per_word: 1_000,
            request_counter: 0,
            subscription_counter: 0,
            bump: 255,
        };
        assert_eq!(config.fulfillment_fee(1), Ok(251_000));
        assert_eq!(config.fulfillment_fee(3), Ok(253_000));

        let greedy = CoordinatorConfig { fee_per_word: u64::MAX, ..config };
        assert_eq!(greedy.fulfillment_fee(2), Err(CoordinatorError::Overflow));
    }

    #[test]
    fn request_survives_pack_and_keeps_status() {
        let request = RandomnessRequest {
            is_initialized: true,
            request_id: 7,
            subscription_id: 1,
            consumer: Pubkey::new_unique(),
            consumer_program: Pubkey::new_unique(),
            num_words: 2,
            callback_compute_limit: 200_000,
            key_hash: [9; 32],
            request_slot: 42,
            status: RequestStatus::Fulfilled,
        };
        let mut data = vec![0u8; RandomnessRequest::LEN];
        RandomnessRequest::pack(request, &mut data).unwrap();

        let unpacked = RandomnessRequest::unpack(&data).unwrap();
        assert_eq!(unpacked, request);
        assert!(!unpacked.is_pending());
    }

    #[test]
    fn unknown_request_status_is_rejected() {
        let mut data = vec![0u8; RandomnessRequest::LEN];
        data[0] = 1;
        data[RandomnessRequest::LEN - 1] = 9;
        assert_eq!(
            RandomnessRequest::unpack(&data),
            Err(ProgramError::InvalidAccountData)
        );
    }

    #[test]
    fn consumers_are_deduplicated_and_bounded() {
        let mut subscription = Subscription::new(1, Pubkey::new_unique(), 254);
        let consumer = Pubkey::new_unique();

        assert_eq!(subscription.add_consumer(consumer), Ok(true));
        assert_eq!(subscription.add_consumer(consumer), Ok(false));
        for _ in 1..MAX_CONSUMERS {
            subscription.add_consumer(Pubkey::new_unique()).unwrap();
        }
        assert_eq!(
            subscription.add_consumer(Pubkey::new_unique()),
            Err(CoordinatorError::TooManyConsumers)
        );
    }

    #[test]
    fn subscription_fits_its_account() {
        let mut subscription = Subscription::new(3, Pubkey::new_unique(), 200);
        for _ in 0..MAX_CONSUMERS {
            subscription.add_consumer(Pubkey::new_unique()).unwrap();
        }
        subscription.balance = 10;
        let mut data = vec![0u8; Subscription::LEN];
        subscription.store(&mut data).unwrap();
        assert_eq!(Subscription::load(&data).unwrap(), subscription);

        assert_eq!(subscription.charge(11), Err(CoordinatorError::InsufficientBalance));
        subscription.charge(10).unwrap();
        assert_eq!(subscription.balance, 0);
    }
}
