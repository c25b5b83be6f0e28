use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Errors that may be returned by the VRF coordinator
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Coordinator config already exists
    #[error("Coordinator is already initialized")]
    AlreadyInitialized,

    /// Subscription account does not match the subscription id
    #[error("Invalid subscription")]
    InvalidSubscription,

    /// Only the subscription owner may manage consumers
    #[error("Only the subscription owner can perform this action")]
    NotSubscriptionOwner,

    /// Consumer list is full
    #[error("Too many consumers")]
    TooManyConsumers,

    /// Consumer is not registered on the subscription
    #[error("Invalid consumer")]
    InvalidConsumer,

    #[error("Invalid request confirmations")]
    InvalidRequestConfirmations,

    /// Zero words, or more than the coordinator allows per request
    #[error("Invalid number of random words")]
    InvalidNumWords,

    /// Request id was never issued or has already been fulfilled
    #[error("nonexistent request")]
    NonexistentRequest,

    /// Subscription cannot pay for the fulfillment
    #[error("Insufficient subscription balance")]
    InsufficientBalance,

    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<CoordinatorError> for ProgramError {
    fn from(e: CoordinatorError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
