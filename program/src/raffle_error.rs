use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Errors that may be returned by the Raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Payment is below the entrance fee
    #[error("Raffle__NotEnoughEth")]
    NotEnoughEth,

    /// Entries are only accepted while the raffle is open
    #[error("Raffle__NotOpen")]
    NotOpen,

    /// Upkeep conditions are not met; the snapshot is written to the program log
    #[error("Raffle__UpkeepNotNeeded")]
    UpkeepNotNeeded,

    /// Fulfillment for a request id the raffle is not waiting on
    #[error("nonexistent request")]
    NonexistentRequest,

    /// The raffle account already exists
    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Deployment parameters out of range
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    /// No room left for another player
    #[error("Raffle is full")]
    RaffleFull,

    /// Fulfillment not signed by the configured coordinator
    #[error("Only the VRF coordinator can fulfill")]
    OnlyCoordinatorCanFulfill,

    #[error("Fulfillment carried no random words")]
    MissingRandomWords,

    /// Account supplied as winner is not the selected player
    #[error("Winner account does not match the selected player")]
    WinnerMismatch,

    /// Coordinator accounts differ from the ones configured at deployment
    #[error("Invalid VRF coordinator")]
    InvalidCoordinator,

    /// Coordinator did not hand back a usable request id
    #[error("Invalid request id")]
    InvalidRequestId,

    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
