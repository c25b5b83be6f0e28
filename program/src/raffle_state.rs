use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, msg, program_error::ProgramError, pubkey::Pubkey};
use std::fmt;
use vrf_coordinator_mock::callback::RandomWord;

use crate::{config::RaffleConfig, raffle_error::RaffleError, vrf};

/// Seed of the raffle PDA
pub const RAFFLE_SEED: &[u8] = b"raffle";
/// Players a single round can hold
pub const MAX_PLAYERS: usize = 64;
/// Confirmations the coordinator waits for before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;
/// Random words requested per round
pub const NUM_WORDS: u32 = 1;

/// Status of the raffle round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Waiting for the coordinator to deliver randomness
    Calculating,
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Calculating => 1,
        }
    }
}

/// Snapshot of every upkeep condition at one instant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepStatus {
    pub upkeep_needed: bool,
    /// Lamports held above the rent-exempt minimum
    pub balance: u64,
    pub num_players: u64,
    pub raffle_state: RaffleState,
    /// Seconds since the last settlement
    pub time_elapsed: i64,
}

impl fmt::Display for UpkeepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "upkeep_needed={}, balance={}, players={}, state={}, elapsed={}s",
            self.upkeep_needed,
            self.balance,
            self.num_players,
            u8::from(self.raffle_state),
            self.time_elapsed
        )
    }
}

/// Raffle account data
///
/// Stored in the singleton PDA `["raffle"]`. Fields are only changed by the
/// round operations below; clients read them through the accessors.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Raffle {
    is_initialized: bool,
    bump: u8,
    entrance_fee: u64,
    interval: i64,
    /// Program that serves randomness requests
    vrf_coordinator_program: Pubkey,
    /// Coordinator PDA that signs fulfillments
    vrf_coordinator: Pubkey,
    gas_lane: [u8; 32],
    subscription_id: u64,
    callback_compute_limit: u32,
    state: RaffleState,
    last_timestamp: UnixTimestamp,
    recent_winner: Option<Pubkey>,
    /// Request the raffle is waiting on; set only while calculating
    pending_request: Option<u64>,
    players: Vec<Pubkey>,
}

impl Raffle {
    pub const LEN: usize = 1 + 1 + 8 + 8 + 32 + 32 + 32 + 8 + 4 + 1 + 8 + 33 + 9 + 4 + 32 * MAX_PLAYERS;

    pub fn new(
        config: &RaffleConfig,
        vrf_coordinator_program: Pubkey,
        vrf_coordinator: Pubkey,
        bump: u8,
        now: UnixTimestamp,
    ) -> Self {
        Self {
            is_initialized: true,
            bump,
            entrance_fee: config.entrance_fee,
            interval: config.interval,
            vrf_coordinator_program,
            vrf_coordinator,
            gas_lane: config.gas_lane,
            subscription_id: config.subscription_id,
            callback_compute_limit: config.callback_compute_limit,
            state: RaffleState::Open,
            last_timestamp: now,
            recent_winner: None,
            pending_request: None,
            players: Vec::with_capacity(MAX_PLAYERS),
        }
    }

    pub fn load(src: &[u8]) -> Result<Self, ProgramError> {
        let raffle = Self::deserialize(&mut &src[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !raffle.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(raffle)
    }

    pub fn store(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        self.serialize(&mut &mut dst[..])
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }

    /// Records `player` as the next entrant
    pub fn enter(&mut self, player: Pubkey, amount: u64) -> Result<(), RaffleError> {
        if amount < self.entrance_fee {
            return Err(RaffleError::NotEnoughEth);
        }
        if self.state != RaffleState::Open {
            return Err(RaffleError::NotOpen);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RaffleError::RaffleFull);
        }
        self.players.push(player);
        Ok(())
    }

    /// Evaluates the upkeep predicate without touching state
    pub fn check_upkeep(&self, now: UnixTimestamp, balance: u64) -> UpkeepStatus {
        let time_elapsed = now.saturating_sub(self.last_timestamp);
        let is_open = self.state == RaffleState::Open;
        let time_passed = time_elapsed >= self.interval;
        let has_players = !self.players.is_empty();
        let has_balance = balance > 0;

        UpkeepStatus {
            upkeep_needed: is_open && time_passed && has_players && has_balance,
            balance,
            num_players: self.players.len() as u64,
            raffle_state: self.state,
            time_elapsed,
        }
    }

    /// Moves the raffle to `Calculating` if upkeep is needed
    pub fn begin_calculating(&mut self, now: UnixTimestamp, balance: u64) -> Result<UpkeepStatus, RaffleError> {
        let status = self.check_upkeep(now, balance);
        if !status.upkeep_needed {
            msg!("Raffle__UpkeepNotNeeded: {}", status);
            return Err(RaffleError::UpkeepNotNeeded);
        }
        self.state = RaffleState::Calculating;
        Ok(status)
    }

    /// Remembers the request issued for this round
    pub fn track_request(&mut self, request_id: u64) -> Result<(), RaffleError> {
        if self.state != RaffleState::Calculating || self.pending_request.is_some() || request_id == 0 {
            return Err(RaffleError::InvalidRequestId);
        }
        self.pending_request = Some(request_id);
        Ok(())
    }

    /// Player the given words select, if any players are entered
    pub fn select_winner(&self, random_words: &[RandomWord]) -> Option<Pubkey> {
        let word = random_words.first()?;
        if self.players.is_empty() {
            return None;
        }
        let index = vrf::winner_index(word, self.players.len());
        self.players.get(index).copied()
    }

    /// Closes the round for `request_id` and returns the winner.
    ///
    /// Leaves the raffle untouched on error.
    pub fn settle(
        &mut self,
        request_id: u64,
        random_words: &[RandomWord],
        now: UnixTimestamp,
    ) -> Result<Pubkey, RaffleError> {
        if self.state != RaffleState::Calculating || self.pending_request != Some(request_id) {
            return Err(RaffleError::NonexistentRequest);
        }
        if random_words.is_empty() {
            return Err(RaffleError::MissingRandomWords);
        }
        let winner = self
            .select_winner(random_words)
            .ok_or(RaffleError::NonexistentRequest)?;

        self.players.clear();
        self.recent_winner = Some(winner);
        self.state = RaffleState::Open;
        self.last_timestamp = now;
        self.pending_request = None;
        Ok(winner)
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }

    pub fn entrance_fee(&self) -> u64 {
        self.entrance_fee
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.state
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.players.get(index)
    }

    pub fn number_of_players(&self) -> usize {
        self.players.len()
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn latest_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    pub fn pending_request(&self) -> Option<u64> {
        self.pending_request
    }

    pub fn vrf_coordinator_program(&self) -> &Pubkey {
        &self.vrf_coordinator_program
    }

    pub fn vrf_coordinator(&self) -> &Pubkey {
        &self.vrf_coordinator
    }

    pub fn gas_lane(&self) -> [u8; 32] {
        self.gas_lane
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription_id
    }

    pub fn callback_compute_limit(&self) -> u32 {
        self.callback_compute_limit
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }
}
