use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};
use std::fmt;

/// Events the raffle writes to the program log
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    RaffleEnter { player: Pubkey },
    RequestedRaffleWinner { request_id: u64 },
    WinnerPicked { winner: Pubkey },
}

impl RaffleEvent {
    /// Logs the event as text and as borsh program data
    pub fn emit(&self) {
        msg!("{}", self);
        if let Ok(data) = self.try_to_vec() {
            sol_log_data(&[data.as_slice()]);
        }
    }
}

impl fmt::Display for RaffleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaffleEvent::RaffleEnter { player } => write!(f, "RaffleEnter: {}", player),
            RaffleEvent::RequestedRaffleWinner { request_id } => {
                write!(f, "RequestedRaffleWinner: {}", request_id)
            }
            RaffleEvent::WinnerPicked { winner } => write!(f, "WinnerPicked: {}", winner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_names_the_event() {
        let player = Pubkey::new_unique();
        assert_eq!(
            RaffleEvent::RaffleEnter { player }.to_string(),
            format!("RaffleEnter: {}", player)
        );
        assert_eq!(
            RaffleEvent::RequestedRaffleWinner { request_id: 3 }.to_string(),
            "RequestedRaffleWinner: 3"
        );
    }

    #[test]
    fn data_form_starts_with_the_variant() {
        let winner = Pubkey::new_unique();
        let data = RaffleEvent::WinnerPicked { winner }.try_to_vec().unwrap();
        assert_eq!(data[0], 2);
        assert_eq!(&data[1..], winner.as_ref());
    }
}
