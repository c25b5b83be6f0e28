use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};
use vrf_coordinator_mock::{callback::RandomWord, state::find_config_address};

use crate::{
    config::RaffleConfig,
    events::RaffleEvent,
    raffle_error::RaffleError,
    raffle_instruction::RaffleInstruction,
    raffle_state::{Raffle, RAFFLE_SEED},
    utils::{self, find_raffle_address},
    vrf::{self, CoordinatorAccounts},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle { config } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, config, program_id)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep { .. } => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep { .. } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
        }
    }

    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        config: RaffleConfig,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let deployer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !deployer_info.is_signer {
            msg!("Deployer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_raffle, bump) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidArgument);
        }
        if raffle_info.owner == program_id {
            return Err(RaffleError::AlreadyInitialized.into());
        }

        config.validate()?;

        invoke_signed(
            &system_instruction::create_account(
                deployer_info.key,
                raffle_info.key,
                Rent::get()?.minimum_balance(Raffle::LEN),
                Raffle::LEN as u64,
                program_id,
            ),
            &[deployer_info.clone(), raffle_info.clone(), system_program_info.clone()],
            &[&[RAFFLE_SEED, &[bump]]],
        )?;

        let (coordinator, _) = find_config_address(coordinator_program_info.key);
        let now = Clock::get()?.unix_timestamp;
        let raffle = Raffle::new(&config, *coordinator_program_info.key, coordinator, bump, now);
        raffle.store(&mut raffle_info.try_borrow_mut_data()?)?;

        msg!(
            "Raffle initialized: EntranceFee={} SOL, Interval={}s, Subscription={}, Coordinator={}",
            utils::lamports_to_sol(config.entrance_fee),
            config.interval,
            config.subscription_id,
            coordinator_program_info.key
        );
        Ok(())
    }

    fn process_enter_raffle(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        raffle.enter(*player_info.key, amount)?;

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[player_info.clone(), raffle_info.clone(), system_program_info.clone()],
        )?;

        raffle.store(&mut raffle_info.try_borrow_mut_data()?)?;

        RaffleEvent::RaffleEnter {
            player: *player_info.key,
        }
        .emit();
        Ok(())
    }

    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(raffle_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        let status = raffle.check_upkeep(now, utils::pot(raffle_info, &Rent::get()?));

        let perform_data: Vec<u8> = Vec::new();
        let result = (status.upkeep_needed, perform_data)
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        set_return_data(&result);

        msg!("CheckUpkeep: {}", status);
        Ok(())
    }

    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator = CoordinatorAccounts {
            program: next_account_info(account_info_iter)?,
            config: next_account_info(account_info_iter)?,
            subscription: next_account_info(account_info_iter)?,
            request: next_account_info(account_info_iter)?,
        };
        let system_program_info = next_account_info(account_info_iter)?;

        if !keeper_info.is_signer {
            msg!("Keeper must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        raffle.begin_calculating(now, utils::pot(raffle_info, &Rent::get()?))?;

        let request_id = vrf::request_random_words(
            &raffle,
            &coordinator,
            raffle_info,
            keeper_info,
            system_program_info,
            &[RAFFLE_SEED, &[raffle.bump()]],
        )?;
        raffle.track_request(request_id)?;
        raffle.store(&mut raffle_info.try_borrow_mut_data()?)?;

        RaffleEvent::RequestedRaffleWinner { request_id }.emit();
        Ok(())
    }

    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[RandomWord],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        if !coordinator_info.is_signer || coordinator_info.key != raffle.vrf_coordinator() {
            msg!("{} cannot fulfill, expected coordinator {}", coordinator_info.key, raffle.vrf_coordinator());
            return Err(RaffleError::OnlyCoordinatorCanFulfill.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let winner = raffle.settle(request_id, random_words, now)?;
        if winner != *winner_info.key {
            msg!("Request {} selected {}, got {}", request_id, winner, winner_info.key);
            return Err(RaffleError::WinnerMismatch.into());
        }

        let prize = utils::pot(raffle_info, &Rent::get()?);
        raffle.store(&mut raffle_info.try_borrow_mut_data()?)?;
        utils::transfer_lamports(raffle_info, winner_info, prize)?;

        msg!("Paid {} SOL to {}", utils::lamports_to_sol(prize), winner);
        RaffleEvent::WinnerPicked { winner }.emit();
        Ok(())
    }

    fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Raffle, ProgramError> {
        let (expected_raffle, _) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle || raffle_info.owner != program_id {
            msg!("Invalid raffle account");
            return Err(ProgramError::InvalidArgument);
        }
        Raffle::load(&raffle_info.try_borrow_data()?)
    }
}
