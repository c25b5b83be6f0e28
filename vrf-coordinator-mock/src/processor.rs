use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    instruction::AccountMeta,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::{
    callback,
    error::CoordinatorError,
    instruction::CoordinatorInstruction,
    state::{
        find_config_address, find_request_address, find_subscription_address, CoordinatorConfig,
        RandomnessRequest, RequestStatus, Subscription, CONFIG_SEED, MAX_NUM_WORDS,
        MAX_REQUEST_CONFIRMATIONS, REQUEST_SEED, SUBSCRIPTION_SEED,
    },
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = CoordinatorInstruction::unpack(instruction_data)?;

        match instruction {
            CoordinatorInstruction::Initialize {
                base_fee,
                fee_per_word,
            } => {
                msg!("Instruction: Initialize Coordinator");
                Self::process_initialize(program_id, accounts, base_fee, fee_per_word)
            }
            CoordinatorInstruction::CreateSubscription => {
                msg!("Instruction: Create Subscription");
                Self::process_create_subscription(program_id, accounts)
            }
            CoordinatorInstruction::FundSubscription {
                subscription_id,
                amount,
            } => {
                msg!("Instruction: Fund Subscription");
                Self::process_fund_subscription(program_id, accounts, subscription_id, amount)
            }
            CoordinatorInstruction::AddConsumer {
                subscription_id,
                consumer,
            } => {
                msg!("Instruction: Add Consumer");
                Self::process_add_consumer(program_id, accounts, subscription_id, consumer)
            }
            CoordinatorInstruction::RequestRandomWords {
                key_hash,
                subscription_id,
                request_confirmations,
                callback_compute_limit,
                num_words,
            } => {
                msg!("Instruction: Request Random Words");
                Self::process_request_random_words(
                    program_id,
                    accounts,
                    key_hash,
                    subscription_id,
                    request_confirmations,
                    callback_compute_limit,
                    num_words,
                )
            }
            CoordinatorInstruction::FulfillRandomWords { request_id } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id)
            }
        }
    }

    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        base_fee: u64,
        fee_per_word: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_config, bump) = find_config_address(program_id);
        if *config_info.key != expected_config {
            msg!("Invalid config account address");
            return Err(ProgramError::InvalidArgument);
        }
        if config_info.owner == program_id {
            return Err(CoordinatorError::AlreadyInitialized.into());
        }

        invoke_signed(
            &system_instruction::create_account(
                admin_info.key,
                config_info.key,
                Rent::get()?.minimum_balance(CoordinatorConfig::LEN),
                CoordinatorConfig::LEN as u64,
                program_id,
            ),
            &[admin_info.clone(), config_info.clone(), system_program_info.clone()],
            &[&[CONFIG_SEED, &[bump]]],
        )?;

        let config = CoordinatorConfig {
            is_initialized: true,
            admin: *admin_info.key,
            base_fee,
            fee_per_word,
            request_counter: 0,
            subscription_counter: 0,
            bump,
        };
        CoordinatorConfig::pack(config, &mut config_info.try_borrow_mut_data()?)?;

        msg!(
            "Coordinator initialized: BaseFee={} lamports, FeePerWord={} lamports",
            base_fee,
            fee_per_word
        );
        Ok(())
    }

    fn process_create_subscription(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Subscription owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut config = Self::load_config(program_id, config_info)?;
        let subscription_id = config
            .subscription_counter
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;

        let (expected_subscription, bump) = find_subscription_address(program_id, subscription_id);
        if *subscription_info.key != expected_subscription {
            msg!("Subscription account must be the PDA for id {}", subscription_id);
            return Err(CoordinatorError::InvalidSubscription.into());
        }

        invoke_signed(
            &system_instruction::create_account(
                owner_info.key,
                subscription_info.key,
                Rent::get()?.minimum_balance(Subscription::LEN),
                Subscription::LEN as u64,
                program_id,
            ),
            &[owner_info.clone(), subscription_info.clone(), system_program_info.clone()],
            &[&[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes(), &[bump]]],
        )?;

        Subscription::new(subscription_id, *owner_info.key, bump)
            .store(&mut subscription_info.try_borrow_mut_data()?)?;

        config.subscription_counter = subscription_id;
        CoordinatorConfig::pack(config, &mut config_info.try_borrow_mut_data()?)?;

        msg!("SubscriptionCreated: id={}, owner={}", subscription_id, owner_info.key);
        Ok(())
    }

    fn process_fund_subscription(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        subscription_id: u64,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let funder_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !funder_info.is_signer {
            msg!("Funder must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut subscription = Self::load_subscription(program_id, subscription_info, subscription_id)?;

        invoke(
            &system_instruction::transfer(funder_info.key, subscription_info.key, amount),
            &[funder_info.clone(), subscription_info.clone(), system_program_info.clone()],
        )?;

        let old_balance = subscription.balance;
        subscription.balance = old_balance
            .checked_add(amount)
            .ok_or(CoordinatorError::Overflow)?;
        subscription.store(&mut subscription_info.try_borrow_mut_data()?)?;

        msg!(
            "SubscriptionFunded: id={}, old_balance={}, new_balance={}",
            subscription_id,
            old_balance,
            subscription.balance
        );
        Ok(())
    }

    fn process_add_consumer(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        subscription_id: u64,
        consumer: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Subscription owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut subscription = Self::load_subscription(program_id, subscription_info, subscription_id)?;
        if subscription.owner != *owner_info.key {
            return Err(CoordinatorError::NotSubscriptionOwner.into());
        }

        if !subscription.add_consumer(consumer)? {
            msg!("Consumer {} already registered on subscription {}", consumer, subscription_id);
            return Ok(());
        }
        subscription.store(&mut subscription_info.try_borrow_mut_data()?)?;

        msg!("ConsumerAdded: subscription={}, consumer={}", subscription_id, consumer);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_request_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_compute_limit: u32,
        num_words: u32,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let consumer_info = next_account_info(account_info_iter)?;
        let payer_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !consumer_info.is_signer || !payer_info.is_signer {
            msg!("Consumer and payer must sign the request");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut config = Self::load_config(program_id, config_info)?;
        let mut subscription = Self::load_subscription(program_id, subscription_info, subscription_id)?;

        if !subscription.is_consumer(consumer_info.key) {
            msg!("{} is not a consumer of subscription {}", consumer_info.key, subscription_id);
            return Err(CoordinatorError::InvalidConsumer.into());
        }
        if request_confirmations > MAX_REQUEST_CONFIRMATIONS {
            return Err(CoordinatorError::InvalidRequestConfirmations.into());
        }
        if num_words == 0 || num_words > MAX_NUM_WORDS {
            msg!("Requested {} words, allowed 1..={}", num_words, MAX_NUM_WORDS);
            return Err(CoordinatorError::InvalidNumWords.into());
        }

        let request_id = config
            .request_counter
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;
        let (expected_request, bump) = find_request_address(program_id, request_id);
        if *request_info.key != expected_request {
            msg!("Request account must be the PDA for id {}", request_id);
            return Err(ProgramError::InvalidArgument);
        }

        invoke_signed(
            &system_instruction::create_account(
                payer_info.key,
                request_info.key,
                Rent::get()?.minimum_balance(RandomnessRequest::LEN),
                RandomnessRequest::LEN as u64,
                program_id,
            ),
            &[payer_info.clone(), request_info.clone(), system_program_info.clone()],
            &[&[REQUEST_SEED, &request_id.to_le_bytes(), &[bump]]],
        )?;

        let request = RandomnessRequest {
            is_initialized: true,
            request_id,
            subscription_id,
            consumer: *consumer_info.key,
            consumer_program: *consumer_info.owner,
            num_words,
            callback_compute_limit,
            key_hash,
            request_slot: Clock::get()?.slot,
            status: RequestStatus::Pending,
        };
        RandomnessRequest::pack(request, &mut request_info.try_borrow_mut_data()?)?;

        config.request_counter = request_id;
        CoordinatorConfig::pack(config, &mut config_info.try_borrow_mut_data()?)?;

        subscription.req_count = subscription
            .req_count
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;
        subscription.store(&mut subscription_info.try_borrow_mut_data()?)?;

        set_return_data(&request_id.to_le_bytes());

        msg!(
            "RandomWordsRequested: request_id={}, subscription={}, consumer={}, num_words={}",
            request_id,
            subscription_id,
            consumer_info.key,
            num_words
        );
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let config_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let consumer_program_info = next_account_info(account_info_iter)?;
        let consumer_infos: Vec<AccountInfo> = account_info_iter.cloned().collect();

        let config = Self::load_config(program_id, config_info)?;

        let (expected_request, _) = find_request_address(program_id, request_id);
        if *request_info.key != expected_request || request_info.owner != program_id {
            msg!("No request was issued with id {}", request_id);
            return Err(CoordinatorError::NonexistentRequest.into());
        }
        let mut request = RandomnessRequest::unpack_unchecked(&request_info.try_borrow_data()?)?;
        if !request.is_pending() || request.request_id != request_id {
            msg!("Request {} is not pending", request_id);
            return Err(CoordinatorError::NonexistentRequest.into());
        }

        let mut subscription =
            Self::load_subscription(program_id, subscription_info, request.subscription_id)?;

        if *consumer_program_info.key != request.consumer_program
            || !consumer_infos.iter().any(|info| *info.key == request.consumer)
        {
            msg!("Callback accounts do not match the requesting consumer");
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        let payment = config.fulfillment_fee(request.num_words)?;
        subscription.charge(payment)?;
        subscription.store(&mut subscription_info.try_borrow_mut_data()?)?;

        request.status = RequestStatus::Fulfilled;
        RandomnessRequest::pack(request, &mut request_info.try_borrow_mut_data()?)?;

        let random_words = callback::random_words_for(request_id, request.num_words);
        let consumer_metas: Vec<AccountMeta> = consumer_infos
            .iter()
            .map(|info| AccountMeta {
                pubkey: *info.key,
                is_signer: info.is_signer,
                is_writable: info.is_writable,
            })
            .collect();
        let callback_ix = callback::fulfill_random_words(
            consumer_program_info.key,
            config_info.key,
            &consumer_metas,
            request_id,
            &random_words,
        );

        let mut callback_infos = Vec::with_capacity(consumer_infos.len() + 2);
        callback_infos.push(config_info.clone());
        callback_infos.push(consumer_program_info.clone());
        callback_infos.extend(consumer_infos);

        invoke_signed(&callback_ix, &callback_infos, &[&[CONFIG_SEED, &[config.bump]]])?;

        // The config signs the callback, so its lamports only change once the consumer returns.
        Self::move_lamports(subscription_info, config_info, payment)?;

        msg!(
            "RandomWordsFulfilled: request_id={}, payment={} lamports",
            request_id,
            payment
        );
        Ok(())
    }

    fn load_config(program_id: &Pubkey, config_info: &AccountInfo) -> Result<CoordinatorConfig, ProgramError> {
        let (expected_config, _) = find_config_address(program_id);
        if *config_info.key != expected_config || config_info.owner != program_id {
            msg!("Invalid coordinator config account");
            return Err(ProgramError::InvalidArgument);
        }
        CoordinatorConfig::unpack(&config_info.try_borrow_data()?)
    }

    fn load_subscription(
        program_id: &Pubkey,
        subscription_info: &AccountInfo,
        subscription_id: u64,
    ) -> Result<Subscription, ProgramError> {
        let (expected_subscription, _) = find_subscription_address(program_id, subscription_id);
        if *subscription_info.key != expected_subscription || subscription_info.owner != program_id {
            msg!("Subscription {} does not exist", subscription_id);
            return Err(CoordinatorError::InvalidSubscription.into());
        }
        Subscription::load(&subscription_info.try_borrow_data()?)
    }

    /// Moves lamports between two accounts owned by this program
    fn move_lamports(from: &AccountInfo, to: &AccountInfo, amount: u64) -> ProgramResult {
        let from_lamports = from.lamports();
        let to_lamports = to.lamports();
        **from.try_borrow_mut_lamports()? = from_lamports
            .checked_sub(amount)
            .ok_or(CoordinatorError::InsufficientBalance)?;
        **to.try_borrow_mut_lamports()? = to_lamports
            .checked_add(amount)
            .ok_or(CoordinatorError::Overflow)?;
        Ok(())
    }
}
