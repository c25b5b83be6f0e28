use solana_program::{instruction::Instruction, native_token::LAMPORTS_PER_SOL, program_pack::Pack};
use solana_program_test::*;
use solana_sdk::{
    instruction::InstructionError,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    sysvar::clock::Clock,
    transaction::{Transaction, TransactionError},
};

use raffle::{
    config::{Cluster, NetworkConfig, RaffleConfig},
    process_instruction,
    raffle_error::RaffleError,
    raffle_instruction,
    raffle_state::{Raffle, RaffleState},
    utils::find_raffle_address,
};
use vrf_coordinator_mock::{
    callback::random_words_for,
    error::CoordinatorError,
    instruction as coordinator_instruction,
    state::{find_config_address, CoordinatorConfig},
};

const BASE_FEE: u64 = 250_000;
const FEE_PER_WORD: u64 = 1_000;
const SUBSCRIPTION_ID: u64 = 1;

struct TestRaffle {
    context: ProgramTestContext,
    program_id: Pubkey,
    coordinator_program: Pubkey,
    config: RaffleConfig,
}

impl TestRaffle {
    async fn process(&mut self, instructions: &[Instruction], signers: &[&Keypair]) -> Result<(), TransactionError> {
        self.process_with_logs(instructions, signers).await.0
    }

    async fn process_with_logs(
        &mut self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> (Result<(), TransactionError>, Vec<String>) {
        let blockhash = self
            .context
            .banks_client
            .get_new_latest_blockhash(&self.context.last_blockhash)
            .await
            .unwrap();
        self.context.last_blockhash = blockhash;
        let mut all_signers = vec![&self.context.payer];
        all_signers.extend_from_slice(signers);
        let transaction = Transaction::new_signed_with_payer(
            instructions,
            Some(&self.context.payer.pubkey()),
            &all_signers,
            blockhash,
        );
        let outcome = self
            .context
            .banks_client
            .process_transaction_with_metadata(transaction)
            .await
            .unwrap();
        let logs = outcome.metadata.map(|metadata| metadata.log_messages).unwrap_or_default();
        (outcome.result, logs)
    }

    fn payer(&self) -> Pubkey {
        self.context.payer.pubkey()
    }

    fn raffle_address(&self) -> Pubkey {
        find_raffle_address(&self.program_id).0
    }

    async fn raffle(&mut self) -> Raffle {
        let account = self
            .context
            .banks_client
            .get_account(self.raffle_address())
            .await
            .unwrap()
            .unwrap();
        Raffle::load(&account.data).unwrap()
    }

    async fn balance(&mut self, address: Pubkey) -> u64 {
        self.context.banks_client.get_balance(address).await.unwrap()
    }

    async fn next_request_id(&mut self) -> u64 {
        let (config, _) = find_config_address(&self.coordinator_program);
        let account = self.context.banks_client.get_account(config).await.unwrap().unwrap();
        CoordinatorConfig::unpack(&account.data).unwrap().request_counter + 1
    }

    async fn warp_seconds(&mut self, seconds: i64) {
        let mut clock: Clock = self.context.banks_client.get_sysvar().await.unwrap();
        clock.unix_timestamp += seconds;
        self.context.set_sysvar(&clock);
    }

    async fn funded_player(&mut self) -> Keypair {
        let player = Keypair::new();
        let ix = system_instruction::transfer(&self.payer(), &player.pubkey(), LAMPORTS_PER_SOL);
        self.process(&[ix], &[]).await.unwrap();
        player
    }

    async fn enter(&mut self, player: &Keypair, amount: u64) -> Result<(), TransactionError> {
        let ix = raffle_instruction::enter_raffle(&self.program_id, &player.pubkey(), amount).unwrap();
        self.process(&[ix], &[player]).await
    }

    async fn check_upkeep(&mut self) -> bool {
        let ix = raffle_instruction::check_upkeep(&self.program_id, &[]).unwrap();
        let (result, logs) = self.process_with_logs(&[ix], &[]).await;
        result.unwrap();
        logs.iter().any(|line| line.contains("CheckUpkeep: upkeep_needed=true"))
    }

    async fn perform_upkeep(&mut self) -> Result<(), TransactionError> {
        let request_id = self.next_request_id().await;
        let ix = raffle_instruction::perform_upkeep(
            &self.program_id,
            &self.payer(),
            &self.coordinator_program,
            SUBSCRIPTION_ID,
            request_id,
            &[],
        )
        .unwrap();
        self.process(&[ix], &[]).await
    }

    async fn fulfill(&mut self, request_id: u64, winner: &Pubkey) -> Result<(), TransactionError> {
        let ix = coordinator_instruction::fulfill_random_words(
            &self.coordinator_program,
            SUBSCRIPTION_ID,
            request_id,
            &self.program_id,
            &raffle_instruction::fulfillment_accounts(&self.program_id, winner),
        )
        .unwrap();
        self.process(&[ix], &[]).await
    }
}

fn custom_error(code: u32) -> TransactionError {
    TransactionError::InstructionError(0, InstructionError::Custom(code))
}

fn raffle_error(error: RaffleError) -> TransactionError {
    custom_error(error as u32)
}

// Deploys the coordinator, a funded subscription and the raffle registered as its consumer
async fn setup() -> TestRaffle {
    let program_id = Pubkey::new_unique();
    let coordinator_program = Pubkey::new_unique();

    let mut program_test = ProgramTest::new("raffle", program_id, processor!(process_instruction));
    program_test.add_program(
        "vrf_coordinator_mock",
        coordinator_program,
        processor!(vrf_coordinator_mock::process_instruction),
    );
    let context = program_test.start_with_context().await;

    let config = NetworkConfig::for_cluster(Cluster::Localnet).raffle_config(SUBSCRIPTION_ID);
    let mut test = TestRaffle {
        context,
        program_id,
        coordinator_program,
        config,
    };

    let payer = test.payer();
    let deploy = vec![
        coordinator_instruction::initialize(&coordinator_program, &payer, BASE_FEE, FEE_PER_WORD).unwrap(),
        coordinator_instruction::create_subscription(&coordinator_program, &payer, SUBSCRIPTION_ID).unwrap(),
        coordinator_instruction::fund_subscription(&coordinator_program, &payer, SUBSCRIPTION_ID, LAMPORTS_PER_SOL)
            .unwrap(),
        raffle_instruction::initialize_raffle(&program_id, &payer, &coordinator_program, config).unwrap(),
        coordinator_instruction::add_consumer(
            &coordinator_program,
            &payer,
            SUBSCRIPTION_ID,
            &find_raffle_address(&program_id).0,
        )
        .unwrap(),
    ];
    test.process(&deploy, &[]).await.unwrap();
    test
}

// Enters `count` funded players and moves the clock past the interval
async fn setup_ready_round(count: usize) -> (TestRaffle, Vec<Keypair>) {
    let mut test = setup().await;
    let mut players = Vec::with_capacity(count);
    for _ in 0..count {
        let player = test.funded_player().await;
        let fee = test.config.entrance_fee;
        test.enter(&player, fee).await.unwrap();
        players.push(player);
    }
    let interval = test.config.interval;
    test.warp_seconds(interval + 1).await;
    (test, players)
}

#[tokio::test]
async fn test_initializes_open_raffle() {
    let mut test = setup().await;
    let raffle = test.raffle().await;
    let clock: Clock = test.context.banks_client.get_sysvar().await.unwrap();

    assert_eq!(raffle.raffle_state(), RaffleState::Open);
    assert_eq!(raffle.entrance_fee(), test.config.entrance_fee);
    assert_eq!(raffle.interval(), test.config.interval);
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.recent_winner(), None);
    assert!(raffle.latest_timestamp() <= clock.unix_timestamp);
    assert_eq!(raffle.vrf_coordinator(), &find_config_address(&test.coordinator_program).0);
    assert_eq!(raffle.request_confirmations(), 3);
    assert_eq!(raffle.num_words(), 1);
}

#[tokio::test]
async fn test_cannot_initialize_twice() {
    let mut test = setup().await;
    let payer = test.payer();
    let ix = raffle_instruction::initialize_raffle(&test.program_id, &payer, &test.coordinator_program, test.config)
        .unwrap();

    assert_eq!(test.process(&[ix], &[]).await, Err(raffle_error(RaffleError::AlreadyInitialized)));
}

#[tokio::test]
async fn test_enter_requires_entrance_fee() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.config.entrance_fee;

    assert_eq!(test.enter(&player, fee - 1).await, Err(raffle_error(RaffleError::NotEnoughEth)));
    assert_eq!(test.enter(&player, 0).await, Err(raffle_error(RaffleError::NotEnoughEth)));
    assert_eq!(test.raffle().await.number_of_players(), 0);
}

#[tokio::test]
async fn test_enter_records_player_and_emits_event() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.config.entrance_fee;
    let raffle_address = test.raffle_address();
    let balance_before = test.balance(raffle_address).await;

    let ix = raffle_instruction::enter_raffle(&test.program_id, &player.pubkey(), fee).unwrap();
    let (result, logs) = test.process_with_logs(&[ix], &[&player]).await;

    assert_eq!(result, Ok(()));
    let expected = format!("RaffleEnter: {}", player.pubkey());
    assert!(logs.iter().any(|line| line.contains(&expected)));

    let raffle = test.raffle().await;
    assert_eq!(raffle.number_of_players(), 1);
    assert_eq!(raffle.player(0), Some(&player.pubkey()));
    assert_eq!(test.balance(raffle_address).await, balance_before + fee);
}

#[tokio::test]
async fn test_enter_rejected_while_calculating() {
    let (mut test, _) = setup_ready_round(1).await;
    test.perform_upkeep().await.unwrap();

    let latecomer = test.funded_player().await;
    let fee = test.config.entrance_fee;
    assert_eq!(test.enter(&latecomer, fee).await, Err(raffle_error(RaffleError::NotOpen)));
}

#[tokio::test]
async fn test_check_upkeep_false_without_players() {
    let mut test = setup().await;
    let interval = test.config.interval;
    test.warp_seconds(interval + 1).await;

    assert!(!test.check_upkeep().await);
}

#[tokio::test]
async fn test_check_upkeep_false_before_interval() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.config.entrance_fee;
    test.enter(&player, fee).await.unwrap();

    assert!(!test.check_upkeep().await);
}

#[tokio::test]
async fn test_check_upkeep_tracks_round_state() {
    let (mut test, _) = setup_ready_round(1).await;
    assert!(test.check_upkeep().await);

    test.perform_upkeep().await.unwrap();
    assert_eq!(test.raffle().await.raffle_state(), RaffleState::Calculating);
    assert!(!test.check_upkeep().await);
}

#[tokio::test]
async fn test_perform_upkeep_fails_when_not_needed() {
    let mut test = setup().await;
    assert_eq!(test.perform_upkeep().await, Err(raffle_error(RaffleError::UpkeepNotNeeded)));

    let player = test.funded_player().await;
    let fee = test.config.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    assert_eq!(test.perform_upkeep().await, Err(raffle_error(RaffleError::UpkeepNotNeeded)));
    assert_eq!(test.raffle().await.raffle_state(), RaffleState::Open);
}

#[tokio::test]
async fn test_perform_upkeep_requests_randomness() {
    let (mut test, _) = setup_ready_round(1).await;
    let request_id = test.next_request_id().await;
    let ix = raffle_instruction::perform_upkeep(
        &test.program_id,
        &test.payer(),
        &test.coordinator_program,
        SUBSCRIPTION_ID,
        request_id,
        &[],
    )
    .unwrap();

    let (result, logs) = test.process_with_logs(&[ix], &[]).await;

    assert_eq!(result, Ok(()));
    assert!(request_id > 0);
    let expected = format!("RequestedRaffleWinner: {}", request_id);
    assert!(logs.iter().any(|line| line.contains(&expected)));

    let raffle = test.raffle().await;
    assert_eq!(raffle.raffle_state(), RaffleState::Calculating);
    assert_eq!(raffle.pending_request(), Some(request_id));
}

#[tokio::test]
async fn test_fulfill_unknown_request_fails() {
    let (mut test, players) = setup_ready_round(1).await;
    let player = players[0].pubkey();

    for request_id in [0, 1] {
        assert_eq!(
            test.fulfill(request_id, &player).await,
            Err(custom_error(CoordinatorError::NonexistentRequest as u32))
        );
    }
}

#[tokio::test]
async fn test_only_coordinator_can_fulfill() {
    let (mut test, players) = setup_ready_round(1).await;
    test.perform_upkeep().await.unwrap();

    let impostor = Keypair::new();
    let ix = raffle_instruction::fulfill_random_words(
        &test.program_id,
        &impostor.pubkey(),
        &players[0].pubkey(),
        1,
        &random_words_for(1, 1),
    )
    .unwrap();

    assert_eq!(
        test.process(&[ix], &[&impostor]).await,
        Err(raffle_error(RaffleError::OnlyCoordinatorCanFulfill))
    );
    assert_eq!(test.raffle().await.raffle_state(), RaffleState::Calculating);
}

#[tokio::test]
async fn test_single_entrant_wins_the_pot() {
    let (mut test, players) = setup_ready_round(1).await;
    let player = players[0].pubkey();
    let fee = test.config.entrance_fee;
    let started_at = test.raffle().await.latest_timestamp();

    test.perform_upkeep().await.unwrap();
    let request_id = test.raffle().await.pending_request().unwrap();
    let starting_balance = test.balance(player).await;

    test.fulfill(request_id, &player).await.unwrap();

    let raffle = test.raffle().await;
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.raffle_state(), RaffleState::Open);
    assert_eq!(raffle.recent_winner(), Some(player));
    assert_eq!(raffle.pending_request(), None);
    assert!(raffle.latest_timestamp() > started_at);
    assert_eq!(test.balance(player).await, starting_balance + fee);

    // A fulfilled request cannot be delivered twice
    assert_eq!(
        test.fulfill(request_id, &player).await,
        Err(custom_error(CoordinatorError::NonexistentRequest as u32))
    );
}

#[tokio::test]
async fn test_picks_winner_by_modulo_and_pays_everything() {
    let (mut test, players) = setup_ready_round(4).await;
    let fee = test.config.entrance_fee;
    let raffle_address = test.raffle_address();

    test.perform_upkeep().await.unwrap();
    let request_id = test.raffle().await.pending_request().unwrap();

    // Only the lowest two bits of the big-endian word matter modulo 4
    let word = random_words_for(request_id, 1)[0];
    let winner = players[(word[31] % 4) as usize].pubkey();
    let starting_balance = test.balance(winner).await;
    let raffle_balance = test.balance(raffle_address).await;

    let (result, logs) = {
        let ix = coordinator_instruction::fulfill_random_words(
            &test.coordinator_program,
            SUBSCRIPTION_ID,
            request_id,
            &test.program_id,
            &raffle_instruction::fulfillment_accounts(&test.program_id, &winner),
        )
        .unwrap();
        test.process_with_logs(&[ix], &[]).await
    };

    assert_eq!(result, Ok(()));
    let expected = format!("WinnerPicked: {}", winner);
    assert!(logs.iter().any(|line| line.contains(&expected)));

    let raffle = test.raffle().await;
    assert_eq!(raffle.recent_winner(), Some(winner));
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.raffle_state(), RaffleState::Open);
    assert_eq!(test.balance(winner).await, starting_balance + 4 * fee);
    assert_eq!(test.balance(raffle_address).await, raffle_balance - 4 * fee);
}

#[tokio::test]
async fn test_wrong_winner_rolls_back_settlement() {
    let (mut test, players) = setup_ready_round(2).await;
    test.perform_upkeep().await.unwrap();
    let before = test.raffle().await;
    let request_id = before.pending_request().unwrap();

    let selected = before.select_winner(&random_words_for(request_id, 1)).unwrap();
    let other = players
        .iter()
        .map(|player| player.pubkey())
        .find(|player| *player != selected)
        .unwrap();

    assert_eq!(
        test.fulfill(request_id, &other).await,
        Err(raffle_error(RaffleError::WinnerMismatch))
    );
    assert_eq!(test.raffle().await, before);

    test.fulfill(request_id, &selected).await.unwrap();
    assert_eq!(test.raffle().await.recent_winner(), Some(selected));
}

#[tokio::test]
async fn test_runs_consecutive_rounds() {
    let (mut test, players) = setup_ready_round(1).await;
    test.perform_upkeep().await.unwrap();
    test.fulfill(1, &players[0].pubkey()).await.unwrap();

    let fee = test.config.entrance_fee;
    test.enter(&players[0], fee).await.unwrap();
    assert!(!test.check_upkeep().await);

    let interval = test.config.interval;
    test.warp_seconds(interval).await;
    test.perform_upkeep().await.unwrap();
    assert_eq!(test.raffle().await.pending_request(), Some(2));

    test.fulfill(2, &players[0].pubkey()).await.unwrap();
    assert_eq!(test.raffle().await.raffle_state(), RaffleState::Open);
}
