//! End-to-end round lifecycle against the in-memory ledger

use balloonfly::clock::ManualClock;
use balloonfly::config::BalloonflyConfig;
use balloonfly::crash::{Address, Amount, BetStatus, ClientSeed, RoundStatus};
use balloonfly::engine::{CrashEngine, EngineContext};
use balloonfly::errors::GameError;
use balloonfly::fairness::ServerSeed;
use balloonfly::storage::MemoryStore;
use balloonfly::transfer::InMemoryTreasury;
use std::sync::Arc;

const XLM: Amount = 10_000_000;

struct Harness {
    engine: Arc<CrashEngine>,
    admin: Address,
    treasury: Arc<InMemoryTreasury>,
    clock: Arc<ManualClock>,
}

fn harness_with(config: BalloonflyConfig) -> Harness {
    let admin = Address::from("GADMIN");
    let house = Address::new(config.treasury.house_account.clone());
    let treasury = Arc::new(InMemoryTreasury::new(1_000 * XLM).with_balance(house, 100_000 * XLM));
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let ctx = EngineContext::new(Arc::new(MemoryStore::new()), treasury.clone())
        .with_clock(clock.clone());
    let engine = CrashEngine::initialize(ctx, &config, admin.clone()).expect("initialize");
    Harness {
        engine: Arc::new(engine),
        admin,
        treasury,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(BalloonflyConfig::development())
}

fn seed(byte: u8) -> ServerSeed {
    ServerSeed::from_bytes([byte; 32])
}

fn code(result: Result<impl std::fmt::Debug, balloonfly::EngineError>) -> GameError {
    result
        .expect_err("operation should fail")
        .game_error()
        .expect("business error")
}

#[test]
fn test_example_round() {
    let mut config = BalloonflyConfig::development();
    config.game.min_bet = 1;
    let h = harness_with(config);
    let alice = Address::from("A");
    let bob = Address::from("B");

    h.engine.create_round(&h.admin, 1, seed(1).commitment()).unwrap();
    let a_bet = h.engine.place_bet(&alice, 1, 100, ClientSeed::new(vec![1])).unwrap();
    let b_bet = h.engine.place_bet(&bob, 1, 100, ClientSeed::new(vec![2])).unwrap();

    h.clock.advance(10);
    h.engine.start_round(&h.admin, 1, seed(1), 250).unwrap();

    assert_eq!(h.engine.cash_out(&alice, a_bet, 200).unwrap(), 194);

    h.clock.advance(10);
    h.engine.finalize_round(&h.admin, 1).unwrap();

    let round = h.engine.get_round(1).unwrap();
    assert_eq!(round.status, RoundStatus::Ended);
    assert_eq!(round.bet_count, 2);
    assert_eq!(round.total_bet_amount, 200);
    assert_eq!(round.total_payout, 194);
    assert_eq!(
        round.client_seeds,
        vec![ClientSeed::new(vec![1]), ClientSeed::new(vec![2])]
    );
    assert!(round.created_at <= round.started_at && round.started_at <= round.ended_at);

    let a = h.engine.get_bet(a_bet).unwrap();
    assert_eq!(a.status, BetStatus::CashedOut);
    assert_eq!(a.cash_out_multiplier, 200);
    let b = h.engine.get_bet(b_bet).unwrap();
    assert_eq!(b.status, BetStatus::Lost);
    assert_eq!(b.payout, 0);

    let pool = h.engine.get_pool().unwrap();
    assert_eq!(pool.total_bets, 200);
    assert_eq!(pool.total_payouts, 194);
    assert_eq!(pool.total_house_earnings, 6);
}

#[test]
fn test_contract_payout_vectors() {
    let h = harness();
    let alice = Address::from("alice");
    let bob = Address::from("bob");

    h.engine.create_round(&h.admin, 7, seed(7).commitment()).unwrap();
    let a = h.engine.place_bet(&alice, 7, 10 * XLM, ClientSeed::new(vec![])).unwrap();
    let b = h.engine.place_bet(&bob, 7, 50 * XLM, ClientSeed::new(vec![])).unwrap();
    h.engine.start_round(&h.admin, 7, seed(7), 500).unwrap();

    assert_eq!(h.engine.cash_out(&alice, a, 200).unwrap(), 194_000_000);
    assert_eq!(h.engine.cash_out(&bob, b, 350).unwrap(), 1_697_500_000);
    assert_eq!(
        h.treasury.balance_of(&bob),
        1_000 * XLM - 50 * XLM + 1_697_500_000
    );
}

#[test]
fn test_phase_monotonicity() {
    let h = harness();
    let alice = Address::from("alice");

    h.engine.create_round(&h.admin, 1, seed(1).commitment()).unwrap();
    assert_eq!(
        code(h.engine.finalize_round(&h.admin, 1)),
        GameError::InvalidRoundStatus
    );

    h.engine.start_round(&h.admin, 1, seed(1), 300).unwrap();
    assert_eq!(
        code(h.engine.start_round(&h.admin, 1, seed(1), 300)),
        GameError::InvalidRoundStatus
    );
    assert_eq!(
        code(h.engine.place_bet(&alice, 1, XLM, ClientSeed::new(vec![]))),
        GameError::InvalidRoundStatus
    );

    h.engine.finalize_round(&h.admin, 1).unwrap();
    assert_eq!(
        code(h.engine.finalize_round(&h.admin, 1)),
        GameError::InvalidRoundStatus
    );
    assert_eq!(
        code(h.engine.place_bet(&alice, 1, XLM, ClientSeed::new(vec![]))),
        GameError::InvalidRoundStatus
    );
}

#[test]
fn test_commitment_binding() {
    let h = harness();
    h.engine.create_round(&h.admin, 1, seed(1).commitment()).unwrap();

    assert_eq!(
        code(h.engine.start_round(&h.admin, 1, seed(2), 300)),
        GameError::InvalidServerSeedHash
    );
    assert_eq!(
        code(h.engine.start_round(&h.admin, 1, seed(1), 99)),
        GameError::InvalidMultiplier
    );
    let round = h.engine.get_round(1).unwrap();
    assert_eq!(round.status, RoundStatus::Waiting);
    assert!(round.server_seed.is_none());

    h.engine.start_round(&h.admin, 1, seed(1), 100).unwrap();
    let round = h.engine.get_round(1).unwrap();
    assert_eq!(round.server_seed_hash, seed(1).commitment());
    assert_eq!(round.server_seed, Some(seed(1)));
}

#[test]
fn test_missing_records() {
    let h = harness();
    let alice = Address::from("alice");

    assert_eq!(code(h.engine.get_round(4)), GameError::RoundNotFound);
    assert_eq!(code(h.engine.get_bet(4)), GameError::BetNotFound);
    assert_eq!(code(h.engine.round_bets(4)), GameError::RoundNotFound);
    assert_eq!(
        code(h.engine.place_bet(&alice, 4, XLM, ClientSeed::new(vec![]))),
        GameError::RoundNotFound
    );
    assert_eq!(
        code(h.engine.start_round(&h.admin, 4, seed(1), 200)),
        GameError::RoundNotFound
    );
    assert_eq!(code(h.engine.cash_out(&alice, 4, 150)), GameError::BetNotFound);
}

#[test]
fn test_bet_amount_bounds() {
    let h = harness();
    let alice = Address::from("alice");
    h.engine.create_round(&h.admin, 1, seed(1).commitment()).unwrap();

    assert_eq!(
        code(h.engine.place_bet(&alice, 1, XLM - 1, ClientSeed::new(vec![]))),
        GameError::InvalidBetAmount
    );
    assert_eq!(
        code(h.engine.place_bet(&alice, 1, 100_000 * XLM + 1, ClientSeed::new(vec![]))),
        GameError::InvalidBetAmount
    );
    assert!(h.engine.round_bets(1).unwrap().is_empty());

    h.engine.place_bet(&alice, 1, XLM, ClientSeed::new(vec![])).unwrap();
}

#[test]
fn test_cash_out_ceiling_leaves_bet_active() {
    let h = harness();
    let alice = Address::from("alice");
    h.engine.create_round(&h.admin, 1, seed(1).commitment()).unwrap();
    let bet_id = h.engine.place_bet(&alice, 1, XLM, ClientSeed::new(vec![])).unwrap();

    assert_eq!(
        code(h.engine.cash_out(&alice, bet_id, 150)),
        GameError::InvalidRoundStatus
    );

    h.engine.start_round(&h.admin, 1, seed(1), 250).unwrap();
    assert_eq!(code(h.engine.cash_out(&alice, bet_id, 250)), GameError::AlreadyCrashed);
    assert_eq!(code(h.engine.cash_out(&alice, bet_id, 90)), GameError::InvalidMultiplier);
    assert_eq!(h.engine.get_bet(bet_id).unwrap().status, BetStatus::Active);

    h.engine.finalize_round(&h.admin, 1).unwrap();
    assert_eq!(code(h.engine.cash_out(&alice, bet_id, 150)), GameError::BetNotActive);
    assert_eq!(h.engine.get_bet(bet_id).unwrap().status, BetStatus::Lost);
}

#[test]
fn test_finalize_completeness() {
    let h = harness();
    h.engine.create_round(&h.admin, 3, seed(3).commitment()).unwrap();
    let players: Vec<Address> = (0..6).map(|i| Address::new(format!("p{}", i))).collect();
    let ids: Vec<u64> = players
        .iter()
        .map(|p| h.engine.place_bet(p, 3, XLM, ClientSeed::new(vec![])).unwrap())
        .collect();
    h.engine.start_round(&h.admin, 3, seed(3), 400).unwrap();
    h.engine.cash_out(&players[1], ids[1], 150).unwrap();
    h.engine.cash_out(&players[4], ids[4], 390).unwrap();
    h.engine.finalize_round(&h.admin, 3).unwrap();

    let bets = h.engine.round_bets(3).unwrap();
    assert_eq!(bets.iter().map(|b| b.id).collect::<Vec<_>>(), ids);
    assert!(bets.iter().all(|b| b.status != BetStatus::Active));
    assert_eq!(bets.iter().filter(|b| b.status == BetStatus::CashedOut).count(), 2);
    assert!(h.engine.get_pool().unwrap().is_balanced());
}

#[test]
fn test_rounds_are_independent() {
    let h = harness();
    let alice = Address::from("alice");
    h.engine.create_round(&h.admin, 1, seed(1).commitment()).unwrap();
    h.engine.create_round(&h.admin, 2, seed(2).commitment()).unwrap();

    h.engine.place_bet(&alice, 1, XLM, ClientSeed::new(vec![])).unwrap();
    h.engine.place_bet(&alice, 2, XLM, ClientSeed::new(vec![])).unwrap();
    assert_eq!(
        code(h.engine.place_bet(&alice, 2, XLM, ClientSeed::new(vec![]))),
        GameError::BetAlreadyPlaced
    );

    h.engine.start_round(&h.admin, 1, seed(1), 200).unwrap();
    assert_eq!(h.engine.get_round(2).unwrap().status, RoundStatus::Waiting);
}

#[test]
fn test_concurrent_cash_out_settles_once() {
    let h = harness();
    let alice = Address::from("alice");
    h.engine.create_round(&h.admin, 1, seed(1).commitment()).unwrap();
    let bet_id = h.engine.place_bet(&alice, 1, 10 * XLM, ClientSeed::new(vec![])).unwrap();
    h.engine.start_round(&h.admin, 1, seed(1), 500).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&h.engine);
            let alice = alice.clone();
            std::thread::spawn(move || engine.cash_out(&alice, bet_id, 200))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.game_error() == Some(GameError::BetNotActive)));
    assert_eq!(h.engine.get_pool().unwrap().total_payouts, 194_000_000);
}

#[test]
fn test_concurrent_bets_across_rounds_keep_identity() {
    let h = harness();
    for round_id in 1..=4 {
        h.engine
            .create_round(&h.admin, round_id, seed(round_id as u8).commitment())
            .unwrap();
    }

    let handles: Vec<_> = (0..16u64)
        .map(|i| {
            let engine = Arc::clone(&h.engine);
            std::thread::spawn(move || {
                let player = Address::new(format!("player-{}", i));
                engine.place_bet(&player, i % 4 + 1, XLM, ClientSeed::new(vec![i as u8]))
            })
        })
        .collect();
    let mut ids: Vec<u64> = handles.into_iter().map(|t| t.join().unwrap().unwrap()).collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    let pool = h.engine.get_pool().unwrap();
    assert_eq!(pool.total_bets, 16 * XLM);
    assert!(pool.is_balanced());
}
