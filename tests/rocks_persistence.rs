//! Ledger state survives closing and reopening the RocksDB store

use balloonfly::config::{BalloonflyConfig, StorageBackend};
use balloonfly::crash::{Address, BetStatus, ClientSeed, RoundStatus};
use balloonfly::engine::{CrashEngine, EngineContext};
use balloonfly::errors::GameError;
use balloonfly::fairness::ServerSeed;
use balloonfly::storage::open_store;
use balloonfly::transfer::LedgerTreasury;
use std::sync::Arc;

fn rocks_config(dir: &std::path::Path) -> BalloonflyConfig {
    let mut config = BalloonflyConfig::development();
    config.storage.backend = StorageBackend::RocksDb;
    config.storage.data_directory = dir.to_string_lossy().to_string();
    config.storage.clear_on_start = false;
    config
}

fn context(config: &BalloonflyConfig) -> (EngineContext, Arc<LedgerTreasury>) {
    let store = open_store(&config.storage).expect("open store");
    let treasury = Arc::new(LedgerTreasury::new(
        store.clone(),
        config.treasury.demo_credit as i128,
    ));
    treasury
        .seed_balance(&house(config), config.treasury.house_bankroll as i128)
        .expect("seed house");
    (EngineContext::new(store, treasury.clone()), treasury)
}

fn house(config: &BalloonflyConfig) -> Address {
    Address::new(config.treasury.house_account.clone())
}

#[test]
fn test_ledger_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = rocks_config(dir.path());
    let admin = Address::from("GADMIN");
    let alice = Address::from("alice");
    let seed = ServerSeed::from_bytes([8u8; 32]);

    // fresh directory has no admin yet
    let err = CrashEngine::open(context(&config).0, &config).err().unwrap();
    assert_eq!(err.game_error(), Some(GameError::AdminNotInitialized));

    let (bet_id, pool_before) = {
        let (ctx, _) = context(&config);
        let engine = CrashEngine::initialize(ctx, &config, admin.clone()).unwrap();
        engine.create_round(&admin, 1, seed.commitment()).unwrap();
        let bet_id = engine
            .place_bet(&alice, 1, 20_000_000, ClientSeed::new(vec![0xaa, 0xbb]))
            .unwrap();
        engine.start_round(&admin, 1, seed.clone(), 300).unwrap();
        engine.cash_out(&alice, bet_id, 150).unwrap();
        (bet_id, engine.get_pool().unwrap())
    };

    let (ctx, treasury) = context(&config);
    let engine = CrashEngine::open(ctx, &config).unwrap();
    assert_eq!(engine.admin(), &admin);
    assert_eq!(engine.get_pool().unwrap(), pool_before);

    let round = engine.get_round(1).unwrap();
    assert_eq!(round.status, RoundStatus::InProgress);
    assert_eq!(round.server_seed, Some(seed));
    assert_eq!(round.client_seeds, vec![ClientSeed::new(vec![0xaa, 0xbb])]);

    let bet = engine.get_bet(bet_id).unwrap();
    assert_eq!(bet.status, BetStatus::CashedOut);
    assert_eq!(engine.round_bets(1).unwrap(), vec![bet]);

    // balances match the ledger instead of resetting to the opening values
    let stake = 20_000_000;
    let payout = 29_100_000;
    assert_eq!(pool_before.total_payouts, payout);
    assert_eq!(
        treasury.balance_of(&alice).unwrap(),
        config.treasury.demo_credit as i128 - stake + payout
    );
    assert_eq!(
        treasury.balance_of(&house(&config)).unwrap(),
        config.treasury.house_bankroll as i128 + stake - payout
    );

    // the bet id counter continues rather than restarting
    engine.finalize_round(&admin, 1).unwrap();
    engine.create_round(&admin, 2, ServerSeed::from_bytes([9u8; 32]).commitment()).unwrap();
    let next = engine
        .place_bet(&alice, 2, 20_000_000, ClientSeed::new(vec![]))
        .unwrap();
    assert_eq!(next, bet_id + 1);
}

#[test]
fn test_reopen_with_different_admin_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = rocks_config(dir.path());

    drop(CrashEngine::initialize(context(&config).0, &config, Address::from("GADMIN")).unwrap());
    let result = CrashEngine::initialize(context(&config).0, &config, Address::from("GOTHER"));
    assert!(matches!(
        result,
        Err(balloonfly::EngineError::AlreadyInitialized { .. })
    ));
}
