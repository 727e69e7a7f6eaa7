//! Settlement engine
//!
//! `CrashEngine` owns the ledger store, the treasury and the locks. Each
//! mutating operation follows the same shape:
//!
//! 1. take the round's lock stripe (and the ledger lock if the pool or bet counter
//!    changes)
//! 2. run every check against committed state
//! 3. stage the new records into one batch
//! 4. move funds
//! 5. commit the batch
//!
//! A failed transfer therefore leaves the ledger untouched. A failed commit
//! after a successful transfer is compensated by a reverse transfer.

use crate::auth::AdminGate;
use crate::clock::{Clock, SystemClock};
use crate::config::{BalloonflyConfig, GameConfig};
use crate::crash::types::{Address, Amount, Bet, BetStatus, ClientSeed, Pool, Round, RoundStatus};
use crate::crash::{format_multiplier, BetLimits, PayoutCalculator};
use crate::errors::{ConfigurationError, EngineError, EngineResult, GameError, StorageError};
use crate::fairness::{self, FairnessAudit, SeedHash, ServerSeed};
use crate::game_store::{self, LedgerTxn};
use crate::metrics::EngineMetrics;
use crate::storage::{LedgerStore, WriteBatch};
use crate::transfer::AssetTransfer;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Round locks are striped: rounds whose ids agree modulo this share a
/// mutex, so the lock table never grows with the number of rounds.
const ROUND_LOCK_STRIPES: usize = 64;

/// External collaborators of the engine
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn LedgerStore>,
    pub treasury: Arc<dyn AssetTransfer>,
    pub clock: Arc<dyn Clock>,
}

impl EngineContext {
    pub fn new(store: Arc<dyn LedgerStore>, treasury: Arc<dyn AssetTransfer>) -> Self {
        Self {
            store,
            treasury,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

pub struct CrashEngine {
    store: Arc<dyn LedgerStore>,
    treasury: Arc<dyn AssetTransfer>,
    clock: Arc<dyn Clock>,
    gate: AdminGate,
    game: GameConfig,
    house: Address,
    limits: BetLimits,
    calculator: PayoutCalculator,
    round_locks: Vec<Mutex<()>>,
    /// Guards the pool record and the bet id counter. Always taken after a
    /// round lock, never before.
    ledger_lock: Mutex<()>,
    metrics: Arc<EngineMetrics>,
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    // The guarded value is `()`, so a poisoned lock carries no broken state.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CrashEngine {
    /// Bind the ledger to `admin`, writing the admin record and an empty pool
    /// on first use. Re-initializing with the same admin just opens it.
    pub fn initialize(
        ctx: EngineContext,
        config: &BalloonflyConfig,
        admin: Address,
    ) -> EngineResult<Self> {
        match game_store::load_admin(ctx.store.as_ref())? {
            Some(existing) if existing != admin => {
                warn!(existing = %existing, requested = %admin, "ledger already initialized");
                Err(EngineError::AlreadyInitialized {
                    admin: existing.to_string(),
                })
            }
            Some(_) => Self::build(ctx, config, admin),
            None => {
                let mut txn = LedgerTxn::new();
                txn.put_admin(&admin)?;
                txn.put_pool(&Pool::default())?;
                txn.put_next_bet_id(game_store::FIRST_BET_ID)?;
                ctx.store.commit(txn.into_batch())?;
                info!(admin = %admin, "initialized ledger");
                Self::build(ctx, config, admin)
            }
        }
    }

    /// Open a previously initialized ledger.
    pub fn open(ctx: EngineContext, config: &BalloonflyConfig) -> EngineResult<Self> {
        let admin = game_store::load_admin(ctx.store.as_ref())?
            .ok_or(GameError::AdminNotInitialized)?;
        Self::build(ctx, config, admin)
    }

    fn build(ctx: EngineContext, config: &BalloonflyConfig, admin: Address) -> EngineResult<Self> {
        let metrics = EngineMetrics::new().map_err(|e| {
            ConfigurationError::ValidationFailed(format!("metrics registry: {}", e))
        })?;

        Ok(Self {
            store: ctx.store,
            treasury: ctx.treasury,
            clock: ctx.clock,
            gate: AdminGate::new(admin),
            limits: BetLimits::from_config(&config.game),
            calculator: PayoutCalculator::new(config.game.house_edge_bps),
            game: config.game.clone(),
            house: Address::new(config.treasury.house_account.clone()),
            round_locks: (0..ROUND_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            ledger_lock: Mutex::new(()),
            metrics: Arc::new(metrics),
        })
    }

    pub fn admin(&self) -> &Address {
        self.gate.admin()
    }

    pub fn house(&self) -> &Address {
        &self.house
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.game
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    fn round_lock(&self, round_id: u64) -> &Mutex<()> {
        &self.round_locks[(round_id % ROUND_LOCK_STRIPES as u64) as usize]
    }

    fn finish<T>(&self, operation: &'static str, result: EngineResult<T>) -> EngineResult<T> {
        self.metrics.observe(operation, &result);
        match &result {
            Err(EngineError::Game(e)) => debug!(operation, error = %e, code = e.code(), "rejected"),
            Err(e) => error!(operation, error = %e, "operation failed"),
            Ok(_) => {}
        }
        result
    }

    fn existing_round(&self, round_id: u64) -> EngineResult<Round> {
        game_store::load_round(self.store.as_ref(), round_id)?
            .ok_or_else(|| GameError::RoundNotFound.into())
    }

    fn existing_bet(&self, bet_id: u64) -> EngineResult<Bet> {
        game_store::load_bet(self.store.as_ref(), bet_id)?
            .ok_or_else(|| GameError::BetNotFound.into())
    }

    /// Commit a staged batch after funds moved. If the commit fails, send the
    /// funds back so the ledger and the treasury stay in step.
    fn commit_after_transfer(
        &self,
        batch: WriteBatch,
        refund: Option<(&Address, &Address, Amount)>,
    ) -> EngineResult<()> {
        let Err(commit_err) = self.store.commit(batch) else {
            return Ok(());
        };
        error!(error = %commit_err, "ledger commit failed after transfer");

        if let Some((from, to, amount)) = refund {
            match self.treasury.transfer(from, to, amount) {
                Ok(()) => warn!(from = %from, to = %to, amount = %amount, "compensating transfer sent"),
                Err(e) => error!(
                    from = %from,
                    to = %to,
                    amount = %amount,
                    error = %e,
                    "compensating transfer failed; treasury and ledger disagree"
                ),
            }
        }
        Err(commit_err.into())
    }

    // ---- rounds ----------------------------------------------------------

    pub fn create_round(
        &self,
        caller: &Address,
        round_id: u64,
        server_seed_hash: SeedHash,
    ) -> EngineResult<Round> {
        let result = self.create_round_inner(caller, round_id, server_seed_hash);
        self.finish("create_round", result)
    }

    fn create_round_inner(
        &self,
        caller: &Address,
        round_id: u64,
        server_seed_hash: SeedHash,
    ) -> EngineResult<Round> {
        self.gate.require_admin(caller)?;

        let _round_guard = lock(self.round_lock(round_id));

        if game_store::load_round(self.store.as_ref(), round_id)?.is_some() {
            return Err(GameError::RoundAlreadyExists.into());
        }

        let round = Round::open(round_id, server_seed_hash, self.clock.now());
        let mut txn = LedgerTxn::new();
        txn.put_round(&round)?;
        self.store.commit(txn.into_batch())?;

        info!(round_id, commitment = %server_seed_hash, "round created");
        Ok(round)
    }

    pub fn start_round(
        &self,
        caller: &Address,
        round_id: u64,
        server_seed: ServerSeed,
        crash_multiplier: u64,
    ) -> EngineResult<()> {
        let result = self.start_round_inner(caller, round_id, server_seed, crash_multiplier);
        self.finish("start_round", result)
    }

    fn start_round_inner(
        &self,
        caller: &Address,
        round_id: u64,
        server_seed: ServerSeed,
        crash_multiplier: u64,
    ) -> EngineResult<()> {
        self.gate.require_admin(caller)?;

        let _round_guard = lock(self.round_lock(round_id));

        let mut round = self.existing_round(round_id)?;
        round.reveal(server_seed, crash_multiplier, &self.game, self.clock.now())?;

        let mut txn = LedgerTxn::new();
        txn.put_round(&round)?;
        self.store.commit(txn.into_batch())?;

        info!(
            round_id,
            crash = %format_multiplier(crash_multiplier),
            bets = round.bet_count,
            "round started"
        );
        Ok(())
    }

    pub fn finalize_round(&self, caller: &Address, round_id: u64) -> EngineResult<()> {
        let result = self.finalize_round_inner(caller, round_id);
        self.finish("finalize_round", result)
    }

    fn finalize_round_inner(&self, caller: &Address, round_id: u64) -> EngineResult<()> {
        self.gate.require_admin(caller)?;

        let _round_guard = lock(self.round_lock(round_id));

        let mut round = self.existing_round(round_id)?;
        round.close(self.clock.now())?;

        let mut txn = LedgerTxn::new();
        let mut lost = 0u32;
        for mut bet in game_store::load_round_bets(self.store.as_ref(), round_id)? {
            if bet.status == BetStatus::Active {
                bet.forfeit()?;
                txn.put_bet(&bet)?;
                lost += 1;
            }
        }
        txn.put_round(&round)?;
        self.store.commit(txn.into_batch())?;

        info!(
            round_id,
            lost,
            total_bet = %round.total_bet_amount,
            total_payout = %round.total_payout,
            "round finalized"
        );
        Ok(())
    }

    // ---- wagers ----------------------------------------------------------

    pub fn place_bet(
        &self,
        player: &Address,
        round_id: u64,
        amount: Amount,
        client_seed: ClientSeed,
    ) -> EngineResult<u64> {
        let result = self.place_bet_inner(player, round_id, amount, client_seed);
        self.finish("place_bet", result)
    }

    fn place_bet_inner(
        &self,
        player: &Address,
        round_id: u64,
        amount: Amount,
        client_seed: ClientSeed,
    ) -> EngineResult<u64> {
        let _round_guard = lock(self.round_lock(round_id));

        let mut round = self.existing_round(round_id)?;
        round.ensure_status(RoundStatus::Waiting)?;
        if game_store::find_player_bet(self.store.as_ref(), round_id, player)?.is_some() {
            return Err(GameError::BetAlreadyPlaced.into());
        }
        self.limits.check(amount)?;

        let _ledger_guard = lock(&self.ledger_lock);
        let mut pool = game_store::load_pool(self.store.as_ref())?;
        let bet_id = game_store::load_next_bet_id(self.store.as_ref())?;
        let next_id = bet_id.checked_add(1).ok_or_else(|| {
            StorageError::CorruptedData("bet id counter exhausted".to_string())
        })?;

        round.record_bet(amount, client_seed, self.game.max_client_seeds)?;
        pool.record_wager(amount)?;
        let bet = Bet::place(bet_id, round_id, player.clone(), amount, self.clock.now());

        let mut txn = LedgerTxn::new();
        txn.insert_bet(&bet)?;
        txn.put_round(&round)?;
        txn.put_pool(&pool)?;
        txn.put_next_bet_id(next_id)?;

        if let Err(e) = self.treasury.transfer(player, &self.house, amount) {
            warn!(round_id, player = %player, amount = %amount, error = %e, "stake transfer failed");
            return Err(GameError::TransferFailed.into());
        }
        self.commit_after_transfer(txn.into_batch(), Some((&self.house, player, amount)))?;

        self.metrics.record_wager(amount);
        info!(round_id, bet_id, player = %player, amount = %amount, "bet placed");
        Ok(bet_id)
    }

    pub fn cash_out(
        &self,
        player: &Address,
        bet_id: u64,
        current_multiplier: u64,
    ) -> EngineResult<Amount> {
        let result = self.cash_out_inner(player, bet_id, current_multiplier);
        self.finish("cash_out", result)
    }

    fn cash_out_inner(
        &self,
        player: &Address,
        bet_id: u64,
        current_multiplier: u64,
    ) -> EngineResult<Amount> {
        let round_id = self.existing_bet(bet_id)?.round_id;
        let _round_guard = lock(self.round_lock(round_id));

        // Re-read under the lock; a concurrent cash-out may have settled it.
        let mut bet = self.existing_bet(bet_id)?;
        bet.ensure_owner(player)?;
        bet.ensure_active()?;

        let mut round = self.existing_round(round_id)?;
        round.ensure_status(RoundStatus::InProgress)?;
        let payout = self
            .calculator
            .settle(bet.amount, current_multiplier, round.crash_multiplier)?;

        let _ledger_guard = lock(&self.ledger_lock);
        let mut pool = game_store::load_pool(self.store.as_ref())?;

        bet.cash_out(current_multiplier, payout)?;
        round.record_payout(payout)?;
        pool.record_payout(payout)?;

        let mut txn = LedgerTxn::new();
        txn.put_bet(&bet)?;
        txn.put_round(&round)?;
        txn.put_pool(&pool)?;

        let refund = if payout > 0 {
            if let Err(e) = self.treasury.transfer(&self.house, player, payout) {
                warn!(bet_id, player = %player, payout = %payout, error = %e, "payout transfer failed");
                return Err(GameError::TransferFailed.into());
            }
            Some((player, &self.house, payout))
        } else {
            None
        };
        self.commit_after_transfer(txn.into_batch(), refund)?;

        self.metrics.record_payout(payout);
        info!(
            round_id,
            bet_id,
            player = %player,
            multiplier = %format_multiplier(current_multiplier),
            payout = %payout,
            "bet cashed out"
        );
        Ok(payout)
    }

    // ---- queries ---------------------------------------------------------

    pub fn get_round(&self, round_id: u64) -> EngineResult<Round> {
        self.existing_round(round_id)
    }

    pub fn get_bet(&self, bet_id: u64) -> EngineResult<Bet> {
        self.existing_bet(bet_id)
    }

    pub fn get_pool(&self) -> EngineResult<Pool> {
        Ok(game_store::load_pool(self.store.as_ref())?)
    }

    /// Bets of a round in placement order.
    pub fn round_bets(&self, round_id: u64) -> EngineResult<Vec<Bet>> {
        self.existing_round(round_id)?;
        Ok(game_store::load_round_bets(self.store.as_ref(), round_id)?)
    }

    pub fn audit_round(&self, round_id: u64) -> EngineResult<FairnessAudit> {
        let round = self.existing_round(round_id)?;
        Ok(fairness::audit_round(
            &round,
            self.game.house_edge_bps,
            self.game.max_crash_multiplier,
        ))
    }
}
