use crate::config::GameConfig;
use crate::crash::types::{Amount, ClientSeed, Round, RoundStatus};
use crate::errors::GameError;
use crate::fairness::{self, SeedHash, ServerSeed};

impl Round {
    /// New `Waiting` round bound to `server_seed_hash`.
    pub fn open(id: u64, server_seed_hash: SeedHash, now: u64) -> Self {
        Self {
            id,
            status: RoundStatus::Waiting,
            server_seed_hash,
            server_seed: None,
            crash_multiplier: 0,
            created_at: now,
            started_at: 0,
            ended_at: 0,
            total_bet_amount: 0,
            total_payout: 0,
            bet_count: 0,
            client_seeds: Vec::new(),
        }
    }

    pub fn ensure_status(&self, expected: RoundStatus) -> Result<(), GameError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(GameError::InvalidRoundStatus)
        }
    }

    /// Reveal the server seed and fix the crash point: `Waiting -> InProgress`.
    ///
    /// The commitment is never rewritten. With `enforce_derived_multiplier`
    /// the supplied multiplier must equal the one derived from the seeds.
    pub fn reveal(
        &mut self,
        server_seed: ServerSeed,
        crash_multiplier: u64,
        game: &GameConfig,
        now: u64,
    ) -> Result<(), GameError> {
        self.ensure_status(RoundStatus::Waiting)?;
        fairness::verify_reveal(&server_seed, &self.server_seed_hash)?;

        if crash_multiplier < game.min_crash_multiplier {
            return Err(GameError::InvalidMultiplier);
        }
        if game.enforce_derived_multiplier {
            let derived = fairness::derive_crash_multiplier(
                &server_seed,
                &self.client_seeds,
                game.house_edge_bps,
                game.max_crash_multiplier,
            );
            if derived != crash_multiplier {
                return Err(GameError::InvalidMultiplier);
            }
        }

        self.server_seed = Some(server_seed);
        self.crash_multiplier = crash_multiplier;
        self.started_at = now.max(self.created_at);
        self.status = RoundStatus::InProgress;
        Ok(())
    }

    /// Count a new stake. Client seeds beyond `max_client_seeds` are dropped.
    pub fn record_bet(
        &mut self,
        amount: Amount,
        client_seed: ClientSeed,
        max_client_seeds: Option<usize>,
    ) -> Result<(), GameError> {
        let total = self
            .total_bet_amount
            .checked_add(amount)
            .ok_or(GameError::InvalidBetAmount)?;
        let count = self
            .bet_count
            .checked_add(1)
            .ok_or(GameError::InvalidBetAmount)?;

        self.total_bet_amount = total;
        self.bet_count = count;
        if max_client_seeds.map_or(true, |cap| self.client_seeds.len() < cap) {
            self.client_seeds.push(client_seed);
        }
        Ok(())
    }

    pub fn record_payout(&mut self, payout: Amount) -> Result<(), GameError> {
        self.total_payout = self
            .total_payout
            .checked_add(payout)
            .ok_or(GameError::InvalidMultiplier)?;
        Ok(())
    }

    /// `InProgress -> Ended`
    pub fn close(&mut self, now: u64) -> Result<(), GameError> {
        self.ensure_status(RoundStatus::InProgress)?;
        self.ended_at = now.max(self.started_at);
        self.status = RoundStatus::Ended;
        Ok(())
    }

    pub fn accepts_bets(&self) -> bool {
        self.status == RoundStatus::Waiting
    }
}
