use crate::config::GameConfig;
use crate::crash::types::{Address, Amount, Bet, BetStatus};
use crate::errors::GameError;

/// Inclusive stake bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetLimits {
    pub min: Amount,
    pub max: Amount,
}

impl BetLimits {
    pub fn from_config(game: &GameConfig) -> Self {
        Self {
            min: game.min_bet_amount(),
            max: game.max_bet_amount(),
        }
    }

    pub fn check(&self, amount: Amount) -> Result<(), GameError> {
        if amount <= 0 || amount < self.min || amount > self.max {
            Err(GameError::InvalidBetAmount)
        } else {
            Ok(())
        }
    }
}

impl Bet {
    pub fn place(id: u64, round_id: u64, player: Address, amount: Amount, now: u64) -> Self {
        Self {
            id,
            round_id,
            player,
            amount,
            status: BetStatus::Active,
            cash_out_multiplier: 0,
            payout: 0,
            timestamp: now,
        }
    }

    pub fn ensure_owner(&self, caller: &Address) -> Result<(), GameError> {
        if &self.player == caller {
            Ok(())
        } else {
            Err(GameError::Unauthorized)
        }
    }

    pub fn ensure_active(&self) -> Result<(), GameError> {
        if self.status == BetStatus::Active {
            Ok(())
        } else {
            Err(GameError::BetNotActive)
        }
    }

    pub fn cash_out(&mut self, multiplier: u64, payout: Amount) -> Result<(), GameError> {
        self.ensure_active()?;
        self.status = BetStatus::CashedOut;
        self.cash_out_multiplier = multiplier;
        self.payout = payout;
        Ok(())
    }

    /// Mark an unsettled bet lost when its round closes.
    pub fn forfeit(&mut self) -> Result<(), GameError> {
        self.ensure_active()?;
        self.status = BetStatus::Lost;
        self.payout = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_inclusive() {
        let limits = BetLimits { min: 10, max: 100 };
        assert!(limits.check(10).is_ok());
        assert!(limits.check(100).is_ok());
        assert_eq!(limits.check(9), Err(GameError::InvalidBetAmount));
        assert_eq!(limits.check(101), Err(GameError::InvalidBetAmount));
        assert_eq!(limits.check(0), Err(GameError::InvalidBetAmount));
        assert_eq!(limits.check(-5), Err(GameError::InvalidBetAmount));
    }

    #[test]
    fn test_default_limits_in_stroops() {
        let limits = BetLimits::from_config(&GameConfig::default());
        assert_eq!(limits.min, 10_000_000);
        assert_eq!(limits.max, 1_000_000_000_000);
    }

    #[test]
    fn test_bet_transitions() {
        let player = Address::from("alice");
        let mut bet = Bet::place(1, 7, player.clone(), 100, 42);
        assert_eq!(bet.status, BetStatus::Active);
        assert!(bet.ensure_owner(&player).is_ok());
        assert_eq!(
            bet.ensure_owner(&Address::from("bob")),
            Err(GameError::Unauthorized)
        );

        bet.cash_out(200, 194).unwrap();
        assert_eq!(bet.status, BetStatus::CashedOut);
        assert_eq!(bet.cash_out_multiplier, 200);
        assert_eq!(bet.payout, 194);

        assert_eq!(bet.forfeit(), Err(GameError::BetNotActive));
        assert_eq!(bet.cash_out(300, 1), Err(GameError::BetNotActive));
        assert_eq!(bet.payout, 194);
    }

    #[test]
    fn test_forfeit_zeroes_payout() {
        let mut bet = Bet::place(2, 7, Address::from("bob"), 50, 42);
        bet.forfeit().unwrap();
        assert_eq!(bet.status, BetStatus::Lost);
        assert_eq!(bet.payout, 0);
        assert_eq!(bet.cash_out_multiplier, 0);
    }
}
