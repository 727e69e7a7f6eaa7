use crate::crash::types::{Amount, Pool};
use crate::errors::GameError;

impl Pool {
    pub fn record_wager(&mut self, amount: Amount) -> Result<(), GameError> {
        let total_bets = self
            .total_bets
            .checked_add(amount)
            .ok_or(GameError::InvalidBetAmount)?;
        self.apply(total_bets, self.total_payouts)
            .map_err(|_| GameError::InvalidBetAmount)
    }

    pub fn record_payout(&mut self, payout: Amount) -> Result<(), GameError> {
        let total_payouts = self
            .total_payouts
            .checked_add(payout)
            .ok_or(GameError::InvalidMultiplier)?;
        self.apply(self.total_bets, total_payouts)
    }

    /// House earnings always equal stakes minus payouts; negative when the
    /// house is down.
    fn apply(&mut self, total_bets: Amount, total_payouts: Amount) -> Result<(), GameError> {
        let earnings = total_bets
            .checked_sub(total_payouts)
            .ok_or(GameError::InvalidMultiplier)?;
        self.total_bets = total_bets;
        self.total_payouts = total_payouts;
        self.total_house_earnings = earnings;
        Ok(())
    }

    pub fn is_balanced(&self) -> bool {
        self.total_bets.checked_sub(self.total_payouts) == Some(self.total_house_earnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_holds_after_updates() {
        let mut pool = Pool::default();
        pool.record_wager(100).unwrap();
        pool.record_wager(50).unwrap();
        pool.record_payout(194).unwrap();

        assert_eq!(pool.total_bets, 150);
        assert_eq!(pool.total_payouts, 194);
        assert_eq!(pool.total_house_earnings, -44);
        assert!(pool.is_balanced());
    }

    #[test]
    fn test_overflow_leaves_pool_unchanged() {
        let mut pool = Pool {
            total_bets: Amount::MAX,
            total_payouts: 0,
            total_house_earnings: Amount::MAX,
        };
        let before = pool.clone();
        assert_eq!(pool.record_wager(1), Err(GameError::InvalidBetAmount));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_unbalanced_detection() {
        let pool = Pool {
            total_bets: 10,
            total_payouts: 3,
            total_house_earnings: 0,
        };
        assert!(!pool.is_balanced());
    }
}
