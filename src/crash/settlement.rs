//! Cash-out pricing
//!
//! `payout = floor(amount * min(current, crash) * (10000 - edge_bps) / (100 * 10000))`
//!
//! All arithmetic is checked; an overflowing product is rejected rather than
//! wrapped.

use crate::crash::types::{Amount, BPS_SCALE, MIN_MULTIPLIER, MULTIPLIER_SCALE};
use crate::errors::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutCalculator {
    house_edge_bps: u32,
}

impl PayoutCalculator {
    pub fn new(house_edge_bps: u32) -> Self {
        Self {
            house_edge_bps: house_edge_bps.min(BPS_SCALE),
        }
    }

    pub fn house_edge_bps(&self) -> u32 {
        self.house_edge_bps
    }

    /// Reject a cash-out at or past the crash point, or below 1.00x.
    pub fn check_cash_out(&self, current: u64, crash: u64) -> Result<(), GameError> {
        if current >= crash {
            return Err(GameError::AlreadyCrashed);
        }
        if current < MIN_MULTIPLIER {
            return Err(GameError::InvalidMultiplier);
        }
        Ok(())
    }

    pub fn payout(&self, amount: Amount, current: u64, crash: u64) -> Result<Amount, GameError> {
        let effective = current.min(crash) as Amount;
        let edge_factor = (BPS_SCALE - self.house_edge_bps) as Amount;
        let divisor = MULTIPLIER_SCALE as Amount * BPS_SCALE as Amount;

        amount
            .checked_mul(effective)
            .and_then(|v| v.checked_mul(edge_factor))
            .map(|v| v / divisor)
            .ok_or(GameError::InvalidMultiplier)
    }

    /// Validate and price a cash-out in one step.
    pub fn settle(&self, amount: Amount, current: u64, crash: u64) -> Result<Amount, GameError> {
        self.check_cash_out(current, crash)?;
        self.payout(amount, current, crash)
    }
}

impl Default for PayoutCalculator {
    fn default() -> Self {
        Self::new(300)
    }
}
