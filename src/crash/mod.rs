//! Crash game domain
//!
//! Pure state transitions for rounds, wagers, payouts and pool accounting.
//! Nothing here touches storage or moves funds; the engine stages these
//! records and commits them together with the transfer.

pub mod pool;
pub mod round;
pub mod settlement;
pub mod types;
pub mod wager;

pub use settlement::PayoutCalculator;
pub use types::{
    format_multiplier, Address, Amount, Bet, BetStatus, ClientSeed, Pool, Round, RoundStatus,
    BPS_SCALE, MIN_MULTIPLIER, MULTIPLIER_SCALE,
};
pub use wager::BetLimits;
