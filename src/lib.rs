//! Balloonfly - crash-game settlement engine
//!
//! Admin-driven rounds with a commit-reveal crash point, one bet per player
//! per round, cash-outs priced below the crash point and a pool that tracks
//! what the house has taken in and paid out.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod crash;
pub mod engine;
pub mod errors;
pub mod fairness;
pub mod game_store;
pub mod metrics;
pub mod storage;
pub mod transfer;

pub use config::{BalloonflyConfig, ConfigLoader};
pub use crash::types::{Address, Amount, Bet, BetStatus, ClientSeed, Pool, Round, RoundStatus};
pub use engine::{CrashEngine, EngineContext};
pub use errors::{EngineError, EngineResult, GameError};
pub use fairness::{SeedHash, ServerSeed};
