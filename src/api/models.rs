//! API Request and Response Models
//!
//! Seeds and hashes travel as hex strings; amounts are integers in base units.
//! The acting identity comes from the bearer key, never from the body.

use crate::crash::types::{format_multiplier, Address, Amount, Bet, ClientSeed, Round};
use crate::fairness::{SeedHash, ServerSeed};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub admin: Address,
}

/// POST /rounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoundRequest {
    pub round_id: u64,
    pub server_seed_hash: SeedHash,
}

/// POST /rounds/:id/start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRoundRequest {
    pub server_seed: ServerSeed,
    pub crash_multiplier: u64,
}

/// POST /rounds/:id/bets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub amount: Amount,
    #[serde(default = "empty_client_seed")]
    pub client_seed: ClientSeed,
}

fn empty_client_seed() -> ClientSeed {
    ClientSeed::new(Vec::new())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetResponse {
    pub bet_id: u64,
    pub round_id: u64,
}

/// POST /bets/:id/cash-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashOutRequest {
    pub current_multiplier: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashOutResponse {
    pub bet_id: u64,
    pub payout: Amount,
    pub multiplier: String,
}

/// Acknowledgement for state transitions with no payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTransitionResponse {
    pub round: Round,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundBetsResponse {
    pub round_id: u64,
    pub bets: Vec<Bet>,
}

impl CashOutResponse {
    pub fn new(bet_id: u64, payout: Amount, multiplier: u64) -> Self {
        Self {
            bet_id,
            payout,
            multiplier: format_multiplier(multiplier),
        }
    }
}
