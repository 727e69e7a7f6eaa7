use crate::fairness::{SeedHash, ServerSeed};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Value in the smallest currency unit (e.g. stroops).
pub type Amount = i128;

/// Multipliers carry two implied decimals: 100 = 1.00x, 259 = 2.59x.
pub const MULTIPLIER_SCALE: u64 = 100;

/// Baseline multiplier every round rises from.
pub const MIN_MULTIPLIER: u64 = MULTIPLIER_SCALE;

pub const BPS_SCALE: u32 = 10_000;

/// Identity of a player or of the admin
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque per-bet entropy supplied by the bettor. Hex on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientSeed(Vec<u8>);

impl ClientSeed {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for ClientSeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ClientSeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw.trim_start_matches("0x"))
            .map(ClientSeed)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Waiting,
    InProgress,
    Ended,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Waiting => write!(f, "waiting"),
            RoundStatus::InProgress => write!(f, "in_progress"),
            RoundStatus::Ended => write!(f, "ended"),
        }
    }
}

/// One wagering round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: u64,
    pub status: RoundStatus,
    pub server_seed_hash: SeedHash,
    /// Preimage of `server_seed_hash`, revealed at start
    pub server_seed: Option<ServerSeed>,
    /// 0 until the round starts
    pub crash_multiplier: u64,
    pub created_at: u64,
    pub started_at: u64,
    pub ended_at: u64,
    pub total_bet_amount: Amount,
    pub total_payout: Amount,
    pub bet_count: u32,
    /// Placement order
    pub client_seeds: Vec<ClientSeed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetStatus {
    Active,
    CashedOut,
    Lost,
}

impl BetStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BetStatus::Active)
    }
}

/// One player's wager within a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub id: u64,
    pub round_id: u64,
    pub player: Address,
    pub amount: Amount,
    pub status: BetStatus,
    /// 0 while active
    pub cash_out_multiplier: u64,
    /// 0 while active or lost
    pub payout: Amount,
    pub timestamp: u64,
}

/// Aggregate value wagered, paid out and retained across all rounds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub total_bets: Amount,
    pub total_payouts: Amount,
    pub total_house_earnings: Amount,
}

/// Render a fixed-point multiplier, e.g. `259` as `2.59x`.
pub fn format_multiplier(multiplier: u64) -> String {
    format!(
        "{}.{:02}x",
        multiplier / MULTIPLIER_SCALE,
        multiplier % MULTIPLIER_SCALE
    )
}
