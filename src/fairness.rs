//! Commit-reveal fairness for crash rounds.
//!
//! The admin publishes `SHA-256(server_seed)` when a round is created and
//! reveals `server_seed` when it starts. Because the digest is fixed before any
//! bet exists, the crash point cannot be chosen with knowledge of the bets.
//!
//! The digest algorithm is versioned through [`CommitmentScheme`]. Stored
//! commitments are always interpreted under [`COMMITMENT_SCHEME`].

use crate::crash::types::{ClientSeed, Round, BPS_SCALE, MIN_MULTIPLIER};
use crate::errors::GameError;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const SEED_LEN: usize = 32;

/// Digest scheme binding a server seed to its published hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentScheme {
    Sha256V1,
}

pub const COMMITMENT_SCHEME: CommitmentScheme = CommitmentScheme::Sha256V1;

impl CommitmentScheme {
    pub fn digest(self, data: &[u8]) -> [u8; SEED_LEN] {
        match self {
            CommitmentScheme::Sha256V1 => Sha256::digest(data).into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

fn parse_fixed(s: &str) -> Result<[u8; SEED_LEN], SeedParseError> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x"))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| SeedParseError::Length(len))
}

macro_rules! hex_bytes_newtype {
    ($name:ident) => {
        impl $name {
            pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl FromStr for $name {
            type Err = SeedParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_fixed(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Secret chosen by the admin before a round, revealed at start
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerSeed([u8; SEED_LEN]);

/// Published commitment to a [`ServerSeed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeedHash([u8; SEED_LEN]);

hex_bytes_newtype!(ServerSeed);
hex_bytes_newtype!(SeedHash);

impl ServerSeed {
    /// Fresh seed from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn commitment(&self) -> SeedHash {
        commit(self)
    }
}

pub fn commit(seed: &ServerSeed) -> SeedHash {
    SeedHash(COMMITMENT_SCHEME.digest(seed.as_bytes()))
}

/// Check a revealed seed against the stored commitment.
pub fn verify_reveal(seed: &ServerSeed, expected: &SeedHash) -> Result<(), GameError> {
    if commit(seed) == *expected {
        Ok(())
    } else {
        Err(GameError::InvalidServerSeedHash)
    }
}

/// Crash multiplier implied by the server seed and the collected client seeds.
///
/// Each client seed is length-prefixed so different seed splits never collide.
/// The first four digest bytes select a point on an exponential curve scaled
/// by the house edge, clamped to `[1.00x, max_multiplier]`.
pub fn derive_crash_multiplier(
    server_seed: &ServerSeed,
    client_seeds: &[ClientSeed],
    house_edge_bps: u32,
    max_multiplier: u64,
) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    for seed in client_seeds {
        hasher.update((seed.as_bytes().len() as u32).to_be_bytes());
        hasher.update(seed.as_bytes());
    }
    let digest = hasher.finalize();

    let raw = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let normalized_bps = (raw as u128 * 9_900) / u32::MAX as u128;
    let denominator = BPS_SCALE as u128 - normalized_bps;
    let edge_factor = BPS_SCALE.saturating_sub(house_edge_bps) as u128;

    let multiplier = (edge_factor * MIN_MULTIPLIER as u128) / denominator;
    let ceiling = max_multiplier.max(MIN_MULTIPLIER);
    (multiplier.min(ceiling as u128) as u64).max(MIN_MULTIPLIER)
}

/// Public verification record for a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessAudit {
    pub round_id: u64,
    pub scheme: CommitmentScheme,
    pub server_seed_hash: SeedHash,
    pub server_seed: Option<ServerSeed>,
    pub client_seeds: Vec<ClientSeed>,
    pub crash_multiplier: u64,
    /// Whether the revealed seed hashes to the commitment. `None` before reveal.
    pub commitment_valid: Option<bool>,
    pub derived_multiplier: Option<u64>,
}

pub fn audit_round(round: &Round, house_edge_bps: u32, max_multiplier: u64) -> FairnessAudit {
    let commitment_valid = round
        .server_seed
        .as_ref()
        .map(|seed| verify_reveal(seed, &round.server_seed_hash).is_ok());
    let derived_multiplier = round.server_seed.as_ref().map(|seed| {
        derive_crash_multiplier(seed, &round.client_seeds, house_edge_bps, max_multiplier)
    });

    FairnessAudit {
        round_id: round.id,
        scheme: COMMITMENT_SCHEME,
        server_seed_hash: round.server_seed_hash,
        server_seed: round.server_seed.clone(),
        client_seeds: round.client_seeds.clone(),
        crash_multiplier: round.crash_multiplier,
        commitment_valid,
        derived_multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::types::RoundStatus;

    const ZERO_SEED_SHA256: &str =
        "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925";

    #[test]
    fn test_commitment_matches_sha256() {
        let seed = ServerSeed::from_bytes([0u8; SEED_LEN]);
        assert_eq!(commit(&seed).to_hex(), ZERO_SEED_SHA256);
    }

    #[test]
    fn test_verify_reveal_rejects_other_seed() {
        let seed = ServerSeed::generate();
        let hash = seed.commitment();
        assert!(verify_reveal(&seed, &hash).is_ok());

        let mut other = *seed.as_bytes();
        other[0] ^= 0x01;
        assert_eq!(
            verify_reveal(&ServerSeed::from_bytes(other), &hash),
            Err(GameError::InvalidServerSeedHash)
        );
    }

    #[test]
    fn test_seed_parsing() {
        let hash: SeedHash = ZERO_SEED_SHA256.parse().expect("valid hash");
        assert_eq!(hash.to_hex(), ZERO_SEED_SHA256);

        let prefixed: SeedHash = format!("0x{}", ZERO_SEED_SHA256).parse().expect("0x prefix");
        assert_eq!(prefixed, hash);

        assert!(matches!("abcd".parse::<SeedHash>(), Err(SeedParseError::Length(2))));
        assert!(matches!("xyz".parse::<ServerSeed>(), Err(SeedParseError::Hex(_))));
    }

    #[test]
    fn test_derivation_is_deterministic_and_bounded() {
        let seed = ServerSeed::from_bytes([7u8; SEED_LEN]);
        let clients = vec![ClientSeed::new(vec![1, 2, 3]), ClientSeed::new(vec![4])];

        let first = derive_crash_multiplier(&seed, &clients, 300, 10_000);
        let second = derive_crash_multiplier(&seed, &clients, 300, 10_000);
        assert_eq!(first, second);
        assert!((MIN_MULTIPLIER..=10_000).contains(&first));
    }

    #[test]
    fn test_derivation_depends_on_client_seeds() {
        let seed = ServerSeed::from_bytes([9u8; SEED_LEN]);
        let outcomes: std::collections::HashSet<u64> = (0u8..32)
            .map(|i| derive_crash_multiplier(&seed, &[ClientSeed::new(vec![i])], 300, 100_000))
            .collect();
        assert!(outcomes.len() > 1);
    }

    #[test]
    fn test_derivation_respects_ceiling() {
        for i in 0u8..64 {
            let seed = ServerSeed::from_bytes([i; SEED_LEN]);
            let m = derive_crash_multiplier(&seed, &[], 300, 150);
            assert!((MIN_MULTIPLIER..=150).contains(&m));
        }
    }

    #[test]
    fn test_audit_before_and_after_reveal() {
        let seed = ServerSeed::from_bytes([3u8; SEED_LEN]);
        let mut round = Round {
            id: 4,
            status: RoundStatus::Waiting,
            server_seed_hash: seed.commitment(),
            server_seed: None,
            crash_multiplier: 0,
            created_at: 1,
            started_at: 0,
            ended_at: 0,
            total_bet_amount: 0,
            total_payout: 0,
            bet_count: 0,
            client_seeds: vec![],
        };

        let sealed = audit_round(&round, 300, 10_000);
        assert_eq!(sealed.commitment_valid, None);
        assert_eq!(sealed.derived_multiplier, None);

        round.server_seed = Some(seed.clone());
        round.crash_multiplier = 250;
        let opened = audit_round(&round, 300, 10_000);
        assert_eq!(opened.commitment_valid, Some(true));
        assert_eq!(
            opened.derived_multiplier,
            Some(derive_crash_multiplier(&seed, &[], 300, 10_000))
        );
    }
}
