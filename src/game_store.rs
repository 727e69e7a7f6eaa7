//! Persistent round, bet and pool records.
//!
//! Key layout (ids big-endian so prefix scans return placement order):
//!
//! | key | value |
//! |---|---|
//! | `admin` | `Address` |
//! | `pool` | `Pool` |
//! | `bet:next_id` | `u64` |
//! | `round:` id | `Round` |
//! | `bet:` id | `Bet` |
//! | `index:round_bets:` round id, bet id | empty |
//! | `index:player_bet:` round id, player | bet id |
//! | `treasury:balance:` account | `Amount` |

use crate::crash::types::{Address, Amount, Bet, Pool, Round};
use crate::errors::StorageError;
use crate::storage::{LedgerStore, WriteBatch};
use serde::de::DeserializeOwned;
use serde::Serialize;

const ADMIN_KEY: &[u8] = b"admin";
const POOL_KEY: &[u8] = b"pool";
const NEXT_BET_ID_KEY: &[u8] = b"bet:next_id";
const ROUND_PREFIX: &[u8] = b"round:";
const BET_PREFIX: &[u8] = b"bet:";
const ROUND_BETS_PREFIX: &[u8] = b"index:round_bets:";
const PLAYER_BET_PREFIX: &[u8] = b"index:player_bet:";
const BALANCE_PREFIX: &[u8] = b"treasury:balance:";

/// First id handed out on a fresh ledger
pub const FIRST_BET_ID: u64 = 1;

fn id_key(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn round_key(round_id: u64) -> Vec<u8> {
    id_key(ROUND_PREFIX, round_id)
}

fn bet_key(bet_id: u64) -> Vec<u8> {
    id_key(BET_PREFIX, bet_id)
}

fn round_bets_prefix(round_id: u64) -> Vec<u8> {
    id_key(ROUND_BETS_PREFIX, round_id)
}

fn round_bet_index_key(round_id: u64, bet_id: u64) -> Vec<u8> {
    let mut key = round_bets_prefix(round_id);
    key.extend_from_slice(&bet_id.to_be_bytes());
    key
}

fn player_bet_key(round_id: u64, player: &Address) -> Vec<u8> {
    let mut key = id_key(PLAYER_BET_PREFIX, round_id);
    key.extend_from_slice(player.as_str().as_bytes());
    key
}

fn balance_key(account: &Address) -> Vec<u8> {
    let mut key = BALANCE_PREFIX.to_vec();
    key.extend_from_slice(account.as_str().as_bytes());
    key
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::CorruptedData(format!("Failed to decode {}: {}", what, e))
    })
}

fn encode<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| {
        StorageError::WriteFailed(format!("Failed to encode {}: {}", what, e))
    })
}

fn load<T: DeserializeOwned>(
    store: &dyn LedgerStore,
    key: &[u8],
    what: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(bytes) => decode(&bytes, what).map(Some),
        None => Ok(None),
    }
}

pub fn load_admin(store: &dyn LedgerStore) -> Result<Option<Address>, StorageError> {
    load(store, ADMIN_KEY, "admin")
}

/// Missing pool reads as all zeros.
pub fn load_pool(store: &dyn LedgerStore) -> Result<Pool, StorageError> {
    Ok(load(store, POOL_KEY, "pool")?.unwrap_or_default())
}

pub fn load_next_bet_id(store: &dyn LedgerStore) -> Result<u64, StorageError> {
    Ok(load(store, NEXT_BET_ID_KEY, "bet id counter")?.unwrap_or(FIRST_BET_ID))
}

pub fn load_round(store: &dyn LedgerStore, round_id: u64) -> Result<Option<Round>, StorageError> {
    load(store, &round_key(round_id), &format!("round {}", round_id))
}

pub fn load_bet(store: &dyn LedgerStore, bet_id: u64) -> Result<Option<Bet>, StorageError> {
    load(store, &bet_key(bet_id), &format!("bet {}", bet_id))
}

pub fn find_player_bet(
    store: &dyn LedgerStore,
    round_id: u64,
    player: &Address,
) -> Result<Option<u64>, StorageError> {
    load(
        store,
        &player_bet_key(round_id, player),
        &format!("player index for round {}", round_id),
    )
}

/// `None` until the account's first transfer or opening balance.
pub fn load_balance(store: &dyn LedgerStore, account: &Address) -> Result<Option<Amount>, StorageError> {
    load(store, &balance_key(account), &format!("balance of {}", account))
}

/// Bet ids of a round in placement order.
pub fn load_round_bet_ids(store: &dyn LedgerStore, round_id: u64) -> Result<Vec<u64>, StorageError> {
    let prefix = round_bets_prefix(round_id);
    store
        .scan_prefix(&prefix)?
        .into_iter()
        .map(|(key, _)| -> Result<u64, StorageError> {
            let tail: [u8; 8] = key
                .get(prefix.len()..)
                .and_then(|t| t.try_into().ok())
                .ok_or_else(|| {
                    StorageError::CorruptedData(format!(
                        "Malformed round index key for round {}",
                        round_id
                    ))
                })?;
            Ok(u64::from_be_bytes(tail))
        })
        .collect()
}

pub fn load_round_bets(store: &dyn LedgerStore, round_id: u64) -> Result<Vec<Bet>, StorageError> {
    load_round_bet_ids(store, round_id)?
        .into_iter()
        .map(|bet_id| -> Result<Bet, StorageError> {
            load_bet(store, bet_id)?.ok_or_else(|| {
                StorageError::CorruptedData(format!(
                    "Round {} indexes missing bet {}",
                    round_id, bet_id
                ))
            })
        })
        .collect()
}

/// Writes staged by one engine operation, committed as a single batch.
#[derive(Debug, Default)]
pub struct LedgerTxn {
    batch: WriteBatch,
}

impl LedgerTxn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_admin(&mut self, admin: &Address) -> Result<(), StorageError> {
        self.batch.put(ADMIN_KEY, encode(admin, "admin")?);
        Ok(())
    }

    pub fn put_pool(&mut self, pool: &Pool) -> Result<(), StorageError> {
        self.batch.put(POOL_KEY, encode(pool, "pool")?);
        Ok(())
    }

    pub fn put_next_bet_id(&mut self, next_id: u64) -> Result<(), StorageError> {
        self.batch.put(NEXT_BET_ID_KEY, encode(&next_id, "bet id counter")?);
        Ok(())
    }

    pub fn put_round(&mut self, round: &Round) -> Result<(), StorageError> {
        let bytes = encode(round, &format!("round {}", round.id))?;
        self.batch.put(round_key(round.id), bytes);
        Ok(())
    }

    pub fn put_bet(&mut self, bet: &Bet) -> Result<(), StorageError> {
        let bytes = encode(bet, &format!("bet {}", bet.id))?;
        self.batch.put(bet_key(bet.id), bytes);
        Ok(())
    }

    /// Write a brand-new bet together with its round and player indexes.
    pub fn insert_bet(&mut self, bet: &Bet) -> Result<(), StorageError> {
        self.put_bet(bet)?;
        self.batch
            .put(round_bet_index_key(bet.round_id, bet.id), Vec::<u8>::new());
        self.batch.put(
            player_bet_key(bet.round_id, &bet.player),
            encode(&bet.id, "player index")?,
        );
        Ok(())
    }

    pub fn put_balance(&mut self, account: &Address, balance: Amount) -> Result<(), StorageError> {
        let bytes = encode(&balance, &format!("balance of {}", account))?;
        self.batch.put(balance_key(account), bytes);
        Ok(())
    }

    pub fn into_batch(self) -> WriteBatch {
        self.batch
    }
}
