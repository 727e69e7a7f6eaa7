//! Asset movement between players and the house
//!
//! The engine only needs a synchronous "move `amount` from A to B" primitive
//! that either succeeds completely or fails without side effects.

use crate::crash::types::{Address, Amount};
use crate::errors::StorageError;
use crate::game_store::{self, LedgerTxn};
use crate::storage::LedgerStore;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: String,
        balance: Amount,
        requested: Amount,
    },

    #[error("invalid transfer amount {0}")]
    InvalidAmount(Amount),

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

pub trait AssetTransfer: Send + Sync {
    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TransferError>;
}

/// Balance sheet held in memory. Accounts seen for the first time start
/// with `default_credit`.
#[derive(Debug, Default)]
pub struct InMemoryTreasury {
    balances: DashMap<Address, Amount>,
    default_credit: Amount,
}

impl InMemoryTreasury {
    pub fn new(default_credit: Amount) -> Self {
        Self {
            balances: DashMap::new(),
            default_credit,
        }
    }

    pub fn with_balance(self, account: Address, balance: Amount) -> Self {
        self.balances.insert(account, balance);
        self
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances
            .get(account)
            .map(|b| *b)
            .unwrap_or(self.default_credit)
    }
}

impl AssetTransfer for InMemoryTreasury {
    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TransferError> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }
        if from == to {
            return Ok(());
        }

        {
            let mut source = self
                .balances
                .entry(from.clone())
                .or_insert(self.default_credit);
            if *source < amount {
                return Err(TransferError::InsufficientFunds {
                    account: from.to_string(),
                    balance: *source,
                    requested: amount,
                });
            }
            *source -= amount;
        }

        let mut target = self
            .balances
            .entry(to.clone())
            .or_insert(self.default_credit);
        match target.checked_add(amount) {
            Some(updated) => {
                *target = updated;
                Ok(())
            }
            None => {
                drop(target);
                if let Some(mut source) = self.balances.get_mut(from) {
                    *source += amount;
                }
                Err(TransferError::Rejected(format!("balance overflow for {}", to)))
            }
        }
    }
}

/// Balance sheet persisted in the ledger store, so balances survive a restart
/// together with the bets and payouts that moved them. Each transfer commits
/// both sides in one batch.
pub struct LedgerTreasury {
    store: Arc<dyn LedgerStore>,
    default_credit: Amount,
    lock: Mutex<()>,
}

impl LedgerTreasury {
    pub fn new(store: Arc<dyn LedgerStore>, default_credit: Amount) -> Self {
        Self {
            store,
            default_credit,
            lock: Mutex::new(()),
        }
    }

    /// Record an opening balance unless the account already has one.
    pub fn seed_balance(&self, account: &Address, balance: Amount) -> Result<(), StorageError> {
        let _guard = self.guard();
        if game_store::load_balance(self.store.as_ref(), account)?.is_some() {
            return Ok(());
        }
        let mut txn = LedgerTxn::new();
        txn.put_balance(account, balance)?;
        self.store.commit(txn.into_batch())?;
        tracing::info!(account = %account, balance = %balance, "seeded treasury balance");
        Ok(())
    }

    pub fn balance_of(&self, account: &Address) -> Result<Amount, StorageError> {
        Ok(game_store::load_balance(self.store.as_ref(), account)?.unwrap_or(self.default_credit))
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ledger_rejection(e: StorageError) -> TransferError {
    TransferError::Rejected(format!("treasury ledger: {}", e))
}

impl AssetTransfer for LedgerTreasury {
    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TransferError> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }
        if from == to {
            return Ok(());
        }

        let _guard = self.guard();
        let source = self.balance_of(from).map_err(ledger_rejection)?;
        if source < amount {
            return Err(TransferError::InsufficientFunds {
                account: from.to_string(),
                balance: source,
                requested: amount,
            });
        }
        let target = self
            .balance_of(to)
            .map_err(ledger_rejection)?
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected(format!("balance overflow for {}", to)))?;

        let mut txn = LedgerTxn::new();
        txn.put_balance(from, source - amount).map_err(ledger_rejection)?;
        txn.put_balance(to, target).map_err(ledger_rejection)?;
        self.store.commit(txn.into_batch()).map_err(ledger_rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_transfer_moves_funds() {
        let house = Address::from("house");
        let alice = Address::from("alice");
        let treasury = InMemoryTreasury::new(0)
            .with_balance(house.clone(), 1_000)
            .with_balance(alice.clone(), 100);

        treasury.transfer(&alice, &house, 40).unwrap();
        assert_eq!(treasury.balance_of(&alice), 60);
        assert_eq!(treasury.balance_of(&house), 1_040);
    }

    #[test]
    fn test_insufficient_funds_changes_nothing() {
        let alice = Address::from("alice");
        let bob = Address::from("bob");
        let treasury = InMemoryTreasury::new(10);

        let err = treasury.transfer(&alice, &bob, 11).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { requested: 11, .. }));
        assert_eq!(treasury.balance_of(&alice), 10);
        assert_eq!(treasury.balance_of(&bob), 10);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let treasury = InMemoryTreasury::new(10);
        let a = Address::from("a");
        let b = Address::from("b");
        assert_eq!(treasury.transfer(&a, &b, 0), Err(TransferError::InvalidAmount(0)));
        assert_eq!(treasury.transfer(&a, &b, -1), Err(TransferError::InvalidAmount(-1)));
    }

    #[test]
    fn test_overflow_restores_source() {
        let a = Address::from("a");
        let b = Address::from("b");
        let treasury = InMemoryTreasury::new(0)
            .with_balance(a.clone(), 10)
            .with_balance(b.clone(), Amount::MAX);

        assert!(matches!(
            treasury.transfer(&a, &b, 5),
            Err(TransferError::Rejected(_))
        ));
        assert_eq!(treasury.balance_of(&a), 10);
    }

    #[test]
    fn test_ledger_treasury_persists_both_sides() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
        let house = Address::from("house");
        let alice = Address::from("alice");

        let treasury = LedgerTreasury::new(store.clone(), 100);
        treasury.seed_balance(&house, 1_000).unwrap();
        treasury.transfer(&alice, &house, 40).unwrap();

        // a second treasury over the same store sees the same sheet
        let reopened = LedgerTreasury::new(store, 100);
        reopened.seed_balance(&house, 5).unwrap();
        assert_eq!(reopened.balance_of(&alice).unwrap(), 60);
        assert_eq!(reopened.balance_of(&house).unwrap(), 1_040);
    }

    #[test]
    fn test_ledger_treasury_rejections_write_nothing() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
        let a = Address::from("a");
        let b = Address::from("b");
        let treasury = LedgerTreasury::new(store.clone(), 10);

        assert!(matches!(
            treasury.transfer(&a, &b, 11),
            Err(TransferError::InsufficientFunds { balance: 10, .. })
        ));
        assert_eq!(treasury.transfer(&a, &b, 0), Err(TransferError::InvalidAmount(0)));
        assert!(store.scan_prefix(b"").unwrap().is_empty());
    }
}
