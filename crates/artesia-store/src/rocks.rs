//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use artesia_core::{
    Account, AccountId, Conversion, ConversionId, ConversionOutput, CreditTransaction,
    TransactionId, TransactionKind,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::AccountLocks;
use crate::schema::{all_column_families, cf};
use crate::{opening_transaction, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    locks: AccountLocks,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            locks: AccountLocks::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn load<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn account(&self, account_id: &AccountId) -> Result<Account> {
        self.get_account(account_id)?
            .ok_or_else(|| StoreError::account_not_found(account_id))
    }

    fn conversion(&self, conversion_id: &ConversionId) -> Result<Conversion> {
        self.get_conversion(conversion_id)?
            .ok_or_else(|| StoreError::conversion_not_found(conversion_id))
    }

    /// Stage an account update together with the transaction that explains it.
    fn stage_account(
        &self,
        batch: &mut WriteBatch,
        account: &Account,
        transaction: &CreditTransaction,
    ) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_account = self.cf(cf::TRANSACTIONS_BY_ACCOUNT)?;

        batch.put_cf(
            &cf_accounts,
            keys::account_key(&account.account_id),
            Self::serialize(account)?,
        );
        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&transaction.id),
            Self::serialize(transaction)?,
        );
        batch.put_cf(
            &cf_tx_by_account,
            keys::account_index_key(&account.account_id, transaction.id.to_bytes()),
            [],
        );
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Apply a balance change under the account's lock and record it.
    fn update_account<F>(&self, account_id: &AccountId, apply: F) -> Result<Account>
    where
        F: FnOnce(&mut Account) -> Result<CreditTransaction>,
    {
        let _guard = self.locks.lock(account_id);
        let mut account = self.account(account_id)?;
        let transaction = apply(&mut account)?;

        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, &account, &transaction)?;
        self.write(batch)?;
        Ok(account)
    }

    /// Walk a per-account index newest first and return the ULID halves.
    fn scan_index(
        &self,
        index_cf: &str,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<[u8; 16]>> {
        let cf = self.cf(index_cf)?;
        let prefix = keys::account_prefix(account_id);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        // ULIDs sort by time, so the scan is oldest first; reverse afterwards.
        let mut suffixes = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let suffix = keys::index_suffix(&key)
                .ok_or_else(|| StoreError::Database("malformed index key".into()))?;
            suffixes.push(suffix);
        }

        suffixes.reverse();
        Ok(suffixes.into_iter().skip(offset).take(limit).collect())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn create_account(&self, account: &Account) -> Result<()> {
        let _guard = self.locks.lock(&account.account_id);
        if self.get_account(&account.account_id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                entity: "account",
                id: account.account_id.to_string(),
            });
        }

        let mut batch = WriteBatch::default();
        if let Some(tx) = opening_transaction(account) {
            self.stage_account(&mut batch, account, &tx)?;
        } else {
            let cf = self.cf(cf::ACCOUNTS)?;
            batch.put_cf(
                &cf,
                keys::account_key(&account.account_id),
                Self::serialize(account)?,
            );
        }
        self.write(batch)?;

        tracing::debug!(account_id = %account.account_id, balance = account.balance, "Account created");
        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.load(cf::ACCOUNTS, &keys::account_key(account_id))
    }

    fn try_debit(&self, account_id: &AccountId, amount: i64) -> Result<Account> {
        self.update_account(account_id, |account| {
            let balance = account.debit(amount)?;
            Ok(CreditTransaction::debit(*account_id, amount, balance))
        })
    }

    fn credit(&self, account_id: &AccountId, amount: i64) -> Result<Account> {
        self.update_account(account_id, |account| {
            let balance = account.refund(amount)?;
            Ok(CreditTransaction::credit(*account_id, amount, balance))
        })
    }

    fn grant_credits(
        &self,
        account_id: &AccountId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Account> {
        self.update_account(account_id, |account| {
            let balance = account.grant(amount)?;
            Ok(CreditTransaction::grant(
                *account_id,
                amount,
                kind,
                balance,
                description.into(),
            ))
        })
    }

    // =========================================================================
    // Conversion Operations
    // =========================================================================

    fn begin_conversion(&self, conversion: &Conversion) -> Result<Account> {
        let _guard = self.locks.lock(&conversion.account_id);
        if self.get_conversion(&conversion.id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                entity: "conversion",
                id: conversion.id.to_string(),
            });
        }

        let mut account = self.account(&conversion.account_id)?;
        let balance = account.debit(conversion.cost)?;
        let tx = CreditTransaction::conversion_charge(
            conversion.account_id,
            conversion.cost,
            balance,
            conversion.id,
        );

        let cf_conversions = self.cf(cf::CONVERSIONS)?;
        let cf_by_account = self.cf(cf::CONVERSIONS_BY_ACCOUNT)?;
        let cf_processing = self.cf(cf::PROCESSING)?;
        let conversion_key = keys::conversion_key(&conversion.id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_conversions, &conversion_key, Self::serialize(conversion)?);
        batch.put_cf(
            &cf_by_account,
            keys::account_index_key(&conversion.account_id, conversion.id.to_bytes()),
            [],
        );
        batch.put_cf(&cf_processing, &conversion_key, []);
        self.stage_account(&mut batch, &account, &tx)?;
        self.write(batch)?;

        Ok(account)
    }

    fn complete_conversion(
        &self,
        conversion_id: &ConversionId,
        output: ConversionOutput,
    ) -> Result<Conversion> {
        let account_id = self.conversion(conversion_id)?.account_id;
        let _guard = self.locks.lock(&account_id);

        // Re-read under the lock; the transition check is what makes this exactly-once.
        let mut conversion = self.conversion(conversion_id)?;
        conversion.complete(output, chrono::Utc::now())?;

        let cf_conversions = self.cf(cf::CONVERSIONS)?;
        let cf_processing = self.cf(cf::PROCESSING)?;
        let conversion_key = keys::conversion_key(conversion_id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_conversions, &conversion_key, Self::serialize(&conversion)?);
        batch.delete_cf(&cf_processing, &conversion_key);
        self.write(batch)?;

        Ok(conversion)
    }

    fn fail_conversion(
        &self,
        conversion_id: &ConversionId,
        detail: &str,
    ) -> Result<(Conversion, Account)> {
        let account_id = self.conversion(conversion_id)?.account_id;
        let _guard = self.locks.lock(&account_id);

        let mut conversion = self.conversion(conversion_id)?;
        let mut account = self.account(&account_id)?;
        let refund = conversion.fail(detail.to_string(), chrono::Utc::now())?;
        let balance = account.refund(refund)?;
        let tx = CreditTransaction::conversion_refund(account_id, refund, balance, conversion.id);

        let cf_conversions = self.cf(cf::CONVERSIONS)?;
        let cf_processing = self.cf(cf::PROCESSING)?;
        let conversion_key = keys::conversion_key(conversion_id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_conversions, &conversion_key, Self::serialize(&conversion)?);
        batch.delete_cf(&cf_processing, &conversion_key);
        self.stage_account(&mut batch, &account, &tx)?;
        self.write(batch)?;

        Ok((conversion, account))
    }

    fn get_conversion(&self, conversion_id: &ConversionId) -> Result<Option<Conversion>> {
        self.load(cf::CONVERSIONS, &keys::conversion_key(conversion_id))
    }

    fn list_conversions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversion>> {
        let ids = self.scan_index(cf::CONVERSIONS_BY_ACCOUNT, account_id, limit, offset)?;
        let mut conversions = Vec::with_capacity(ids.len());
        for bytes in ids {
            if let Some(conversion) = self.get_conversion(&ConversionId::from_bytes(bytes))? {
                conversions.push(conversion);
            }
        }
        Ok(conversions)
    }

    fn list_processing_conversions(&self) -> Result<Vec<Conversion>> {
        let cf = self.cf(cf::PROCESSING)?;
        let mut conversions = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let bytes = keys::ulid_key(&key)
                .ok_or_else(|| StoreError::Database("malformed processing key".into()))?;
            if let Some(conversion) = self.get_conversion(&ConversionId::from_bytes(bytes))? {
                conversions.push(conversion);
            }
        }

        Ok(conversions)
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let ids = self.scan_index(cf::TRANSACTIONS_BY_ACCOUNT, account_id, limit, offset)?;
        let mut transactions = Vec::with_capacity(ids.len());
        for bytes in ids {
            let key = keys::transaction_key(&TransactionId::from_bytes(bytes));
            if let Some(tx) = self.load(cf::TRANSACTIONS, &key)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artesia_core::{BalanceError, ConversionStatus, ImageFormat, StyleId, CONVERSION_COST};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn funded(store: &RocksStore, balance: i64) -> AccountId {
        let account_id = AccountId::generate();
        store
            .create_account(&Account::with_trial(account_id, balance))
            .unwrap();
        account_id
    }

    fn conversion_for(account_id: AccountId) -> Conversion {
        Conversion::begin(
            account_id,
            StyleId::new("cyberpunk").unwrap(),
            CONVERSION_COST,
            4096,
            ImageFormat::Jpeg,
        )
    }

    #[test]
    fn account_lifecycle() {
        let (store, _dir) = create_test_store();
        let account_id = funded(&store, 3);

        let account = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(account.balance, 3);

        let account = store.try_debit(&account_id, 2).unwrap();
        assert_eq!((account.balance, account.lifetime_used), (1, 2));

        let account = store.credit(&account_id, 1).unwrap();
        assert_eq!((account.balance, account.lifetime_used), (2, 1));

        let account = store
            .grant_credits(&account_id, 15, TransactionKind::Purchase, "Starter Plan")
            .unwrap();
        assert_eq!(account.balance, 17);
        assert_eq!(account.lifetime_granted, 18);

        let persisted = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(persisted, account);
    }

    #[test]
    fn insufficient_debit_writes_nothing() {
        let (store, _dir) = create_test_store();
        let account_id = funded(&store, 0);

        let err = store.try_debit(&account_id, 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Balance(BalanceError::InsufficientCredits {
                balance: 0,
                required: 1
            })
        ));
        assert!(store
            .list_transactions_by_account(&account_id, 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn conversion_success_path() {
        let (store, _dir) = create_test_store();
        let account_id = funded(&store, 1);
        let conversion = conversion_for(account_id);

        let account = store.begin_conversion(&conversion).unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(store.list_processing_conversions().unwrap().len(), 1);

        let done = store
            .complete_conversion(
                &conversion.id,
                ConversionOutput {
                    description: "neon rain".into(),
                    model: "test".into(),
                },
            )
            .unwrap();
        assert_eq!(done.status, ConversionStatus::Completed);
        assert!(store.list_processing_conversions().unwrap().is_empty());

        let stored = store.get_conversion(&conversion.id).unwrap().unwrap();
        assert_eq!(stored, done);
    }

    #[test]
    fn conversion_failure_refunds_once() {
        let (store, _dir) = create_test_store();
        let account_id = funded(&store, 1);
        let conversion = conversion_for(account_id);
        store.begin_conversion(&conversion).unwrap();

        let (failed, account) = store.fail_conversion(&conversion.id, "timeout").unwrap();
        assert_eq!(failed.status, ConversionStatus::Failed);
        assert_eq!((account.balance, account.lifetime_used), (1, 0));
        assert!(store.list_processing_conversions().unwrap().is_empty());

        assert!(matches!(
            store.fail_conversion(&conversion.id, "again"),
            Err(StoreError::Transition(_))
        ));
        assert_eq!(store.get_account(&account_id).unwrap().unwrap().balance, 1);

        let kinds: Vec<_> = store
            .list_transactions_by_account(&account_id, 10, 0)
            .unwrap()
            .into_iter()
            .map(|tx| tx.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TransactionKind::ConversionRefund,
                TransactionKind::ConversionCharge,
                TransactionKind::TrialGrant,
            ]
        );
    }

    #[test]
    fn conversions_list_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let account_id = funded(&store, 5);

        let first = conversion_for(account_id);
        store.begin_conversion(&first).unwrap();
        let second = conversion_for(account_id);
        store.begin_conversion(&second).unwrap();

        let all = store.list_conversions_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let page2 = store.list_conversions_by_account(&account_id, 1, 1).unwrap();
        assert_eq!(page2[0].id, first.id);

        let other = AccountId::generate();
        assert!(store
            .list_conversions_by_account(&other, 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn burst_of_writes_lists_newest_first() {
        let (store, _dir) = create_test_store();
        let account_id = funded(&store, 20);

        let mut ids = Vec::new();
        for _ in 0..10 {
            let conversion = conversion_for(account_id);
            store.begin_conversion(&conversion).unwrap();
            store.fail_conversion(&conversion.id, "fast failure").unwrap();
            ids.push(conversion.id);
        }
        ids.reverse();

        let listed: Vec<_> = store
            .list_conversions_by_account(&account_id, 20, 0)
            .unwrap()
            .into_iter()
            .map(|conversion| conversion.id)
            .collect();
        assert_eq!(listed, ids);

        let kinds: Vec<_> = store
            .list_transactions_by_account(&account_id, 21, 0)
            .unwrap()
            .into_iter()
            .map(|tx| tx.kind)
            .collect();
        assert_eq!(kinds.len(), 21);
        for pair in kinds[..20].chunks(2) {
            assert_eq!(
                pair,
                [TransactionKind::ConversionRefund, TransactionKind::ConversionCharge]
            );
        }
        assert_eq!(kinds[20], TransactionKind::TrialGrant);
    }

    #[test]
    fn processing_index_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let conversion_id = {
            let store = RocksStore::open(dir.path()).unwrap();
            let account_id = funded(&store, 1);
            let conversion = conversion_for(account_id);
            store.begin_conversion(&conversion).unwrap();
            conversion.id
        };

        let store = RocksStore::open(dir.path()).unwrap();
        let processing = store.list_processing_conversions().unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, conversion_id);
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let (store, _dir) = create_test_store();
        let account_id = funded(&store, 5);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.try_debit(&account_id, 1).is_ok())
            })
            .collect();
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(succeeded, 5);
        let account = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!((account.balance, account.lifetime_used), (0, 5));
    }
}
