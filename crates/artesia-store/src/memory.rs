//! In-memory storage implementation.
//!
//! All tables sit behind one mutex, so every operation is trivially atomic.
//! Intended for tests and single-process demos; nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use artesia_core::{
    Account, AccountId, Conversion, ConversionId, ConversionOutput, CreditTransaction,
    TransactionKind,
};

use crate::error::{Result, StoreError};
use crate::{opening_transaction, Store};

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    conversions: HashMap<ConversionId, Conversion>,
    conversions_by_account: HashMap<AccountId, Vec<ConversionId>>,
    transactions_by_account: HashMap<AccountId, Vec<CreditTransaction>>,
}

impl Tables {
    fn account(&self, account_id: &AccountId) -> Result<Account> {
        self.accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| StoreError::account_not_found(account_id))
    }

    fn conversion(&self, conversion_id: &ConversionId) -> Result<Conversion> {
        self.conversions
            .get(conversion_id)
            .cloned()
            .ok_or_else(|| StoreError::conversion_not_found(conversion_id))
    }

    fn record(&mut self, account: Account, transaction: CreditTransaction) {
        self.transactions_by_account
            .entry(account.account_id)
            .or_default()
            .push(transaction);
        self.accounts.insert(account.account_id, account);
    }
}

/// Injected write failures, consumed one per call.
#[derive(Default)]
struct Faults {
    completions: AtomicU32,
    refunds: AtomicU32,
}

fn take_fault(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory `Store`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Faults,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `complete_conversion` fail with a
    /// database error before writing anything.
    pub fn fail_next_completions(&self, count: u32) {
        self.faults.completions.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `fail_conversion` fail with a database
    /// error before writing anything.
    pub fn fail_next_refunds(&self, count: u32) {
        self.faults.refunds.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

/// Newest-first page over an insertion-ordered list.
fn page<T: Clone>(items: Option<&Vec<T>>, limit: usize, offset: usize) -> Vec<T> {
    items
        .map(|items| items.iter().rev().skip(offset).take(limit).cloned().collect())
        .unwrap_or_default()
}

impl Store for MemoryStore {
    fn create_account(&self, account: &Account) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.accounts.contains_key(&account.account_id) {
            return Err(StoreError::AlreadyExists {
                entity: "account",
                id: account.account_id.to_string(),
            });
        }

        if let Some(tx) = opening_transaction(account) {
            tables.record(account.clone(), tx);
        } else {
            tables.accounts.insert(account.account_id, account.clone());
        }
        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        Ok(self.lock()?.accounts.get(account_id).cloned())
    }

    fn try_debit(&self, account_id: &AccountId, amount: i64) -> Result<Account> {
        let mut tables = self.lock()?;
        let mut account = tables.account(account_id)?;
        let balance = account.debit(amount)?;

        let tx = CreditTransaction::debit(*account_id, amount, balance);
        tables.record(account.clone(), tx);
        Ok(account)
    }

    fn credit(&self, account_id: &AccountId, amount: i64) -> Result<Account> {
        let mut tables = self.lock()?;
        let mut account = tables.account(account_id)?;
        let balance = account.refund(amount)?;

        let tx = CreditTransaction::credit(*account_id, amount, balance);
        tables.record(account.clone(), tx);
        Ok(account)
    }

    fn grant_credits(
        &self,
        account_id: &AccountId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Account> {
        let mut tables = self.lock()?;
        let mut account = tables.account(account_id)?;
        let balance = account.grant(amount)?;

        let tx = CreditTransaction::grant(*account_id, amount, kind, balance, description.into());
        tables.record(account.clone(), tx);
        Ok(account)
    }

    fn begin_conversion(&self, conversion: &Conversion) -> Result<Account> {
        let mut tables = self.lock()?;
        if tables.conversions.contains_key(&conversion.id) {
            return Err(StoreError::AlreadyExists {
                entity: "conversion",
                id: conversion.id.to_string(),
            });
        }

        let mut account = tables.account(&conversion.account_id)?;
        let balance = account.debit(conversion.cost)?;
        let tx = CreditTransaction::conversion_charge(
            conversion.account_id,
            conversion.cost,
            balance,
            conversion.id,
        );

        tables.conversions.insert(conversion.id, conversion.clone());
        tables
            .conversions_by_account
            .entry(conversion.account_id)
            .or_default()
            .push(conversion.id);
        tables.record(account.clone(), tx);
        Ok(account)
    }

    fn complete_conversion(
        &self,
        conversion_id: &ConversionId,
        output: ConversionOutput,
    ) -> Result<Conversion> {
        if take_fault(&self.faults.completions) {
            return Err(StoreError::Database("injected completion failure".into()));
        }

        let mut tables = self.lock()?;
        let mut conversion = tables.conversion(conversion_id)?;
        conversion.complete(output, chrono::Utc::now())?;

        tables.conversions.insert(conversion.id, conversion.clone());
        Ok(conversion)
    }

    fn fail_conversion(
        &self,
        conversion_id: &ConversionId,
        detail: &str,
    ) -> Result<(Conversion, Account)> {
        if take_fault(&self.faults.refunds) {
            return Err(StoreError::Database("injected refund failure".into()));
        }

        let mut tables = self.lock()?;
        let mut conversion = tables.conversion(conversion_id)?;
        let mut account = tables.account(&conversion.account_id)?;

        let refund = conversion.fail(detail.to_string(), chrono::Utc::now())?;
        let balance = account.refund(refund)?;
        let tx =
            CreditTransaction::conversion_refund(account.account_id, refund, balance, conversion.id);

        tables.conversions.insert(conversion.id, conversion.clone());
        tables.record(account.clone(), tx);
        Ok((conversion, account))
    }

    fn get_conversion(&self, conversion_id: &ConversionId) -> Result<Option<Conversion>> {
        Ok(self.lock()?.conversions.get(conversion_id).cloned())
    }

    fn list_conversions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversion>> {
        let tables = self.lock()?;
        let ids = page(tables.conversions_by_account.get(account_id), limit, offset);
        Ok(ids
            .iter()
            .filter_map(|id| tables.conversions.get(id).cloned())
            .collect())
    }

    fn list_processing_conversions(&self) -> Result<Vec<Conversion>> {
        let tables = self.lock()?;
        let mut processing: Vec<_> = tables
            .conversions
            .values()
            .filter(|c| !c.is_terminal())
            .cloned()
            .collect();
        processing.sort_by_key(|c| c.id);
        Ok(processing)
    }

    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let tables = self.lock()?;
        Ok(page(
            tables.transactions_by_account.get(account_id),
            limit,
            offset,
        ))
    }
}
