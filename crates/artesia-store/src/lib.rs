//! Storage layer for Artesia.
//!
//! This crate persists accounts, conversions and the credit transactions that
//! record every balance change. Two backends implement the [`Store`] trait:
//!
//! - [`MemoryStore`]: mutex-guarded maps, used by tests and when the `RocksDB`
//!   backend is compiled out.
//! - `RocksStore` (feature `rocksdb-backend`): column families with CBOR
//!   values; compound operations are a single `WriteBatch`.
//!
//! # Atomicity
//!
//! Each compound operation (`begin_conversion`, `complete_conversion`,
//! `fail_conversion`, ...) checks and writes the account, the conversion and
//! the transaction record as one unit. Operations on the same account are
//! serialized; operations on different accounts are not.
//!
//! # Example
//!
//! ```
//! use artesia_core::{Account, AccountId};
//! use artesia_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let account_id = AccountId::generate();
//! store.create_account(&Account::with_trial(account_id, 3)).unwrap();
//!
//! let account = store.try_debit(&account_id, 1).unwrap();
//! assert_eq!(account.balance, 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
mod locks;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use artesia_core::{
    Account, AccountId, Conversion, ConversionId, ConversionOutput, CreditTransaction,
    TransactionKind,
};

/// The storage trait defining all database operations.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert a new account.
    ///
    /// A positive starting balance is recorded as a trial-grant transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the account exists.
    fn create_account(&self, account: &Account) -> Result<()>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Debit `amount` credits if the balance covers it.
    ///
    /// Decrements balance and increments lifetime-used in one atomic unit.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::Balance` if the balance is too low; nothing is written.
    fn try_debit(&self, account_id: &AccountId, amount: i64) -> Result<Account>;

    /// Refund `amount` credits.
    ///
    /// Increments balance and decrements lifetime-used in one atomic unit.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::Balance` if the refund exceeds lifetime usage.
    fn credit(&self, account_id: &AccountId, amount: i64) -> Result<Account>;

    /// Add purchased or promotional credits.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::Balance` if `amount` is not positive.
    fn grant_credits(
        &self,
        account_id: &AccountId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Account>;

    // =========================================================================
    // Conversion Operations
    // =========================================================================

    /// Commit a new `Processing` conversion and debit its cost.
    ///
    /// Returns the account after the debit.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::Balance` if the balance is too low; nothing is written.
    /// - `StoreError::AlreadyExists` if the conversion ID is taken.
    fn begin_conversion(&self, conversion: &Conversion) -> Result<Account>;

    /// Move a `Processing` conversion to `Completed`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the conversion doesn't exist.
    /// - `StoreError::Transition` if it is already terminal.
    fn complete_conversion(
        &self,
        conversion_id: &ConversionId,
        output: ConversionOutput,
    ) -> Result<Conversion>;

    /// Move a `Processing` conversion to `Failed` and refund its cost.
    ///
    /// The status change, the refund and its transaction record are written
    /// atomically. Returns the failed conversion and the refunded account.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the conversion or its account doesn't exist.
    /// - `StoreError::Transition` if it is already terminal; nothing is
    ///   refunded.
    fn fail_conversion(
        &self,
        conversion_id: &ConversionId,
        detail: &str,
    ) -> Result<(Conversion, Account)>;

    /// Get a conversion by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_conversion(&self, conversion_id: &ConversionId) -> Result<Option<Conversion>>;

    /// List an account's conversions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_conversions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Conversion>>;

    /// List every conversion still in `Processing`, across all accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_processing_conversions(&self) -> Result<Vec<Conversion>>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// List an account's credit transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;
}

/// Build the transaction that records an account's opening balance.
fn opening_transaction(account: &Account) -> Option<CreditTransaction> {
    (account.balance > 0).then(|| {
        CreditTransaction::trial_grant(account.account_id, account.balance, account.balance)
    })
}
