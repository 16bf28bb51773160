//! Per-account locks.
//!
//! `RocksDB` writes are atomic per batch but a read-modify-write of an account
//! is not. Every such sequence holds its account's mutex, so two debits on one
//! account never interleave while different accounts never wait on each other.
//! A mutex is kept for every account touched since the store was opened.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use artesia_core::AccountId;

pub(crate) type AccountGuard = ArcMutexGuard<RawMutex, ()>;

pub(crate) struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub(crate) fn lock(&self, account_id: &AccountId) -> AccountGuard {
        // Clone out of the map so the shard is released before blocking.
        let mutex = self.locks.entry(*account_id).or_default().clone();
        mutex.lock_arc()
    }
}
