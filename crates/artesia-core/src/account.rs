//! Account types for Artesia.
//!
//! An account carries the credit balance and the usage counters the ledger
//! keeps in step with it. All balance arithmetic lives here so every storage
//! backend applies exactly the same rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Credits granted to a new account at registration.
pub const DEFAULT_FREE_TRIAL_CREDITS: i64 = 3;

/// A credit account for a user.
///
/// Invariants:
/// - `balance >= 0`
/// - every debit adds the same amount to `lifetime_used`, every refund
///   removes it again, so `lifetime_used >= 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The account ID.
    pub account_id: AccountId,

    /// Current credit balance.
    pub balance: i64,

    /// Credits spent over the account's lifetime, net of refunds.
    pub lifetime_used: i64,

    /// Credits granted over the account's lifetime (trial, purchases, bonuses).
    pub lifetime_granted: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            balance: 0,
            lifetime_used: 0,
            lifetime_granted: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new account holding a free-trial allotment.
    #[must_use]
    pub fn with_trial(account_id: AccountId, trial_credits: i64) -> Self {
        let mut account = Self::new(account_id);
        let trial = trial_credits.max(0);
        account.balance = trial;
        account.lifetime_granted = trial;
        account
    }

    /// Check if the account can pay for `amount` credits.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.balance >= amount
    }

    /// Spend `amount` credits.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `BalanceError::InvalidAmount` if `amount <= 0`.
    /// - `BalanceError::InsufficientCredits` if the balance is too low; the
    ///   account is left untouched.
    pub fn debit(&mut self, amount: i64) -> Result<i64, BalanceError> {
        ensure_positive(amount)?;
        if !self.has_sufficient_credits(amount) {
            return Err(BalanceError::InsufficientCredits {
                balance: self.balance,
                required: amount,
            });
        }

        self.balance -= amount;
        self.lifetime_used += amount;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Give back `amount` previously debited credits.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `BalanceError::InvalidAmount` if `amount <= 0`.
    /// - `BalanceError::RefundExceedsUsage` if more is refunded than was ever
    ///   spent.
    pub fn refund(&mut self, amount: i64) -> Result<i64, BalanceError> {
        ensure_positive(amount)?;
        if amount > self.lifetime_used {
            return Err(BalanceError::RefundExceedsUsage {
                lifetime_used: self.lifetime_used,
                refund: amount,
            });
        }

        self.balance += amount;
        self.lifetime_used -= amount;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Add purchased or promotional credits.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `BalanceError::InvalidAmount` if `amount <= 0`.
    pub fn grant(&mut self, amount: i64) -> Result<i64, BalanceError> {
        ensure_positive(amount)?;
        self.balance += amount;
        self.lifetime_granted += amount;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }
}

fn ensure_positive(amount: i64) -> Result<(), BalanceError> {
    if amount > 0 {
        Ok(())
    } else {
        Err(BalanceError::InvalidAmount(amount))
    }
}

/// Errors from balance arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceError {
    /// The balance does not cover the debit.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The refund is larger than the credits ever spent.
    #[error("refund of {refund} exceeds lifetime usage of {lifetime_used}")]
    RefundExceedsUsage {
        /// Credits spent so far.
        lifetime_used: i64,
        /// Requested refund.
        refund: i64,
    },

    /// Amounts must be strictly positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}
