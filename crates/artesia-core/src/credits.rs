//! Credit transactions and purchasable credit packages.
//!
//! Every change to an account's balance is recorded as a `CreditTransaction`
//! in the same atomic write as the change itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, ConversionId, TransactionId};

/// A credit transaction representing a balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The account whose balance changed.
    pub account_id: AccountId,

    /// Signed amount. Positive = credit, negative = debit.
    pub amount: i64,

    /// What caused the change.
    pub kind: TransactionKind,

    /// Balance after this transaction.
    pub balance_after: i64,

    /// Human-readable description.
    pub description: String,

    /// The conversion this transaction belongs to, if any.
    pub conversion_id: Option<ConversionId>,

    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    fn new(
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        balance_after: i64,
        description: String,
        conversion_id: Option<ConversionId>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount,
            kind,
            balance_after,
            description,
            conversion_id,
            created_at: Utc::now(),
        }
    }

    /// Free-trial allotment at registration.
    #[must_use]
    pub fn trial_grant(account_id: AccountId, amount: i64, balance_after: i64) -> Self {
        Self::new(
            account_id,
            amount,
            TransactionKind::TrialGrant,
            balance_after,
            format!("Free trial: {amount} credits"),
            None,
        )
    }

    /// Purchased or promotional credits.
    #[must_use]
    pub fn grant(
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        balance_after: i64,
        description: String,
    ) -> Self {
        Self::new(account_id, amount, kind, balance_after, description, None)
    }

    /// Credit debited when a conversion is committed.
    #[must_use]
    pub fn conversion_charge(
        account_id: AccountId,
        amount: i64,
        balance_after: i64,
        conversion_id: ConversionId,
    ) -> Self {
        Self::new(
            account_id,
            -amount.abs(),
            TransactionKind::ConversionCharge,
            balance_after,
            format!("Conversion {conversion_id}"),
            Some(conversion_id),
        )
    }

    /// Credit returned when a conversion fails.
    #[must_use]
    pub fn conversion_refund(
        account_id: AccountId,
        amount: i64,
        balance_after: i64,
        conversion_id: ConversionId,
    ) -> Self {
        Self::new(
            account_id,
            amount.abs(),
            TransactionKind::ConversionRefund,
            balance_after,
            format!("Refund for failed conversion {conversion_id}"),
            Some(conversion_id),
        )
    }

    /// Direct debit outside the conversion flow.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: i64, balance_after: i64) -> Self {
        Self::new(
            account_id,
            -amount.abs(),
            TransactionKind::Debit,
            balance_after,
            format!("Debit of {amount} credits"),
            None,
        )
    }

    /// Direct refund outside the conversion flow.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: i64, balance_after: i64) -> Self {
        Self::new(
            account_id,
            amount.abs(),
            TransactionKind::Credit,
            balance_after,
            format!("Refund of {amount} credits"),
            None,
        )
    }
}

/// Type of credit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Registration allotment.
    TrialGrant,
    /// Credits bought through a payment provider.
    Purchase,
    /// Promotional credits.
    Bonus,
    /// Debit for a committed conversion.
    ConversionCharge,
    /// Refund of a failed conversion.
    ConversionRefund,
    /// Direct debit.
    Debit,
    /// Direct refund.
    Credit,
}

impl TransactionKind {
    /// Check if this kind adds credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        !self.is_debit()
    }

    /// Check if this kind removes credits.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::ConversionCharge | Self::Debit)
    }

    /// Get the kind name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TrialGrant => "trial_grant",
            Self::Purchase => "purchase",
            Self::Bonus => "bonus",
            Self::ConversionCharge => "conversion_charge",
            Self::ConversionRefund => "conversion_refund",
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

/// A purchasable bundle of credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditPackage {
    /// Package slug used by checkout.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Credits granted on fulfilment.
    pub credits: i64,
    /// Price in US cents.
    pub price_cents: i64,
    /// Whether the package renews monthly.
    pub recurring: bool,
}

/// The packages offered on the pricing page.
pub const CREDIT_PACKAGES: &[CreditPackage] = &[
    CreditPackage {
        id: "starter",
        name: "Starter Plan",
        credits: 15,
        price_cents: 499,
        recurring: true,
    },
    CreditPackage {
        id: "standard",
        name: "Standard Plan",
        credits: 35,
        price_cents: 999,
        recurring: true,
    },
    CreditPackage {
        id: "pro",
        name: "Pro Plan",
        credits: 60,
        price_cents: 1499,
        recurring: true,
    },
    CreditPackage {
        id: "quick-boost",
        name: "Quick Boost Pack",
        credits: 10,
        price_cents: 299,
        recurring: false,
    },
    CreditPackage {
        id: "power-pack",
        name: "Power Pack",
        credits: 25,
        price_cents: 699,
        recurring: false,
    },
];

impl CreditPackage {
    /// Look up a package by its slug.
    #[must_use]
    pub fn find(id: &str) -> Option<&'static Self> {
        CREDIT_PACKAGES.iter().find(|p| p.id == id)
    }
}
