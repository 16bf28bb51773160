//! Error type for conversion requests.

use artesia_core::{AccountId, ConversionId, StyleId};
use artesia_store::StoreError;

/// Why a conversion request did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The style preset does not exist. Nothing was written.
    #[error("style not found: {style_id}")]
    StyleNotFound {
        /// The requested style.
        style_id: StyleId,
    },

    /// The account cannot pay for the conversion. Nothing was written.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Balance at the time of the request.
        balance: i64,
        /// Credits one conversion costs.
        required: i64,
    },

    /// The account does not exist. Nothing was written.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The requested account.
        account_id: AccountId,
    },

    /// The upload is empty or not a supported image. Nothing was written.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The transformation failed; the conversion is `Failed` and its credit
    /// has been refunded.
    #[error("transformation failed for {conversion_id}: {reason}")]
    TransformationFailed {
        /// The failed conversion.
        conversion_id: ConversionId,
        /// What went wrong.
        reason: String,
        /// Balance after the refund.
        credits_remaining: i64,
    },

    /// A store write failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The detached conversion task was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}
