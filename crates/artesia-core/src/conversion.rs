//! Conversion records and their lifecycle.
//!
//! A conversion is created in `Processing` at the moment its credit is
//! debited and moves exactly once to `Completed` or `Failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, ConversionId, ImageFormat, StyleId};

/// Credits debited for one conversion attempt.
pub const CONVERSION_COST: i64 = 1;

/// A single request to transform one image with one style preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// Unique conversion ID (ULID for time-ordering).
    pub id: ConversionId,

    /// The account that requested and paid for the conversion.
    pub account_id: AccountId,

    /// The style preset used.
    pub style_id: StyleId,

    /// Current lifecycle state.
    pub status: ConversionStatus,

    /// Credits debited when the conversion was committed.
    pub cost: i64,

    /// Credits the account finally paid: `cost` once completed, 0 otherwise.
    pub credits_charged: i64,

    /// Size of the uploaded image in bytes.
    pub input_bytes: u64,

    /// Detected format of the uploaded image.
    pub input_format: ImageFormat,

    /// Transformation result, present only when completed.
    pub result: Option<ConversionOutput>,

    /// Failure detail, present only when failed.
    pub error: Option<String>,

    /// When the conversion was committed.
    pub created_at: DateTime<Utc>,

    /// When the conversion reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Conversion {
    /// Create a new conversion in the `Processing` state.
    #[must_use]
    pub fn begin(
        account_id: AccountId,
        style_id: StyleId,
        cost: i64,
        input_bytes: u64,
        input_format: ImageFormat,
    ) -> Self {
        Self {
            id: ConversionId::generate(),
            account_id,
            style_id,
            status: ConversionStatus::Processing,
            cost,
            credits_charged: 0,
            input_bytes,
            input_format,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark the conversion completed with its result.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the conversion is `Processing`.
    pub fn complete(
        &mut self,
        output: ConversionOutput,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(ConversionStatus::Completed)?;
        self.credits_charged = self.cost;
        self.result = Some(output);
        self.completed_at = Some(at);
        Ok(())
    }

    /// Mark the conversion failed.
    ///
    /// Returns the number of credits that must be refunded.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the conversion is `Processing`.
    pub fn fail(&mut self, detail: String, at: DateTime<Utc>) -> Result<i64, TransitionError> {
        self.transition(ConversionStatus::Failed)?;
        self.credits_charged = 0;
        self.error = Some(detail);
        self.completed_at = Some(at);
        Ok(self.cost)
    }

    /// Check if the conversion has reached `Completed` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, to: ConversionStatus) -> Result<(), TransitionError> {
        if self.status != ConversionStatus::Processing {
            return Err(TransitionError {
                conversion_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Lifecycle state of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Credit debited, transformation in flight.
    Processing,

    /// Transformation succeeded; the debit stands.
    Completed,

    /// Transformation failed; the debit was refunded.
    Failed,
}

impl ConversionStatus {
    /// Check if the status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// The payload produced by a successful transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Description of the transformed image.
    pub description: String,

    /// Model or engine that produced the result.
    pub model: String,
}

/// A conversion was asked to leave a state it cannot leave.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conversion {conversion_id} cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    /// The conversion.
    pub conversion_id: ConversionId,
    /// Its current status.
    pub from: ConversionStatus,
    /// The rejected target status.
    pub to: ConversionStatus,
}
