//! The conversion ledger.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use artesia_core::{
    AccountId, BalanceError, Conversion, ConversionId, ConversionOutput, ImageFormat, StyleId,
    StyleCatalog, CONVERSION_COST,
};
use artesia_store::{Store, StoreError};
use artesia_transform::{TransformError, TransformationService};

use crate::error::ConversionError;

/// Default bound on one transformation call.
const DEFAULT_TRANSFORM_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of fail-and-refund write attempts.
const DEFAULT_REFUND_ATTEMPTS: u32 = 3;

/// Pause between refund attempts, multiplied by the attempt number.
const REFUND_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Detail recorded on conversions reconciled at start-up.
const INTERRUPTED_DETAIL: &str = "interrupted before completion";

/// Tunables for the ledger.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// Upper bound on one transformation call.
    pub transform_timeout: Duration,
    /// Credits debited per conversion.
    pub cost: i64,
    /// Fail-and-refund write attempts before giving up.
    pub refund_attempts: u32,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            transform_timeout: DEFAULT_TRANSFORM_TIMEOUT,
            cost: CONVERSION_COST,
            refund_attempts: DEFAULT_REFUND_ATTEMPTS,
        }
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionReceipt {
    /// The completed conversion.
    pub conversion_id: ConversionId,
    /// What the transformation service produced.
    pub result: ConversionOutput,
    /// Balance after the conversion was paid for.
    pub credits_remaining: i64,
}

/// Couples credit debits to transformation calls.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    catalog: Arc<StyleCatalog>,
    transformer: Arc<dyn TransformationService>,
    options: LedgerOptions,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("transformer", &self.transformer.name())
            .field("styles", &self.catalog.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger with default options.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<StyleCatalog>,
        transformer: Arc<dyn TransformationService>,
    ) -> Self {
        Self::with_options(store, catalog, transformer, LedgerOptions::default())
    }

    /// Create a ledger with explicit options.
    #[must_use]
    pub fn with_options(
        store: Arc<dyn Store>,
        catalog: Arc<StyleCatalog>,
        transformer: Arc<dyn TransformationService>,
        options: LedgerOptions,
    ) -> Self {
        Self {
            store,
            catalog,
            transformer,
            options,
        }
    }

    /// The options this ledger runs with.
    #[must_use]
    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    /// Debit one conversion, run the transformation and reconcile.
    ///
    /// Validation happens before anything is written: an unknown style, an
    /// unrecognised image, a missing account or a short balance all return
    /// without touching the store. Once the debit is committed the conversion
    /// always ends `Completed` or `Failed` with its credit refunded, even if
    /// the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - `ConversionError::StyleNotFound`, `InvalidImage`, `AccountNotFound`
    ///   or `InsufficientCredits` when the request is rejected up front.
    /// - `ConversionError::TransformationFailed` when the transformation
    ///   failed, timed out or panicked; the credit has been refunded.
    /// - `ConversionError::Storage` when a store write failed and could not be
    ///   compensated; the conversion is left for [`Ledger::recover_interrupted`].
    pub async fn request_conversion(
        &self,
        account_id: &AccountId,
        style_id: &StyleId,
        image: Vec<u8>,
    ) -> Result<ConversionReceipt, ConversionError> {
        let prompt = self
            .catalog
            .resolve(style_id)
            .map_err(|_| ConversionError::StyleNotFound {
                style_id: style_id.clone(),
            })?
            .prompt
            .clone();

        if image.is_empty() {
            return Err(ConversionError::InvalidImage("empty upload".into()));
        }
        let format = ImageFormat::detect(&image)
            .ok_or_else(|| ConversionError::InvalidImage("unsupported image format".into()))?;

        let conversion = Conversion::begin(
            *account_id,
            style_id.clone(),
            self.options.cost,
            image.len() as u64,
            format,
        );
        let conversion_id = conversion.id;

        let account = self
            .store
            .begin_conversion(&conversion)
            .map_err(|e| reject_begin(e, account_id))?;

        tracing::info!(
            account_id = %account_id,
            conversion_id = %conversion_id,
            style_id = %style_id,
            balance = account.balance,
            "Conversion committed"
        );

        let ledger = self.clone();
        let task = tokio::spawn(async move {
            ledger
                .execute(conversion_id, prompt, image, format, account.balance)
                .await
        });

        task.await.map_err(|e| {
            tracing::error!(conversion_id = %conversion_id, error = %e, "Conversion task lost");
            ConversionError::Internal(e.to_string())
        })?
    }

    /// Reconcile every conversion left in `Processing` by a previous process.
    ///
    /// See [`recover_interrupted`].
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::Storage` if the scan fails, or if any record
    /// could not be refunded after all attempts.
    pub async fn recover_interrupted(&self) -> Result<usize, ConversionError> {
        recover_interrupted(self.store.as_ref(), &self.options).await
    }

    /// Steps 2 and 3: run the transformation and reconcile.
    async fn execute(
        &self,
        conversion_id: ConversionId,
        prompt: String,
        image: Vec<u8>,
        format: ImageFormat,
        balance_after_debit: i64,
    ) -> Result<ConversionReceipt, ConversionError> {
        let output = match self.transform(&prompt, &image, format).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    conversion_id = %conversion_id,
                    transformer = self.transformer.name(),
                    error = %e,
                    "Transformation failed"
                );
                return Err(self.refund_failure(&conversion_id, e.to_string()).await);
            }
        };

        match self.store.complete_conversion(&conversion_id, output.clone()) {
            Ok(conversion) => {
                let credits_remaining = self
                    .store
                    .get_account(&conversion.account_id)
                    .ok()
                    .flatten()
                    .map_or(balance_after_debit, |a| a.balance);

                tracing::info!(
                    conversion_id = %conversion_id,
                    account_id = %conversion.account_id,
                    credits_remaining,
                    "Conversion completed"
                );

                Ok(ConversionReceipt {
                    conversion_id,
                    result: output,
                    credits_remaining,
                })
            }
            Err(e) => {
                tracing::error!(
                    conversion_id = %conversion_id,
                    error = %e,
                    "Failed to persist completed conversion"
                );
                Err(self
                    .refund_failure(&conversion_id, format!("failed to persist result: {e}"))
                    .await)
            }
        }
    }

    /// Call the transformer, folding timeouts and panics into errors.
    async fn transform(
        &self,
        prompt: &str,
        image: &[u8],
        format: ImageFormat,
    ) -> Result<ConversionOutput, TransformError> {
        let timeout = self.options.transform_timeout;
        let call = tokio::time::timeout(timeout, self.transformer.transform(prompt, image, format));

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(TransformError::Timeout(timeout)),
            Err(payload) => Err(TransformError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Compensate and describe the outcome to the caller.
    async fn refund_failure(&self, conversion_id: &ConversionId, reason: String) -> ConversionError {
        match self.compensate(conversion_id, &reason).await {
            Ok(credits_remaining) => ConversionError::TransformationFailed {
                conversion_id: *conversion_id,
                reason,
                credits_remaining,
            },
            Err(e) => e,
        }
    }

    async fn compensate(
        &self,
        conversion_id: &ConversionId,
        detail: &str,
    ) -> Result<i64, ConversionError> {
        compensate(self.store.as_ref(), &self.options, conversion_id, detail).await
    }
}

/// Reconcile every conversion left in `Processing` by a previous process.
///
/// Each one is failed and refunded. Must run before new conversions are
/// accepted, since it cannot tell a stranded record from one in flight. It
/// needs no transformer, so it can run even when conversions are disabled.
///
/// Returns the number of conversions reconciled.
///
/// # Errors
///
/// Returns `ConversionError::Storage` if the scan fails, or if any record
/// could not be refunded after all attempts. Every other record is still
/// processed.
pub async fn recover_interrupted(
    store: &dyn Store,
    options: &LedgerOptions,
) -> Result<usize, ConversionError> {
    let stranded = store.list_processing_conversions()?;
    if stranded.is_empty() {
        tracing::debug!("No interrupted conversions");
        return Ok(0);
    }

    tracing::warn!(count = stranded.len(), "Recovering interrupted conversions");

    let mut recovered = 0;
    let mut first_error = None;
    for conversion in stranded {
        match compensate(store, options, &conversion.id, INTERRUPTED_DETAIL).await {
            Ok(_) => recovered += 1,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(recovered),
    }
}

/// Fail the conversion and refund its credit, retrying transient store
/// errors. Returns the balance after the refund.
async fn compensate(
    store: &dyn Store,
    options: &LedgerOptions,
    conversion_id: &ConversionId,
    detail: &str,
) -> Result<i64, ConversionError> {
    let attempts = options.refund_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match store.fail_conversion(conversion_id, detail) {
            Ok((conversion, account)) => {
                tracing::info!(
                    conversion_id = %conversion_id,
                    account_id = %account.account_id,
                    refunded = conversion.cost,
                    balance = account.balance,
                    "Conversion failed and refunded"
                );
                return Ok(account.balance);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(
                    conversion_id = %conversion_id,
                    attempt,
                    error = %e,
                    "Refund write failed, retrying"
                );
                tokio::time::sleep(REFUND_RETRY_BACKOFF * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    conversion_id = %conversion_id,
                    attempt,
                    error = %e,
                    "Refund write failed; conversion left processing until recovery"
                );
                return Err(ConversionError::Storage(e));
            }
        }
    }
}

/// Map a rejected debit to the caller-facing error.
fn reject_begin(err: StoreError, account_id: &AccountId) -> ConversionError {
    match err {
        StoreError::NotFound { .. } => ConversionError::AccountNotFound {
            account_id: *account_id,
        },
        StoreError::Balance(BalanceError::InsufficientCredits { balance, required }) => {
            ConversionError::InsufficientCredits { balance, required }
        }
        other => ConversionError::Storage(other),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
