//! Transformation service clients for Artesia.
//!
//! The ledger talks to the external transformation service only through the
//! [`TransformationService`] trait. This crate provides:
//!
//! - [`OpenAiTransformer`]: an OpenAI-compatible vision client that asks a chat
//!   model to describe the photo restyled by a preset prompt.
//! - [`ScriptedTransformer`]: a fake with scripted outcomes for tests.
//!
//! Implementations report every kind of failure as a [`TransformError`]; the
//! ledger does not distinguish between them when deciding to refund.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
pub mod fake;
pub mod openai;

pub use error::TransformError;
pub use fake::{Script, ScriptedTransformer};
pub use openai::{OpenAiTransformer, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

use artesia_core::{ConversionOutput, ImageFormat};

/// An external service that turns an image and a style prompt into a result.
///
/// Implementations are untrusted: they may be slow, fail, or panic. Callers
/// bound them with a timeout and treat every error the same way.
#[async_trait::async_trait]
pub trait TransformationService: Send + Sync {
    /// Transform `image` according to `prompt`.
    async fn transform(
        &self,
        prompt: &str,
        image: &[u8],
        format: ImageFormat,
    ) -> Result<ConversionOutput, TransformError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
