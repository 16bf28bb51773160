//! OpenAI-compatible vision client.

mod client;
mod types;

pub use client::{OpenAiTransformer, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
