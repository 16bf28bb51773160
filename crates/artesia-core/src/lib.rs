//! Core types and utilities for Artesia.
//!
//! This crate provides the foundational types shared by the ledger, the
//! storage layer and the HTTP service:
//!
//! - **Identifiers**: `AccountId`, `ConversionId`, `TransactionId`, `StyleId`
//! - **Accounts**: `Account` and its balance arithmetic
//! - **Styles**: `StylePreset`, `StyleCatalog`
//! - **Conversions**: `Conversion`, `ConversionStatus`, `ConversionOutput`
//! - **Credits**: `CreditTransaction`, `TransactionKind`, `CreditPackage`
//!
//! # Credits
//!
//! **1 credit = 1 conversion attempt.** A failed attempt is refunded in full,
//! so an account only ever pays for conversions that completed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod conversion;
pub mod credits;
pub mod error;
pub mod ids;
pub mod style;
pub mod upload;

pub use account::{Account, BalanceError, DEFAULT_FREE_TRIAL_CREDITS};
pub use conversion::{
    Conversion, ConversionOutput, ConversionStatus, TransitionError, CONVERSION_COST,
};
pub use credits::{CreditPackage, CreditTransaction, TransactionKind, CREDIT_PACKAGES};
pub use error::{ArtesiaError, Result};
pub use ids::{AccountId, ConversionId, IdError, StyleId, TransactionId};
pub use style::{StyleCatalog, StylePreset};
pub use upload::ImageFormat;
