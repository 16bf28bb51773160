//! Artesia HTTP API Service.
//!
//! This crate exposes the conversion ledger over HTTP:
//!
//! - Account registration with free-trial credits
//! - Credit balance, history, packages and admin grants
//! - Style preset catalog
//! - Photo conversions
//!
//! # Authentication
//!
//! 1. **HS256 JWT bearer tokens** - end-user requests; `sub` is the account ID.
//! 2. **Admin API key** - `x-admin-key` header for credit grants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Read-only handlers are async for the router

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
