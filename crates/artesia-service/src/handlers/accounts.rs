//! Account management handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use artesia_core::Account;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub account_id: String,
    /// Current balance in credits.
    pub balance: i64,
    /// Credits spent, net of refunds.
    pub lifetime_used: i64,
    /// Credits granted (trial, purchases, bonuses).
    pub lifetime_granted: i64,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id.to_string(),
            balance: account.balance,
            lifetime_used: account.lifetime_used,
            lifetime_granted: account.lifetime_granted,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Register the caller's account with the free-trial allotment.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = Account::with_trial(auth.account_id, state.config.free_trial_credits);

    state.store.create_account(&account).map_err(|e| match e {
        artesia_store::StoreError::AlreadyExists { .. } => {
            ApiError::Conflict("Account already exists".into())
        }
        other => other.into(),
    })?;

    tracing::info!(
        account_id = %auth.account_id,
        trial_credits = account.balance,
        "Account created"
    );

    Ok(Json(AccountResponse::from(&account)))
}

/// Get the caller's account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .store
        .get_account(&auth.account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    Ok(Json(AccountResponse::from(&account)))
}
