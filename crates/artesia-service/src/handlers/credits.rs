//! Credit balance, history, packages and grant handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use artesia_core::{AccountId, CreditPackage, CreditTransaction, TransactionKind, CREDIT_PACKAGES};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::handlers::{paginate, PageQuery};
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current balance in credits.
    pub balance: i64,
    /// Credits spent, net of refunds.
    pub lifetime_used: i64,
    /// Credits granted.
    pub lifetime_granted: i64,
}

/// Get current credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = state
        .store
        .get_account(&auth.account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    Ok(Json(BalanceResponse {
        balance: account.balance,
        lifetime_used: account.lifetime_used,
        lifetime_granted: account.lifetime_granted,
    }))
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Signed amount (positive = credit, negative = debit).
    pub amount: i64,
    /// Transaction kind.
    pub kind: &'static str,
    /// Balance after this transaction.
    pub balance_after: i64,
    /// Description.
    pub description: String,
    /// Related conversion, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_id: Option<String>,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount: tx.amount,
            kind: tx.kind.as_str(),
            balance_after: tx.balance_after,
            description: tx.description.clone(),
            conversion_id: tx.conversion_id.map(|id| id.to_string()),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    state
        .store
        .get_account(&auth.account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit();
    let transactions =
        state
            .store
            .list_transactions_by_account(&auth.account_id, limit + 1, query.offset)?;

    let (transactions, has_more) = paginate(transactions, limit);

    Ok(Json(ListTransactionsResponse {
        transactions: transactions.iter().map(TransactionResponse::from).collect(),
        has_more,
    }))
}

/// Credit packages response.
#[derive(Debug, Serialize)]
pub struct PackagesResponse {
    /// Packages on offer.
    pub packages: &'static [CreditPackage],
}

/// List purchasable credit packages.
pub async fn list_packages() -> Json<PackagesResponse> {
    Json(PackagesResponse {
        packages: CREDIT_PACKAGES,
    })
}

/// Admin grant request: either a package or an explicit amount.
#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    /// Account to credit.
    pub account_id: String,
    /// Package to fulfil.
    #[serde(default)]
    pub package_id: Option<String>,
    /// Explicit bonus credits.
    #[serde(default)]
    pub credits: Option<i64>,
    /// Reason recorded on the transaction.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Grant response.
#[derive(Debug, Serialize)]
pub struct GrantCreditsResponse {
    /// Account credited.
    pub account_id: String,
    /// Credits added.
    pub granted: i64,
    /// Balance after the grant.
    pub balance: i64,
}

/// Fulfil a package purchase or add bonus credits (admin only).
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantCreditsRequest>,
) -> Result<Json<GrantCreditsResponse>, ApiError> {
    let account_id: AccountId = body
        .account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    let (amount, kind, description) = match (body.package_id.as_deref(), body.credits) {
        (Some(package_id), None) => {
            let package = CreditPackage::find(package_id)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown package: {package_id}")))?;
            (
                package.credits,
                TransactionKind::Purchase,
                body.reason
                    .unwrap_or_else(|| format!("Purchased {}", package.name)),
            )
        }
        (None, Some(credits)) => (
            credits,
            TransactionKind::Bonus,
            body.reason.unwrap_or_else(|| "Bonus credits".into()),
        ),
        _ => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of package_id or credits".into(),
            ))
        }
    };

    let account = state
        .store
        .grant_credits(&account_id, amount, kind, &description)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        account_id = %account_id,
        amount,
        kind = kind.as_str(),
        new_balance = account.balance,
        "Credits granted"
    );

    Ok(Json(GrantCreditsResponse {
        account_id: account_id.to_string(),
        granted: amount,
        balance: account.balance,
    }))
}
