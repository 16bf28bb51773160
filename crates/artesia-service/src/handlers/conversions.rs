//! Conversion handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use artesia_core::{Conversion, ConversionId, ConversionOutput, ImageFormat, StyleId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{paginate, PageQuery};
use crate::state::AppState;

/// Conversion request query.
#[derive(Debug, Deserialize)]
pub struct CreateConversionQuery {
    /// Style preset to apply.
    pub style_id: Option<String>,
}

/// Successful conversion response.
#[derive(Debug, Serialize)]
pub struct ConversionResultResponse {
    /// Conversion ID.
    pub conversion_id: String,
    /// Always `completed`.
    pub status: &'static str,
    /// Style applied.
    pub style_id: String,
    /// Transformation result.
    pub result: ConversionOutput,
    /// Balance after the conversion.
    pub credits_remaining: i64,
}

/// Convert the uploaded image (raw request body) with a style preset.
pub async fn create_conversion(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<CreateConversionQuery>,
    body: Bytes,
) -> Result<Json<ConversionResultResponse>, ApiError> {
    let style_id = query
        .style_id
        .ok_or_else(|| ApiError::BadRequest("style_id is required".into()))?;
    let style_id = StyleId::new(style_id.as_str())
        .map_err(|_| ApiError::NotFound(format!("Style not found: {style_id}")))?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("Image body is required".into()));
    }
    if ImageFormat::detect(&body).is_none() {
        return Err(ApiError::BadRequest(
            "Unsupported image format; expected JPEG, PNG, GIF, WebP, BMP, TIFF or AVIF".into(),
        ));
    }

    let ledger = state
        .ledger
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Transformation service not configured".into()))?;

    tracing::debug!(
        account_id = %auth.account_id,
        style_id = %style_id,
        bytes = body.len(),
        "Conversion requested"
    );

    let receipt = ledger
        .request_conversion(&auth.account_id, &style_id, body.to_vec())
        .await?;

    Ok(Json(ConversionResultResponse {
        conversion_id: receipt.conversion_id.to_string(),
        status: "completed",
        style_id: style_id.to_string(),
        result: receipt.result,
        credits_remaining: receipt.credits_remaining,
    }))
}

/// Conversion record response.
#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    /// Conversion ID.
    pub id: String,
    /// Style applied.
    pub style_id: String,
    /// Lifecycle state.
    pub status: &'static str,
    /// Credits finally paid.
    pub credits_charged: i64,
    /// Uploaded image format.
    pub input_format: ImageFormat,
    /// Uploaded image size.
    pub input_bytes: u64,
    /// Result, when completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ConversionOutput>,
    /// Failure detail, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Created timestamp.
    pub created_at: String,
    /// Terminal timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<&Conversion> for ConversionResponse {
    fn from(conversion: &Conversion) -> Self {
        Self {
            id: conversion.id.to_string(),
            style_id: conversion.style_id.to_string(),
            status: conversion.status.as_str(),
            credits_charged: conversion.credits_charged,
            input_format: conversion.input_format,
            input_bytes: conversion.input_bytes,
            result: conversion.result.clone(),
            error: conversion.error.clone(),
            created_at: conversion.created_at.to_rfc3339(),
            completed_at: conversion.completed_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// List conversions response.
#[derive(Debug, Serialize)]
pub struct ListConversionsResponse {
    /// Conversions (newest first).
    pub conversions: Vec<ConversionResponse>,
    /// Whether there are more conversions.
    pub has_more: bool,
}

/// List the caller's conversions.
pub async fn list_conversions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListConversionsResponse>, ApiError> {
    let limit = query.limit();
    let conversions =
        state
            .store
            .list_conversions_by_account(&auth.account_id, limit + 1, query.offset)?;

    let (conversions, has_more) = paginate(conversions, limit);

    Ok(Json(ListConversionsResponse {
        conversions: conversions.iter().map(ConversionResponse::from).collect(),
        has_more,
    }))
}

/// Get one of the caller's conversions.
pub async fn get_conversion(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(conversion_id): Path<String>,
) -> Result<Json<ConversionResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Conversion not found".into());

    let conversion_id: ConversionId = conversion_id.parse().map_err(|_| not_found())?;
    let conversion = state
        .store
        .get_conversion(&conversion_id)?
        .filter(|c| c.account_id == auth.account_id)
        .ok_or_else(not_found)?;

    Ok(Json(ConversionResponse::from(&conversion)))
}
