//! Style catalog handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use artesia_core::{StyleId, StylePreset};

use crate::error::ApiError;
use crate::state::AppState;

/// Style list response.
#[derive(Debug, Serialize)]
pub struct StylesResponse {
    /// Active presets, by category then name.
    pub styles: Vec<StylePreset>,
    /// Distinct categories.
    pub categories: Vec<String>,
}

/// List active style presets.
pub async fn list_styles(State(state): State<Arc<AppState>>) -> Json<StylesResponse> {
    Json(StylesResponse {
        styles: state.catalog.list().into_iter().cloned().collect(),
        categories: state
            .catalog
            .categories()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

/// Get one style preset.
pub async fn get_style(
    State(state): State<Arc<AppState>>,
    Path(style_id): Path<String>,
) -> Result<Json<StylePreset>, ApiError> {
    let not_found = || ApiError::NotFound(format!("Style not found: {style_id}"));

    let id = StyleId::new(style_id.as_str()).map_err(|_| not_found())?;
    let preset = state.catalog.resolve(&id).map_err(|_| not_found())?;

    Ok(Json(preset.clone()))
}
