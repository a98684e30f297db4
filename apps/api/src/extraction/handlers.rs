//! Axum route handlers for the Extraction API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::extraction::extractor::ListingRequest;
use crate::extraction::hints::{extract_location_hints, LocationHints};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HintsRequest {
    pub description: String,
}

/// POST /extract
///
/// Normalizes the listing, runs the model (primary then fallback) and returns
/// the cleaned result: exactly the schema's fields, each conforming or null.
pub async fn handle_extract(
    State(state): State<AppState>,
    payload: Result<Json<ListingRequest>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, AppError> {
    let Json(request) = payload?;
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("description cannot be empty".to_string()));
    }

    let result = state.extractor.extract(&request).await?;

    Ok(Json(result))
}

/// POST /extract/hints
///
/// Returns the location hints found in a description, without calling the model.
/// Useful for previewing what the extractor will suggest.
pub async fn handle_hints(
    State(state): State<AppState>,
    payload: Result<Json<HintsRequest>, JsonRejection>,
) -> Result<Json<LocationHints>, AppError> {
    let Json(request) = payload?;

    Ok(Json(extract_location_hints(
        &request.description,
        state.extractor.catalogs(),
    )))
}
