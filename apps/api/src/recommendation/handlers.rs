//! Axum route handlers for the Recommendation API.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::recommendation::generator::{
    generate_recommendations, generate_scholarships, GenerateRecommendationsRequest,
    GenerateScholarshipsRequest, RecommendationResponse, ScholarshipResponse,
};
use crate::state::AppState;

/// POST /api/v1/recommendations/generate
///
/// Ranks catalog courses (and any scholarships the model mentions) against the
/// user's latest transcript.
pub async fn handle_generate_recommendations(
    State(state): State<AppState>,
    Json(request): Json<GenerateRecommendationsRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let response = generate_recommendations(
        state.store.as_ref(),
        &state.llm,
        state.config.catalog_limit,
        request,
    )
    .await?;
    Ok(Json(response))
}

/// POST /api/v1/scholarships/generate
pub async fn handle_generate_scholarships(
    State(state): State<AppState>,
    Json(request): Json<GenerateScholarshipsRequest>,
) -> Result<Json<ScholarshipResponse>, AppError> {
    let response = generate_scholarships(state.store.as_ref(), &state.llm, request).await?;
    Ok(Json(response))
}
