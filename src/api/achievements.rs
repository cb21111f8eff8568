use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::Result,
    models::ApiResponse,
    services::{
        progress_service::{AchievementsView, CompletionOutcome},
        ProgressService,
    },
};

use super::{ApiJson, ApiQuery, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsQuery {
    pub user_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTutorialRequest {
    pub user_address: String,
    pub tutorial_id: String,
    pub quiz_score: i64,
}

/// GET /api/achievements?userAddress=
pub async fn get_achievements(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AchievementsQuery>,
) -> Result<Json<ApiResponse<AchievementsView>>> {
    let view = ProgressService::new(state.store)
        .achievements(&query.user_address)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// POST /api/achievements
///
/// A repeated completion answers 200 with `success: false`.
pub async fn complete_tutorial(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CompleteTutorialRequest>,
) -> Result<Json<CompletionOutcome>> {
    let outcome = ProgressService::new(state.store)
        .complete_tutorial(&req.user_address, &req.tutorial_id, req.quiz_score)
        .await?;
    Ok(Json(outcome))
}
