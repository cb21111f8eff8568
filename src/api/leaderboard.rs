use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    constants::DEFAULT_LEADERBOARD_LIMIT,
    error::Result,
    models::ApiResponse,
    services::{progress_service::Leaderboard, ProgressService},
    utils::ensure_page_limit,
};

use super::{ApiQuery, AppState};

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

/// GET /api/leaderboard?limit=
pub async fn get_leaderboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> Result<Json<ApiResponse<Leaderboard>>> {
    let limit = ensure_page_limit(query.limit, DEFAULT_LEADERBOARD_LIMIT)?;
    let leaderboard = ProgressService::new(state.store).leaderboard(limit).await?;
    Ok(Json(ApiResponse::success(leaderboard)))
}
