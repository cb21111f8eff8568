use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{error::Result, models::ApiResponse, services::portfolio::Portfolio};

use super::{ApiQuery, AppState};

#[derive(Debug, Deserialize)]
pub struct PortfolioQuery {
    pub address: String,
}

/// GET /api/portfolio?address=
pub async fn get_portfolio(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PortfolioQuery>,
) -> Result<Json<ApiResponse<Portfolio>>> {
    let portfolio = state.portfolio.snapshot(&query.address).await?;
    Ok(Json(ApiResponse::success(portfolio)))
}
