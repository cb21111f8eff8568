use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::Result,
    models::ApiResponse,
    services::swap_service::SwapQuote,
};

use super::{ApiJson, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(default)]
    pub user_address: Option<String>,
    pub sell_token: String,
    pub buy_token: String,
    #[serde(default, deserialize_with = "crate::utils::string_or_number")]
    pub amount: Option<String>,
    /// Percent, e.g. 0.5 for 0.5%.
    #[serde(default)]
    pub slippage: Option<f64>,
}

/// POST /api/swap/quote
pub async fn get_quote(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<QuoteRequest>,
) -> Result<Json<ApiResponse<SwapQuote>>> {
    let amount = req
        .amount
        .ok_or_else(|| crate::error::AppError::BadRequest("amount is required".to_string()))?;
    let quote = state
        .swap_service()
        .quote(
            req.user_address.as_deref(),
            &req.sell_token,
            &req.buy_token,
            &amount,
            req.slippage,
        )
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}
