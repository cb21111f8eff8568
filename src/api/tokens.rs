use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::{
    error::Result,
    models::{ApiResponse, UserTokens},
    services::token_registry::NewToken,
};

use super::{ApiJson, ApiQuery, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensQuery {
    pub user_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveTokenQuery {
    pub user_address: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTokenRequest {
    pub user_address: String,
    pub token: NewToken,
}

/// GET /api/tokens?userAddress=
pub async fn get_tokens(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TokensQuery>,
) -> Result<Json<ApiResponse<UserTokens>>> {
    let tokens = state.token_registry().get_tokens(&query.user_address).await?;
    Ok(Json(ApiResponse::success(tokens)))
}

/// POST /api/tokens
pub async fn add_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AddTokenRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserTokens>>)> {
    let tokens = state
        .token_registry()
        .add_token(&req.user_address, req.token)
        .await?;
    state.portfolio.invalidate(&tokens.user_address).await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(tokens))))
}

/// DELETE /api/tokens?userAddress=&address=
pub async fn remove_token(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RemoveTokenQuery>,
) -> Result<Json<ApiResponse<UserTokens>>> {
    let tokens = state
        .token_registry()
        .remove_token(&query.user_address, &query.address)
        .await?;
    state.portfolio.invalidate(&tokens.user_address).await;
    Ok(Json(ApiResponse::success(tokens)))
}
