use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    error::Result,
    models::{ApiResponse, PaginatedResponse, Transaction},
    services::{transaction_history::NewTransaction, TransactionHistoryService},
};

use super::{ApiJson, ApiQuery, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: String,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub tx_hash: String,
    pub status: String,
}

/// POST /api/transactions
pub async fn record_transaction(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewTransaction>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>)> {
    let tx = TransactionHistoryService::new(state.store).record(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(tx))))
}

/// GET /api/transactions?userId=&type=&status=&limit=
pub async fn get_history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<Transaction>>>> {
    let history = TransactionHistoryService::new(state.store)
        .list(
            &query.user_id,
            query.tx_type.as_deref(),
            query.status.as_deref(),
            query.limit,
        )
        .await?;
    Ok(Json(ApiResponse::success(history)))
}

/// GET /api/transactions/{tx_hash}
pub async fn get_details(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<ApiResponse<Transaction>>> {
    let tx = TransactionHistoryService::new(state.store).get(&tx_hash).await?;
    Ok(Json(ApiResponse::success(tx)))
}

/// PATCH /api/transactions
pub async fn update_status(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Transaction>>> {
    let tx = TransactionHistoryService::new(state.store)
        .update_status(&req.tx_hash, &req.status)
        .await?;
    Ok(Json(ApiResponse::success(tx)))
}
