use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub conversations: String,
    pub llm: String,
    pub chain_id: u64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.store.ping().await {
        format!("{} (connected)", state.store.backend())
    } else {
        format!("{} (disconnected)", state.store.backend())
    };

    let llm = if state.llm.is_some() {
        "configured"
    } else {
        "keyword-fallback"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        conversations: state.conversations.backend().to_string(),
        llm: llm.to_string(),
        chain_id: state.config.base_chain_id,
    })
}
