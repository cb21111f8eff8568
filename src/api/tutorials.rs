use axum::Json;

use crate::{
    models::ApiResponse,
    services::achievements::{Tutorial, TUTORIALS},
};

/// GET /api/tutorials
pub async fn list_tutorials() -> Json<ApiResponse<&'static [Tutorial]>> {
    Json(ApiResponse::success(TUTORIALS))
}
