use axum::{extract::State, Json};

use crate::{model::response::HealthResponse, prompt::SharedAnalyzer};

/// # GET /api/health
pub async fn handler_health(State(analyzer): State<SharedAnalyzer>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        ai_enabled: analyzer.is_remote(),
        analyzer: analyzer.name(),
    })
}
