use axum::{Json, extract::State};
use serde::Serialize;

use crate::config::ResponseMode;
use crate::state::AppState;

/// ヘルスチェックレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
}

/// ヘルスチェックハンドラー
///
/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mode = match state.router.mode() {
        ResponseMode::Interactive => "interactive",
        ResponseMode::Rest => "rest",
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode,
    })
}
