use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::web::AppState;
use crate::web::responses::ok;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub upstream: String,
    pub chat_backend: String,
    pub uptime_seconds: i64,
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Response {
    let uptime = chrono::Utc::now() - state.start_time;
    ok(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream: state.proxy.upstream_base().to_string(),
        chat_backend: state.chat.name().to_string(),
        uptime_seconds: uptime.num_seconds(),
    })
    .into_response()
}
