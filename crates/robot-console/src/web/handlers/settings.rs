//! Stream URL setting HTTP handlers

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::web::AppState;
use crate::web::responses::{bad_request, handle_result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUrlSetting {
    /// Stored form, proxied when it points at the robot
    pub url: String,
    /// Operator-facing form
    pub display_url: String,
    pub proxied: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStreamUrlRequest {
    pub url: String,
}

fn describe(state: &AppState, url: String) -> StreamUrlSetting {
    StreamUrlSetting {
        display_url: state.rewriter.display_form(&url),
        proxied: state.rewriter.is_proxied(&url),
        url,
    }
}

/// `GET /api/settings/stream-url`
pub async fn get_stream_url(State(state): State<AppState>) -> Response {
    let result = state
        .store
        .load_stream_url(&state.config.storage.default_stream_url)
        .await
        .map(|url| describe(&state, url));
    handle_result(result)
}

/// `PUT /api/settings/stream-url`
pub async fn update_stream_url(
    State(state): State<AppState>,
    Json(request): Json<UpdateStreamUrlRequest>,
) -> Response {
    let url = request.url.trim();
    if url.is_empty() {
        return bad_request("url must not be empty").into_response();
    }

    let stored = state.rewriter.to_proxied(url);
    info!(url = %stored, "Updating stream URL");
    let result = state
        .store
        .save_stream_url(&stored)
        .await
        .map(|_| describe(&state, stored));
    handle_result(result)
}
