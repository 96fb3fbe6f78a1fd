//! Manual drive control HTTP handler

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::errors::AppError;
use crate::services::robot::INVALID_DIRECTION_MESSAGE;
use crate::services::{CommandReceipt, DriveCommand};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct ManualControlRequest {
    pub direction: Option<String>,
    pub speed: Option<f64>,
}

/// `POST /api/manual`
pub async fn manual_control(
    State(state): State<AppState>,
    payload: Result<Json<ManualControlRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected manual control body");
            return rejected(StatusCode::BAD_REQUEST, INVALID_DIRECTION_MESSAGE);
        }
    };

    let command = match DriveCommand::parse(request.direction.as_deref(), request.speed) {
        Ok(command) => command,
        Err(AppError::Validation { message }) => {
            return rejected(StatusCode::BAD_REQUEST, &message);
        }
        Err(e) => return rejected(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match state.robot.drive(command).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => {
            error!(error = %e, "Manual control command failed");
            rejected(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn rejected(status: StatusCode, message: &str) -> Response {
    (status, Json(CommandReceipt::rejected(message))).into_response()
}
