//! Webhook, health and job status handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::trading::validate_decision;

use super::AppState;

pub const SERVICE_NAME: &str = "Bybit Trading Bot Webhook";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: bool,
    pub message: String,
    pub status_code: u16,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedBody {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub queued_jobs: usize,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// JSON error response with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: true,
        message: message.into(),
        status_code: status.as_u16(),
        timestamp: timestamp(),
    };
    (status, Json(body)).into_response()
}

/// `POST /`: validate a trade decision and queue it for background execution.
pub async fn webhook(State(state): State<AppState>, body: Bytes) -> Response {
    if body.is_empty() {
        warn!("Webhook request with empty body");
        return error_response(StatusCode::BAD_REQUEST, "No content received");
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON format");
        }
    };

    let decision = match validate_decision(&payload) {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, "Rejected invalid trade decision");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    info!(
        symbol = %decision.trade.symbol,
        side = %decision.trade.side,
        action = %decision.trade.action,
        "Received trade decision"
    );

    let raw = String::from_utf8_lossy(&body);
    match state.dispatcher.submit(decision.trade, &raw).await {
        Ok(job_id) => {
            let body = AcceptedBody {
                status: "accepted",
                message: "Trade decision received and queued for execution",
                timestamp: timestamp(),
                job_id,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to queue trade decision");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal server error: {}", e),
            )
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "healthy",
        timestamp: timestamp(),
        service: SERVICE_NAME,
        queued_jobs: state.dispatcher.registry().queued_count().await,
    })
}

/// `GET /trades/:id`
pub async fn trade_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let job = match Uuid::parse_str(&id) {
        Ok(job_id) => state.dispatcher.registry().get(job_id).await,
        Err(_) => None,
    };

    match job {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Trade job {} not found", id)),
    }
}

pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}
