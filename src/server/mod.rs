//! Webhook listener.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::dispatch::TradeDispatcher;

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TradeDispatcher>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", post(handlers::webhook))
        .route("/health", get(handlers::health))
        .route("/trades/:id", get(handlers::trade_status))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors)
}

/// Serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind webhook listener on {}", addr))?;
    info!(address = %addr, "Webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Webhook server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::handlers::SERVICE_NAME;
    use crate::api::PaperGateway;
    use crate::trading::{TradeExecutor, TradingConfig};

    fn sample_body() -> Value {
        json!({
            "intent": "trade_decision",
            "trade": {
                "action": "open_limit",
                "symbol": "HYPE/USDT",
                "side": "long",
                "risk": { "risk_per_trade_pct": 0.4 },
                "limit_plan": {
                    "orders": [{ "price": 44.64, "size_pct": 100 }],
                    "stop_loss": 44.1336,
                    "take_profits": [
                        { "price": 45.1464, "size_pct": 30 },
                        { "price": 45.5516, "size_pct": 40 },
                        { "price": 45.9064, "size_pct": 30 }
                    ],
                    "cancel_if": { "timeout_min": 120 }
                }
            }
        })
    }

    fn setup_with(config: TradingConfig) -> (Arc<PaperGateway>, AppState) {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        let executor = Arc::new(TradeExecutor::new(gateway.clone(), config));
        let dispatcher = Arc::new(TradeDispatcher::start(executor, None));
        (gateway, AppState { dispatcher })
    }

    fn setup() -> (Arc<PaperGateway>, AppState) {
        setup_with(TradingConfig {
            settlement_delay_ms: 0,
            ..TradingConfig::default()
        })
    }

    fn post(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_valid_decision_is_accepted() {
        let (gateway, state) = setup();
        let app = create_router(state.clone());

        let response = app.oneshot(post(sample_body().to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["message"], "Trade decision received and queued for execution");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        // execution continues after the response
        for _ in 0..100 {
            if gateway.placed_orders().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(gateway.placed_orders().len(), 5);

        let status = create_router(state)
            .oneshot(Request::get(format!("/trades/{}", job_id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::OK);
        assert_eq!(json_body(status).await["symbol"], "HYPEUSDT");
    }

    #[tokio::test]
    async fn test_malformed_json_places_nothing() {
        let (gateway, state) = setup();

        let response = create_router(state).oneshot(post("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Invalid JSON format");
        assert_eq!(body["status_code"], 400);
        assert!(body["timestamp"].is_string());
        assert!(gateway.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let (_gateway, state) = setup();

        let response = create_router(state).oneshot(post(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "No content received");
    }

    #[tokio::test]
    async fn test_missing_risk_is_rejected() {
        let (gateway, state) = setup();
        let mut payload = sample_body();
        payload["trade"].as_object_mut().unwrap().remove("risk");

        let response = create_router(state).oneshot(post(payload.to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "Missing required field: risk");
        assert!(gateway.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_queue_unavailable_is_server_error() {
        let (_gateway, state) = setup_with(TradingConfig {
            workers: 0,
            queue_capacity: 1,
            ..TradingConfig::default()
        });

        let first = create_router(state.clone())
            .oneshot(post(sample_body().to_string()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = create_router(state)
            .oneshot(post(sample_body().to_string()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(second).await;
        assert_eq!(body["status_code"], 500);
        assert_eq!(
            body["message"],
            "Internal server error: Trade queue unavailable: queue is full"
        );
    }

    #[tokio::test]
    async fn test_health() {
        let (_gateway, state) = setup();

        let response = create_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
        assert_eq!(body["queued_jobs"], 0);
    }

    #[tokio::test]
    async fn test_unknown_job_and_route() {
        let (_gateway, state) = setup();

        let job = create_router(state.clone())
            .oneshot(
                Request::get(format!("/trades/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(job.status(), StatusCode::NOT_FOUND);

        let missing = create_router(state)
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(missing).await["error"], true);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let (_gateway, state) = setup();

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/")
                    .header("origin", "https://example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }
}
