use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderValue},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Level;
use uuid::Uuid;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
};

pub mod distribution_api;
pub mod response; // 统一响应格式
pub mod wallet_api;

#[derive(Debug, Serialize)]
pub struct Healthz {
    pub status: &'static str,
    pub wallets_detected: usize,
    pub connected: bool,
    pub processing: bool,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        // 钱包
        .route("/api/wallets", get(wallet_api::list_wallets))
        .route("/api/wallet", get(wallet_api::connection_state))
        .route("/api/wallet/connect", post(wallet_api::connect_wallet))
        .route("/api/wallet/disconnect", post(wallet_api::disconnect_wallet))
        .route("/api/balances/:address", get(wallet_api::get_balances))
        // 分发
        .route(
            "/api/distribution",
            get(distribution_api::transaction_state).post(distribution_api::execute_distribution),
        )
        .route(
            "/api/distribution/policy",
            get(distribution_api::distribution_policy),
        )
        .route(
            "/api/distribution/resume",
            post(distribution_api::resume_distribution),
        )
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(set_request_id))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(from_fn(add_response_time_header))
                .layer(from_fn(trace_log)),
        )
        .with_state(state)
}

async fn healthz(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Healthz>>, AppError> {
    let connection = st.wallet_service.connection_state().await;
    let transaction = st.wallet_service.transaction_state().await;

    success_response(Healthz {
        status: "ok",
        wallets_detected: st.registry.current().len(),
        connected: connection.is_connected,
        processing: transaction.is_processing,
    })
}

async fn metrics() -> Response {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render_prometheus(),
    )
        .into_response()
}

async fn set_request_id(mut req: Request, next: axum::middleware::Next) -> Response {
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = HeaderValue::from_str(&req_id).unwrap_or(HeaderValue::from_static("gen-failed"));
    req.headers_mut().insert("x-request-id", header.clone());

    let mut resp = next.run(req).await;
    resp.headers_mut().insert("x-request-id", header);
    resp
}

async fn add_response_time_header(req: Request, next: axum::middleware::Next) -> Response {
    let start = Instant::now();
    let mut resp = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis().to_string();
    resp.headers_mut().insert(
        "x-response-time",
        HeaderValue::from_str(&format!("{}ms", elapsed_ms))
            .unwrap_or(HeaderValue::from_static("0ms")),
    );
    resp
}

async fn trace_log(req: Request, next: axum::middleware::Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let resp = next.run(req).await;
    let status = resp.status();
    let elapsed = start.elapsed().as_millis();
    tracing::event!(Level::INFO, request_id=%req_id, method=%method, path=%path, status=%status.as_u16(), elapsed_ms=%elapsed, "http_request");
    resp
}
