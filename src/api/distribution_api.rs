// 分发 API
// GET  /api/distribution
// GET  /api/distribution/policy
// POST /api/distribution
// POST /api/distribution/resume

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::{
    api::response::{failure_response, success_response, ApiResponse},
    app_state::AppState,
    domain::distribution::{DistributionPolicy, Recipient, TransactionResult, TransactionState},
    error::{AppError, DistributionError},
};

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    /// 未提供时使用配置的分发策略
    #[serde(default)]
    pub recipients: Option<Vec<Recipient>>,
}

/// GET /api/distribution
pub async fn transaction_state(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<TransactionState>>, AppError> {
    success_response(st.wallet_service.transaction_state().await)
}

/// GET /api/distribution/policy
pub async fn distribution_policy(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<DistributionPolicy>>, AppError> {
    success_response(st.wallet_service.policy().clone())
}

/// POST /api/distribution
///
/// 顺序执行全部转账。某步失败时返回错误以及完整的步骤状态，
/// 调用方据此区分"什么都没发生"与"部分已发生"。
pub async fn execute_distribution(
    State(st): State<Arc<AppState>>,
    body: Option<Json<ExecuteRequest>>,
) -> Response {
    let recipients = body.and_then(|Json(req)| req.recipients);
    let service = st.wallet_service.clone();

    // 分发在独立任务中运行：HTTP 请求被取消时也会走完当前步骤并落定状态
    let joined = tokio::spawn(async move {
        match recipients {
            Some(recipients) => service.execute_distribution_to(&recipients).await,
            None => service.execute_distribution().await,
        }
    })
    .await;

    into_response(joined)
}

/// POST /api/distribution/resume
///
/// 只重新提交失败步骤及其后的步骤，已确认的转账不会重发
pub async fn resume_distribution(State(st): State<Arc<AppState>>) -> Response {
    let service = st.wallet_service.clone();
    let joined = tokio::spawn(async move { service.resume_distribution().await }).await;
    into_response(joined)
}

fn into_response(
    joined: Result<Result<TransactionResult, DistributionError>, tokio::task::JoinError>,
) -> Response {
    match joined {
        Ok(Ok(result)) => Json(ApiResponse::success(result)).into_response(),
        Ok(Err(err)) => match err.outcome().cloned() {
            Some(outcome) => failure_response(AppError::from(err), outcome),
            None => AppError::from(err).into_response(),
        },
        Err(e) => {
            tracing::error!(error = %e, "Distribution task aborted");
            AppError::internal(format!("distribution task failed: {}", e)).into_response()
        }
    }
}
