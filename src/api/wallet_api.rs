// 钱包 API
// GET  /api/wallets?refresh=true
// GET  /api/wallet
// POST /api/wallet/connect
// POST /api/wallet/disconnect
// GET  /api/balances/:address

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::response::{success_response, success_response_with_message, ApiResponse},
    app_state::AppState,
    domain::{connection_state::ConnectionState, wallet_descriptor::WalletDescriptor},
    error::{AppError, ProviderError},
};

#[derive(Debug, Deserialize)]
pub struct ListWalletsQuery {
    /// 为 true 时先立即检测一轮
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub wallet_id: String,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub address: String,
    pub native: String,
    /// 当前钱包家族不支持代币余额时为 None
    pub token: Option<String>,
    pub token_symbol: String,
}

/// GET /api/wallets
///
/// 返回检测到的钱包列表（已去重）
pub async fn list_wallets(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListWalletsQuery>,
) -> Result<Json<ApiResponse<Vec<WalletDescriptor>>>, AppError> {
    let wallets = if q.refresh {
        st.wallet_service.detect_wallets()
    } else {
        st.wallet_service.wallets()
    };
    success_response(wallets)
}

/// GET /api/wallet
pub async fn connection_state(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ConnectionState>>, AppError> {
    success_response(st.wallet_service.connection_state().await)
}

/// POST /api/wallet/connect
///
/// 失败时连接状态保持为初始值
pub async fn connect_wallet(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ApiResponse<ConnectionState>>, AppError> {
    let wallet_id = req.wallet_id.trim().to_lowercase();
    if wallet_id.is_empty() {
        return Err(AppError::bad_request("wallet_id is required"));
    }

    // 在独立任务中完成连接，请求被取消不影响连接状态机
    let service = st.wallet_service.clone();
    let id = wallet_id.clone();
    let state = tokio::spawn(async move { service.connect_wallet(&id).await })
        .await
        .map_err(|e| AppError::internal(format!("connect task failed: {}", e)))??;

    success_response_with_message(state, format!("connected to {}", wallet_id))
}

/// POST /api/wallet/disconnect
pub async fn disconnect_wallet(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ConnectionState>>, AppError> {
    success_response(st.wallet_service.disconnect().await)
}

/// GET /api/balances/:address
///
/// 通过当前连接的钱包查询任意地址的余额
pub async fn get_balances(
    State(st): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<BalancesResponse>>, AppError> {
    let native = st.wallet_service.get_native_balance(&address).await?;

    let token = match st.wallet_service.get_token_balance(&address).await {
        Ok(balance) => Some(balance),
        Err(ProviderError::UnsupportedOperation(_)) => None,
        Err(e) => return Err(e.into()),
    };

    success_response(BalancesResponse {
        address,
        native,
        token,
        token_symbol: st.wallet_service.policy().asset.symbol().to_string(),
    })
}
