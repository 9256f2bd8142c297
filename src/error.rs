use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::distribution::TransactionState;

// ============ 领域错误 ============

/// 适配器边界归一化后的提供者错误
///
/// 各家族的原始错误码只在适配器内解释一次，之后不再重新解析。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("user rejected the request: {0}")]
    UserRejected(String),

    #[error("operation not supported by this wallet: {0}")]
    UnsupportedOperation(String),

    #[error("wallet is on the wrong network: {0}")]
    NetworkMismatch(String),

    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl ProviderError {
    /// 错误类别名（写入 TransactionState.error）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserRejected(_) => "UserRejected",
            Self::UnsupportedOperation(_) => "UnsupportedOperation",
            Self::NetworkMismatch(_) => "NetworkMismatch",
            Self::ProviderUnavailable(_) => "ProviderUnavailable",
        }
    }

    /// 提供者原始消息
    pub fn message(&self) -> &str {
        match self {
            Self::UserRejected(m)
            | Self::UnsupportedOperation(m)
            | Self::NetworkMismatch(m)
            | Self::ProviderUnavailable(m) => m,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("user rejected the connection: {0}")]
    UserRejected(String),

    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("wallet is on the wrong network: {0}")]
    NetworkMismatch(String),

    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("already connected to {0}; disconnect first")]
    AlreadyConnected(String),

    #[error("unknown wallet: {0}")]
    UnknownWallet(String),

    #[error("connection aborted by disconnect")]
    Aborted,
}

impl From<ProviderError> for ConnectError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UserRejected(m) => Self::UserRejected(m),
            ProviderError::NetworkMismatch(m) => Self::NetworkMismatch(m),
            // 钱包缺少连接能力时视为不可用
            ProviderError::UnsupportedOperation(m) | ProviderError::ProviderUnavailable(m) => {
                Self::ProviderUnavailable(m)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributionError {
    #[error("no wallet connected")]
    NotConnected,

    #[error("a distribution is already processing")]
    AlreadyProcessing,

    #[error("invalid recipients: {0}")]
    InvalidRecipients(String),

    #[error("step {index} rejected by user: {reason}")]
    UserRejected {
        index: usize,
        reason: ProviderError,
        outcome: Box<TransactionState>,
    },

    #[error("step {index} failed: {reason}")]
    StepFailed {
        index: usize,
        reason: ProviderError,
        outcome: Box<TransactionState>,
    },

    #[error("no failed distribution to resume")]
    NothingToResume,
}

impl DistributionError {
    /// 构造步骤失败错误；用户拒绝单独归类
    pub fn step(index: usize, reason: ProviderError, outcome: TransactionState) -> Self {
        let outcome = Box::new(outcome);
        if reason.is_user_rejection() {
            Self::UserRejected {
                index,
                reason,
                outcome,
            }
        } else {
            Self::StepFailed {
                index,
                reason,
                outcome,
            }
        }
    }

    /// 失败时的完整状态快照（区分"未发生"与"部分发生"）
    pub fn outcome(&self) -> Option<&TransactionState> {
        match self {
            Self::UserRejected { outcome, .. } | Self::StepFailed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn failed_index(&self) -> Option<usize> {
        match self {
            Self::UserRejected { index, .. } | Self::StepFailed { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// 余额对账错误（只记录日志，不影响分发结果）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconciliationError {
    #[error("connection changed before balances could be applied")]
    Stale,

    #[error("balance query failed: {0}")]
    Query(ProviderError),
}

// ============ HTTP 错误 ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    NotFound,
    Conflict,
    Internal,

    // 业务错误码
    WalletNotFound,
    WalletNotConnected,
    AlreadyConnected,
    ConnectionInProgress,
    ConnectionAborted,
    UserRejected,
    UnsupportedOperation,
    NetworkMismatch,
    ProviderUnavailable,
    InvalidRecipients,
    DistributionInProgress,
    TransactionFailed,
    NothingToResume,
    ValidationFailed,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            // HTTP 基础错误码
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",

            // 业务错误码
            Self::WalletNotFound => "wallet_not_found",
            Self::WalletNotConnected => "wallet_not_connected",
            Self::AlreadyConnected => "already_connected",
            Self::ConnectionInProgress => "connection_in_progress",
            Self::ConnectionAborted => "connection_aborted",
            Self::UserRejected => "user_rejected",
            Self::UnsupportedOperation => "unsupported_operation",
            Self::NetworkMismatch => "network_mismatch",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::InvalidRecipients => "invalid_recipients",
            Self::DistributionInProgress => "distribution_in_progress",
            Self::TransactionFailed => "transaction_failed",
            Self::NothingToResume => "nothing_to_resume",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl AppError {
    pub fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Conflict, StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    // 业务错误辅助函数
    pub fn wallet_not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::WalletNotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::ValidationFailed, StatusCode::UNPROCESSABLE_ENTITY, msg)
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::UserRejected(_) => {
                Self::new(AppErrorCode::UserRejected, StatusCode::FORBIDDEN, message)
            }
            ProviderError::UnsupportedOperation(_) => Self::new(
                AppErrorCode::UnsupportedOperation,
                StatusCode::NOT_IMPLEMENTED,
                message,
            ),
            ProviderError::NetworkMismatch(_) => {
                Self::new(AppErrorCode::NetworkMismatch, StatusCode::CONFLICT, message)
            }
            ProviderError::ProviderUnavailable(_) => Self::new(
                AppErrorCode::ProviderUnavailable,
                StatusCode::SERVICE_UNAVAILABLE,
                message,
            ),
        }
    }
}

impl From<ConnectError> for AppError {
    fn from(err: ConnectError) -> Self {
        let message = err.to_string();
        let (code, status) = match err {
            ConnectError::UserRejected(_) => (AppErrorCode::UserRejected, StatusCode::FORBIDDEN),
            ConnectError::ProviderUnavailable(_) => (
                AppErrorCode::ProviderUnavailable,
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            ConnectError::NetworkMismatch(_) => {
                (AppErrorCode::NetworkMismatch, StatusCode::CONFLICT)
            }
            ConnectError::AlreadyConnecting => {
                (AppErrorCode::ConnectionInProgress, StatusCode::CONFLICT)
            }
            ConnectError::AlreadyConnected(_) => {
                (AppErrorCode::AlreadyConnected, StatusCode::CONFLICT)
            }
            ConnectError::UnknownWallet(_) => (AppErrorCode::WalletNotFound, StatusCode::NOT_FOUND),
            ConnectError::Aborted => (AppErrorCode::ConnectionAborted, StatusCode::CONFLICT),
        };
        Self::new(code, status, message)
    }
}

impl From<DistributionError> for AppError {
    fn from(err: DistributionError) -> Self {
        let message = err.to_string();
        let (code, status) = match err {
            DistributionError::NotConnected => {
                (AppErrorCode::WalletNotConnected, StatusCode::PRECONDITION_FAILED)
            }
            DistributionError::AlreadyProcessing => {
                (AppErrorCode::DistributionInProgress, StatusCode::CONFLICT)
            }
            DistributionError::InvalidRecipients(_) => {
                (AppErrorCode::InvalidRecipients, StatusCode::BAD_REQUEST)
            }
            DistributionError::UserRejected { .. } => {
                (AppErrorCode::UserRejected, StatusCode::FORBIDDEN)
            }
            DistributionError::StepFailed { .. } => {
                (AppErrorCode::TransactionFailed, StatusCode::BAD_GATEWAY)
            }
            DistributionError::NothingToResume => {
                (AppErrorCode::NothingToResume, StatusCode::CONFLICT)
            }
        };
        Self::new(code, status, message)
    }
}

// From 实现，用于 ? 操作符
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::bad_request(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
