//! splitpay - 浏览器钱包检测、连接与多收款方分发
//!
//! 非托管模式：所有签名都由用户钱包完成，服务只编排请求并记录结果

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{
            Asset, ConnectionState, Recipient, TransactionState, WalletDescriptor, WalletFamily,
        },
        error::{AppError, AppErrorCode, ConnectError, DistributionError, ProviderError},
        service::WalletService,
    };
}
