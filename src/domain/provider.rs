//! 提供者能力契约
//!
//! 执行环境注入的钱包对象被抽象为 [`InjectedProvider`]：一个按方法名转发请求的不透明句柄。
//! 核心从不持有提供者内部状态，描述符与适配器只保存弱引用。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 提供者原始错误（尚未归一化）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderRpcError {
    /// 提供者返回的错误对象（EIP-1193 / JSON-RPC 错误码）
    #[error("provider error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// 注入对象没有暴露该方法
    #[error("provider does not expose method {0}")]
    MethodMissing(String),

    /// 与提供者通信失败
    #[error("provider transport failure: {0}")]
    Transport(String),
}

/// 环境注入的钱包提供者
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    /// 是否暴露指定的标记字段（如 `isMetaMask`）
    fn has_marker(&self, marker: &str) -> bool;

    /// 发起请求；可能触发钱包自身的确认界面
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;
}

/// 执行环境：按注入路径探测提供者
pub trait ProviderEnvironment: Send + Sync {
    fn probe(&self, injection_point: &str) -> Option<Arc<dyn InjectedProvider>>;
}
