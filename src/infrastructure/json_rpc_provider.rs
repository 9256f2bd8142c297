//! JSON-RPC 钱包提供者
//!
//! 把 EIP-1193 风格的 `request` 转发到 JSON-RPC 端点（例如持有已解锁账户的本地节点）。

use std::{
    collections::HashSet,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::ProviderEndpointConfig,
    domain::provider::{InjectedProvider, ProviderRpcError},
};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct JsonRpcProvider {
    http_client: reqwest::Client,
    rpc_url: String,
    markers: HashSet<String>,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(config: &ProviderEndpointConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            rpc_url: config.rpc_url.clone(),
            markers: config.markers.iter().cloned().collect(),
            next_id: AtomicU64::new(1),
        })
    }

    fn parse_response(body: &str) -> Result<Value, ProviderRpcError> {
        let response: RpcResponse = serde_json::from_str(body)
            .map_err(|e| ProviderRpcError::Transport(format!("invalid JSON-RPC response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(ProviderRpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl InjectedProvider for JsonRpcProvider {
    fn has_marker(&self, marker: &str) -> bool {
        self.markers.contains(marker)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let params = if params.is_null() {
            Value::Array(Vec::new())
        } else {
            params
        };
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        tracing::debug!(rpc_url = %self.rpc_url, method = %method, id = id, "Forwarding provider request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderRpcError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderRpcError::Transport(e.to_string()))?;

        // 部分节点在 HTTP 错误状态下仍返回 JSON-RPC 错误对象
        if !status.is_success() {
            return match Self::parse_response(&body) {
                Err(rpc @ ProviderRpcError::Rpc { .. }) => Err(rpc),
                _ => Err(ProviderRpcError::Transport(format!(
                    "RPC request failed with status {}: {}",
                    status, body
                ))),
            };
        }

        Self::parse_response(&body)
    }
}
