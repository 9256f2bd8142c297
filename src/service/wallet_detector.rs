//! 钱包检测与注册表
//!
//! 周期性探测已知注入点与部署方声明的备用钱包，生成去重后的描述符列表。
//! 检测从不失败：没有钱包时列表为空。检测只写描述符列表，不触碰连接状态与交易状态。

use std::{str::FromStr, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{sync::watch, time::interval};

use crate::{
    domain::{
        provider::ProviderEnvironment,
        wallet_descriptor::WalletDescriptor,
        wallet_family::{WalletFamily, KNOWN_WALLETS},
    },
    metrics,
};

/// 备用钱包的默认图标
const DEFAULT_ICON: &str = "🔗";

/// 未安装钱包的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingWalletPolicy {
    /// 只列出已安装的钱包
    #[default]
    OmitMissing,
    /// 未安装的钱包也列出（`is_installed = false`）
    ListMissing,
}

impl FromStr for MissingWalletPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "omit_missing" | "omit" => Ok(Self::OmitMissing),
            "list_missing" | "list" => Ok(Self::ListMissing),
            other => Err(format!("unknown missing wallet policy: {}", other)),
        }
    }
}

/// 部署方声明的备用钱包
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredWallet {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub family: WalletFamily,
    pub injection_point: String,
    #[serde(default)]
    pub marker: Option<String>,
}

impl DeclaredWallet {
    /// 未指定 id 时取小写去空白的名称
    pub fn resolved_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| {
            self.name
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase()
        })
    }

    pub fn resolved_icon(&self) -> String {
        self.icon.clone().unwrap_or_else(|| DEFAULT_ICON.to_string())
    }
}

pub struct WalletDetector {
    environment: Arc<dyn ProviderEnvironment>,
    declared: Vec<DeclaredWallet>,
    policy: MissingWalletPolicy,
}

impl WalletDetector {
    pub fn new(
        environment: Arc<dyn ProviderEnvironment>,
        declared: Vec<DeclaredWallet>,
        policy: MissingWalletPolicy,
    ) -> Self {
        Self {
            environment,
            declared,
            policy,
        }
    }

    /// 执行一轮检测
    pub fn detect(&self) -> Vec<WalletDescriptor> {
        let mut found = Vec::with_capacity(KNOWN_WALLETS.len() + self.declared.len());

        for known in KNOWN_WALLETS {
            let probed = self
                .environment
                .probe(known.injection_point)
                .filter(|p| known.marker.map_or(true, |m| p.has_marker(m)));

            found.push(match probed {
                Some(provider) => WalletDescriptor::installed(
                    known.id,
                    known.name,
                    known.icon,
                    known.family,
                    known.injection_point,
                    &provider,
                    true,
                ),
                None => WalletDescriptor::missing(
                    known.id,
                    known.name,
                    known.icon,
                    known.family,
                    known.injection_point,
                ),
            });
        }

        for declared in &self.declared {
            let probed = self
                .environment
                .probe(&declared.injection_point)
                .filter(|p| declared.marker.as_deref().map_or(true, |m| p.has_marker(m)));

            found.push(match probed {
                Some(provider) => WalletDescriptor::installed(
                    declared.resolved_id(),
                    declared.name.clone(),
                    declared.resolved_icon(),
                    declared.family,
                    declared.injection_point.clone(),
                    &provider,
                    false,
                ),
                None => WalletDescriptor::missing(
                    declared.resolved_id(),
                    declared.name.clone(),
                    declared.resolved_icon(),
                    declared.family,
                    declared.injection_point.clone(),
                ),
            });
        }

        if self.policy == MissingWalletPolicy::OmitMissing {
            found.retain(|d| d.is_installed);
        }

        dedupe(found)
    }
}

/// 去重优先级：精确匹配的已安装钱包 > 其他已安装 > 未安装
fn rank(descriptor: &WalletDescriptor) -> u8 {
    descriptor.is_installed as u8 + descriptor.exact_match as u8
}

/// 名称模糊匹配去重；保留先出现的条目，除非后来者优先级更高。结果保持首次出现的位置。
pub fn dedupe(descriptors: Vec<WalletDescriptor>) -> Vec<WalletDescriptor> {
    let mut kept: Vec<WalletDescriptor> = Vec::with_capacity(descriptors.len());

    for candidate in descriptors {
        match kept.iter_mut().find(|k| k.fuzzy_matches(&candidate.name)) {
            Some(existing) => {
                if rank(&candidate) > rank(existing) {
                    *existing = candidate;
                }
            }
            None => kept.push(candidate),
        }
    }

    kept
}

/// 钱包注册表：保存最近一轮检测结果并推送变化
pub struct WalletRegistry {
    detector: WalletDetector,
    sender: watch::Sender<Vec<WalletDescriptor>>,
}

impl WalletRegistry {
    pub fn new(detector: WalletDetector) -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self { detector, sender }
    }

    /// 最近一轮检测结果
    pub fn current(&self) -> Vec<WalletDescriptor> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<WalletDescriptor>> {
        self.sender.subscribe()
    }

    /// 立即检测一轮；列表有变化时通知订阅者
    pub fn refresh(&self) -> Vec<WalletDescriptor> {
        let detected = self.detector.detect();

        let changed = self.sender.send_if_modified(|current| {
            if *current == detected {
                false
            } else {
                *current = detected.clone();
                true
            }
        });

        metrics::observe_detection(detected.len(), changed);
        if changed {
            let ids: Vec<&str> = detected.iter().map(|d| d.id.as_str()).collect();
            tracing::info!(count = detected.len(), wallets = ?ids, "Wallet list changed");
        }

        detected
    }

    pub fn find(&self, wallet_id: &str) -> Option<WalletDescriptor> {
        self.sender
            .borrow()
            .iter()
            .find(|d| d.id == wallet_id)
            .cloned()
    }

    /// 后台周期检测
    pub async fn start_background_detection(self: Arc<Self>, period: Duration) {
        let mut ticker = interval(period);

        tracing::info!(
            "Wallet detection started, interval={}ms",
            period.as_millis()
        );

        loop {
            ticker.tick().await;
            self.refresh();
        }
    }
}
