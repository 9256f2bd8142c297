//! 钱包描述符
//!
//! 每轮检测重新生成，生成后不可变；下一轮检测的结果整体替换上一轮。

use std::sync::{Arc, Weak};

use serde::Serialize;

use crate::domain::{provider::InjectedProvider, wallet_family::WalletFamily};

#[derive(Debug, Clone, Serialize)]
pub struct WalletDescriptor {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub family: WalletFamily,
    pub injection_point: String,
    pub is_installed: bool,
    /// 注入点存在且标记字段精确匹配（去重时优先保留）
    #[serde(skip)]
    pub exact_match: bool,
    #[serde(skip)]
    handle: Option<Weak<dyn InjectedProvider>>,
}

impl WalletDescriptor {
    /// 已安装的钱包
    pub fn installed(
        id: impl Into<String>,
        name: impl Into<String>,
        icon: impl Into<String>,
        family: WalletFamily,
        injection_point: impl Into<String>,
        provider: &Arc<dyn InjectedProvider>,
        exact_match: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            family,
            injection_point: injection_point.into(),
            is_installed: true,
            exact_match,
            handle: Some(Arc::downgrade(provider)),
        }
    }

    /// 未安装的钱包（仅用于提示安装）
    pub fn missing(
        id: impl Into<String>,
        name: impl Into<String>,
        icon: impl Into<String>,
        family: WalletFamily,
        injection_point: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            family,
            injection_point: injection_point.into(),
            is_installed: false,
            exact_match: false,
            handle: None,
        }
    }

    /// 能力句柄的弱引用；提供者已被环境移除时返回 `None`
    pub fn handle(&self) -> Option<Weak<dyn InjectedProvider>> {
        self.handle.clone()
    }

    /// 名称模糊匹配：忽略大小写，任一方包含另一方
    pub fn fuzzy_matches(&self, other_name: &str) -> bool {
        let mine = self.name.to_lowercase();
        let theirs = other_name.to_lowercase();
        mine.contains(&theirs) || theirs.contains(&mine)
    }
}

impl PartialEq for WalletDescriptor {
    fn eq(&self, other: &Self) -> bool {
        let same_handle = match (&self.handle, &other.handle) {
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };

        self.id == other.id
            && self.name == other.name
            && self.icon == other.icon
            && self.family == other.family
            && self.injection_point == other.injection_point
            && self.is_installed == other.is_installed
            && self.exact_match == other.exact_match
            && same_handle
    }
}
