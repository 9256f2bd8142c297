//! 余额对账
//!
//! 分发成功后等待结算延迟，再查询原生币与代币余额并写回连接状态。
//! 任务与连接绑定：断开时取消，连接纪元变化后的结果直接丢弃。
//! 对账失败只记录日志，从不改变已报告的分发结果。

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{
    domain::asset::Asset,
    error::ReconciliationError,
    metrics,
    service::connection_manager::{ActiveSession, ConnectionManager},
};

/// 一次对账取得的余额；单项查询失败时为 `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub native: Option<Decimal>,
    pub token: Option<Decimal>,
}

pub struct BalanceReconciler {
    connection: Arc<ConnectionManager>,
    asset: Asset,
    settlement_delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl BalanceReconciler {
    pub fn new(connection: Arc<ConnectionManager>, asset: Asset, settlement_delay: Duration) -> Self {
        Self {
            connection,
            asset,
            settlement_delay,
            pending: Mutex::new(None),
        }
    }

    /// 安排一次延迟对账；已有未完成的对账时先取消
    pub fn schedule(self: &Arc<Self>, session: ActiveSession) {
        let this = Arc::clone(self);
        let delay = self.settlement_delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match this.reconcile(&session).await {
                Ok(snapshot) => {
                    tracing::info!(
                        address = %session.address,
                        native = ?snapshot.native,
                        token = ?snapshot.token,
                        "Balances reconciled after distribution"
                    );
                }
                Err(ReconciliationError::Stale) => {
                    tracing::debug!(epoch = session.epoch, "Discarded stale balance reconciliation");
                }
                Err(e) => {
                    tracing::warn!(address = %session.address, error = %e, "Balance reconciliation failed");
                }
            }
        });

        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// 取消未完成的对账
    pub fn cancel(&self) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = pending.take() {
            if !handle.is_finished() {
                tracing::debug!("Cancelling pending balance reconciliation");
            }
            handle.abort();
        }
    }

    /// 立即查询并写回余额
    ///
    /// 两项查询都失败时返回 `Query`；连接已变化时返回 `Stale`，此时不写回任何值。
    pub async fn reconcile(&self, session: &ActiveSession) -> Result<BalanceSnapshot, ReconciliationError> {
        if !self.connection.is_current(session.epoch).await {
            metrics::inc_reconciliation_stale();
            return Err(ReconciliationError::Stale);
        }

        let native = session.adapter.get_native_balance(&session.address).await;
        let token = session
            .adapter
            .get_token_balance(&session.address, &self.asset)
            .await;

        let (native, token) = match (native, token) {
            (Err(e), Err(_)) => {
                metrics::inc_reconciliation_err();
                return Err(ReconciliationError::Query(e));
            }
            (native, token) => {
                if let Err(e) = &native {
                    tracing::warn!(address = %session.address, error = %e, "Native balance query failed");
                }
                if let Err(e) = &token {
                    tracing::warn!(
                        address = %session.address,
                        asset = %self.asset.symbol(),
                        error = %e,
                        "Token balance query failed"
                    );
                }
                (native.ok(), token.ok())
            }
        };

        if !self
            .connection
            .apply_balances(session.epoch, native, token)
            .await
        {
            metrics::inc_reconciliation_stale();
            return Err(ReconciliationError::Stale);
        }

        metrics::inc_reconciliation_ok();
        Ok(BalanceSnapshot { native, token })
    }
}
