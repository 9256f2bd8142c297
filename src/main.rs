//! splitpay 主入口
//! 钱包检测、连接与多收款方分发服务

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use splitpay::{api, app_state::AppState, config::Config, infrastructure::logging};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指向的文件优先）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;

    // 3. 初始化日志
    logging::init_logging(&config.logging)?;
    tracing::info!("Starting splitpay");

    config.validate()?;
    let policy = config.distribution.policy();
    if policy.recipients.is_empty() {
        tracing::warn!("No distribution recipients configured; execution will be rejected");
    } else {
        tracing::info!(
            recipients = policy.recipients.len(),
            total = %policy.total_amount(),
            asset = %policy.asset.symbol(),
            "Distribution policy loaded"
        );
    }

    // 4. 初始化应用状态
    let bind_addr = config.server.bind_addr.clone();
    let interval = Duration::from_secs(config.detection.interval_secs);
    let state = Arc::new(AppState::from_config(config)?);

    let initial = state.registry.refresh();
    tracing::info!(count = initial.len(), "Initial wallet detection completed");

    // 5. 启动后台钱包检测
    let registry = state.registry.clone();
    tokio::spawn(async move {
        registry.start_background_detection(interval).await;
    });

    // 6. 启动 HTTP 服务
    let app = api::routes(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
