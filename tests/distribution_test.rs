//! 分发编排集成测试
//!
//! 严格顺序、失败即停、不回滚；成功后延迟对账

mod common;

use std::time::Duration;

use common::*;
use rust_decimal::Decimal;
use serde_json::json;
use splitpay::{
    domain::{
        distribution::Recipient,
        transaction_status::{StepStatus, TransactionStatus},
    },
    error::DistributionError,
};

fn tx_hash(n: u64) -> String {
    format!("0x{:064x}", n)
}

fn statuses(steps: &[splitpay::domain::distribution::DistributionStep]) -> Vec<StepStatus> {
    steps.iter().map(|s| s.status).collect()
}

#[tokio::test]
async fn test_all_steps_succeed_in_order() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;

    let result = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap();

    // 整体哈希取最后一步
    assert_eq!(result.hash, tx_hash(3));
    assert_eq!(
        statuses(&result.steps),
        vec![StepStatus::Confirmed, StepStatus::Confirmed, StepStatus::Confirmed]
    );

    let sent = wallet.calls_to("eth_sendTransaction");
    assert_eq!(sent.len(), 3);
    for (params, recipient) in sent.iter().zip([RECIPIENT_A, RECIPIENT_B, RECIPIENT_C]) {
        let tx = &params[0];
        assert_eq!(tx["from"], json!(ACCOUNT));
        assert_eq!(tx["to"], json!(USDT_CONTRACT));
        let data = tx["data"].as_str().unwrap();
        // transfer(address,uint256) 选择器 + 收款地址
        assert!(data.starts_with("0xa9059cbb"));
        assert!(data.contains(recipient.trim_start_matches("0x")));
    }

    let state = app.state.wallet_service.transaction_state().await;
    assert_eq!(state.status, TransactionStatus::Success);
    assert!(!state.is_processing);
    assert_eq!(state.error, None);
    assert_eq!(state.hash.as_deref(), Some(tx_hash(3).as_str()));
    assert_eq!(state.attempt_id, Some(result.attempt_id));
}

#[tokio::test]
async fn test_rejection_stops_remaining_steps() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;

    wallet.queue_transfer(Ok(json!(tx_hash(7))));
    wallet.queue_transfer(Err(user_rejected()));

    let err = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap_err();

    assert!(matches!(err, DistributionError::UserRejected { index: 1, .. }));
    let outcome = err.outcome().unwrap();
    assert_eq!(
        statuses(&outcome.steps),
        vec![StepStatus::Confirmed, StepStatus::Failed, StepStatus::Pending]
    );

    // 第三步从未提交
    assert_eq!(wallet.calls_to("eth_sendTransaction").len(), 2);

    let state = app.state.wallet_service.transaction_state().await;
    assert_eq!(state.status, TransactionStatus::Error);
    assert_eq!(state.error.as_deref(), Some("UserRejected"));
    assert!(!state.is_processing);
    // 部分已发生：哈希指向已确认的第一步
    assert_eq!(state.hash.as_deref(), Some(tx_hash(7).as_str()));
    assert!(state.steps[1]
        .error
        .as_deref()
        .unwrap()
        .contains("User denied transaction signature"));
}

#[tokio::test]
async fn test_first_step_rejection_means_nothing_happened() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;
    wallet.queue_transfer(Err(user_rejected()));

    let err = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap_err();

    assert_eq!(err.failed_index(), Some(0));
    let state = app.state.wallet_service.transaction_state().await;
    assert_eq!(state.hash, None);
    assert_eq!(state.count(StepStatus::Confirmed), 0);
    assert_eq!(state.count(StepStatus::Pending), 2);
}

#[tokio::test]
async fn test_resume_skips_confirmed_steps() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;

    wallet.queue_transfer(Ok(json!(tx_hash(100))));
    wallet.queue_transfer(Err(user_rejected()));
    let err = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap_err();
    let attempt_id = err.outcome().unwrap().attempt_id;

    let result = app
        .state
        .wallet_service
        .resume_distribution()
        .await
        .unwrap();

    assert_eq!(result.attempt_id, attempt_id.unwrap());
    assert_eq!(result.steps[0].step_hash.as_deref(), Some(tx_hash(100).as_str()));
    assert_eq!(
        statuses(&result.steps),
        vec![StepStatus::Confirmed, StepStatus::Confirmed, StepStatus::Confirmed]
    );

    // 首轮 2 次提交，续传只补 B、C
    let sent = wallet.calls_to("eth_sendTransaction");
    assert_eq!(sent.len(), 4);
    assert!(sent[2][0]["data"]
        .as_str()
        .unwrap()
        .contains(RECIPIENT_B.trim_start_matches("0x")));
    assert_eq!(result.hash, tx_hash(2));

    // 成功后没有可续传的内容
    let err = app
        .state
        .wallet_service
        .resume_distribution()
        .await
        .unwrap_err();
    assert_eq!(err, DistributionError::NothingToResume);
}

#[tokio::test]
async fn test_resume_after_reconnect_is_rejected() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;
    wallet.queue_transfer(Err(user_rejected()));
    app.state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap_err();

    app.state.wallet_service.disconnect().await;
    app.connect_metamask().await;

    let err = app
        .state
        .wallet_service
        .resume_distribution()
        .await
        .unwrap_err();
    assert_eq!(err, DistributionError::NothingToResume);
}

#[tokio::test]
async fn test_requires_connection() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));

    let err = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap_err();

    assert_eq!(err, DistributionError::NotConnected);
    assert!(wallet.calls_to("eth_sendTransaction").is_empty());
}

#[tokio::test]
async fn test_invalid_recipients_are_rejected_before_sending() {
    let (app, wallet) = TestApp::with_metamask(test_config(Vec::new()));
    app.connect_metamask().await;

    let err = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap_err();
    assert!(matches!(err, DistributionError::InvalidRecipients(_)));

    let bad = vec![
        Recipient::new(RECIPIENT_A, Decimal::new(1, 1)),
        Recipient::new("not-an-address", Decimal::new(1, 1)),
    ];
    let err = app
        .state
        .wallet_service
        .execute_distribution_to(&bad)
        .await
        .unwrap_err();
    assert!(matches!(err, DistributionError::InvalidRecipients(_)));

    let zero = vec![Recipient::new(RECIPIENT_A, Decimal::ZERO)];
    let err = app
        .state
        .wallet_service
        .execute_distribution_to(&zero)
        .await
        .unwrap_err();
    assert!(matches!(err, DistributionError::InvalidRecipients(_)));

    assert!(wallet.calls_to("eth_sendTransaction").is_empty());
    assert_eq!(
        app.state.wallet_service.transaction_state().await.status,
        TransactionStatus::Idle
    );
}

#[tokio::test]
async fn test_concurrent_distribution_is_rejected() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;
    wallet.delay("eth_sendTransaction", Duration::from_millis(40));

    let service = app.state.wallet_service.clone();
    let first = tokio::spawn(async move { service.execute_distribution().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(app.state.wallet_service.transaction_state().await.is_processing);
    let err = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap_err();
    assert_eq!(err, DistributionError::AlreadyProcessing);

    assert!(first.await.unwrap().is_ok());
    assert_eq!(wallet.calls_to("eth_sendTransaction").len(), 3);
}

#[tokio::test]
async fn test_disconnect_mid_distribution_fails_next_step() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;
    wallet.delay("eth_sendTransaction", Duration::from_millis(60));

    let service = app.state.wallet_service.clone();
    let running = tokio::spawn(async move { service.execute_distribution().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    app.state.wallet_service.disconnect().await;

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, DistributionError::StepFailed { index: 1, .. }));

    let state = app.state.wallet_service.transaction_state().await;
    assert_eq!(state.error.as_deref(), Some("ProviderUnavailable"));
    assert_eq!(
        statuses(&state.steps),
        vec![StepStatus::Confirmed, StepStatus::Failed, StepStatus::Pending]
    );
    assert_eq!(wallet.calls_to("eth_sendTransaction").len(), 1);
}

#[tokio::test]
async fn test_dropped_distribution_does_not_block_later_attempts() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;
    wallet.delay("eth_sendTransaction", Duration::from_millis(50));

    // 调用方在第一笔转账途中放弃等待
    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        app.state.wallet_service.execute_distribution(),
    )
    .await;
    assert!(timed_out.is_err());

    let state = app.state.wallet_service.transaction_state().await;
    assert!(!state.is_processing);
    assert_eq!(state.status, TransactionStatus::Error);
    assert_eq!(state.error.as_deref(), Some("ProviderUnavailable"));
    assert_eq!(
        statuses(&state.steps),
        vec![StepStatus::Failed, StepStatus::Pending, StepStatus::Pending]
    );
    assert_eq!(state.hash, None);

    wallet.delay("eth_sendTransaction", Duration::ZERO);
    let result = app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap();
    assert_eq!(result.steps.len(), 3);
}

#[tokio::test]
async fn test_disconnect_clears_dropped_distribution() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;
    wallet.delay("eth_sendTransaction", Duration::from_millis(50));

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        app.state.wallet_service.execute_distribution(),
    )
    .await;
    assert!(timed_out.is_err());

    app.state.wallet_service.disconnect().await;
    let state = app.state.wallet_service.transaction_state().await;
    assert!(!state.is_processing);
    assert_eq!(state.status, TransactionStatus::Idle);

    app.connect_metamask().await;
    wallet.delay("eth_sendTransaction", Duration::ZERO);
    assert!(app
        .state
        .wallet_service
        .execute_distribution()
        .await
        .is_ok());
}

#[tokio::test]
async fn test_balances_reconciled_after_settlement() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;

    wallet.respond("eth_call", Ok(json!(abi_word(99_700_000_000_000_000_000))));
    wallet.respond("eth_getBalance", Ok(json!("0x6f05b59d3b20000")));

    app.state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap();

    // 结算延迟之前余额不变
    let state = app.state.wallet_service.connection_state().await;
    assert_eq!(state.token_balance, "100.00");

    settle().await;

    let state = app.state.wallet_service.connection_state().await;
    assert_eq!(state.token_balance, "99.70");
    assert_eq!(state.native_balance, "0.50");
}

#[tokio::test]
async fn test_reconciliation_failure_keeps_success() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;

    wallet.forget("eth_call");
    wallet.forget("eth_getBalance");

    app.state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap();
    settle().await;

    let tx = app.state.wallet_service.transaction_state().await;
    assert_eq!(tx.status, TransactionStatus::Success);

    // 保留连接时拉取的余额
    let state = app.state.wallet_service.connection_state().await;
    assert_eq!(state.native_balance, "1.00");
    assert_eq!(state.token_balance, "100.00");
}

#[tokio::test]
async fn test_disconnect_discards_pending_reconciliation() {
    let (app, wallet) = TestApp::with_metamask(test_config(three_recipients()));
    app.connect_metamask().await;
    wallet.respond("eth_call", Ok(json!(abi_word(1))));

    app.state
        .wallet_service
        .execute_distribution()
        .await
        .unwrap();
    app.state.wallet_service.disconnect().await;
    settle().await;

    let state = app.state.wallet_service.connection_state().await;
    assert!(!state.is_connected);
    assert_eq!(state.token_balance, "0.00");
    assert_eq!(
        app.state.wallet_service.transaction_state().await.status,
        TransactionStatus::Idle
    );
}
