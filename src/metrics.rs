use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    // 钱包检测
    detection_scans: u64,
    detection_changes: u64,
    wallets_detected: u64,
    // 连接
    connect_attempts: HashMap<String, u64>,
    connect_failures: HashMap<&'static str, u64>,
    disconnects: u64,
    // 分发
    steps_confirmed: u64,
    steps_failed: HashMap<&'static str, u64>,
    distributions_succeeded: u64,
    distributions_failed: u64,
    // 余额对账
    reconciliation_ok: u64,
    reconciliation_err: u64,
    reconciliation_stale: u64,
}

fn state() -> MutexGuard<'static, MetricsState> {
    let lock = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn observe_detection(wallet_count: usize, changed: bool) {
    let mut s = state();
    s.detection_scans += 1;
    s.wallets_detected = wallet_count as u64;
    if changed {
        s.detection_changes += 1;
    }
}

pub fn inc_connect_attempt(wallet_id: &str) {
    let mut s = state();
    *s.connect_attempts.entry(wallet_id.to_string()).or_insert(0) += 1;
}

pub fn inc_connect_failure(kind: &'static str) {
    *state().connect_failures.entry(kind).or_insert(0) += 1;
}

pub fn inc_disconnect() {
    state().disconnects += 1;
}

pub fn inc_step_confirmed() {
    state().steps_confirmed += 1;
}

pub fn inc_step_failed(kind: &'static str) {
    *state().steps_failed.entry(kind).or_insert(0) += 1;
}

pub fn inc_distribution(success: bool) {
    let mut s = state();
    if success {
        s.distributions_succeeded += 1;
    } else {
        s.distributions_failed += 1;
    }
}

pub fn inc_reconciliation_ok() {
    state().reconciliation_ok += 1;
}

pub fn inc_reconciliation_err() {
    state().reconciliation_err += 1;
}

pub fn inc_reconciliation_stale() {
    state().reconciliation_stale += 1;
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();

    out.push_str("# HELP splitpay_detection_scans_total Wallet detection scans\n");
    out.push_str("# TYPE splitpay_detection_scans_total counter\n");
    out.push_str(&format!("splitpay_detection_scans_total {}\n", s.detection_scans));

    out.push_str("# HELP splitpay_detection_changes_total Scans that changed the wallet list\n");
    out.push_str("# TYPE splitpay_detection_changes_total counter\n");
    out.push_str(&format!(
        "splitpay_detection_changes_total {}\n",
        s.detection_changes
    ));

    out.push_str("# HELP splitpay_wallets_detected Wallets in the latest scan\n");
    out.push_str("# TYPE splitpay_wallets_detected gauge\n");
    out.push_str(&format!("splitpay_wallets_detected {}\n", s.wallets_detected));

    out.push_str("# HELP splitpay_connect_attempts_total Connection attempts per wallet\n");
    out.push_str("# TYPE splitpay_connect_attempts_total counter\n");
    for (k, v) in s.connect_attempts.iter() {
        out.push_str(&format!(
            "splitpay_connect_attempts_total{{wallet=\"{}\"}} {}\n",
            k, v
        ));
    }

    out.push_str("# HELP splitpay_connect_failures_total Connection failures per reason\n");
    out.push_str("# TYPE splitpay_connect_failures_total counter\n");
    for (k, v) in s.connect_failures.iter() {
        out.push_str(&format!(
            "splitpay_connect_failures_total{{reason=\"{}\"}} {}\n",
            k, v
        ));
    }

    out.push_str("# HELP splitpay_disconnects_total Disconnects\n");
    out.push_str("# TYPE splitpay_disconnects_total counter\n");
    out.push_str(&format!("splitpay_disconnects_total {}\n", s.disconnects));

    out.push_str("# HELP splitpay_steps_total Distribution steps by outcome\n");
    out.push_str("# TYPE splitpay_steps_total counter\n");
    out.push_str(&format!(
        "splitpay_steps_total{{result=\"confirmed\"}} {}\n",
        s.steps_confirmed
    ));
    for (k, v) in s.steps_failed.iter() {
        out.push_str(&format!(
            "splitpay_steps_total{{result=\"failed\",reason=\"{}\"}} {}\n",
            k, v
        ));
    }

    out.push_str("# HELP splitpay_distributions_total Distributions by outcome\n");
    out.push_str("# TYPE splitpay_distributions_total counter\n");
    out.push_str(&format!(
        "splitpay_distributions_total{{result=\"success\"}} {}\n",
        s.distributions_succeeded
    ));
    out.push_str(&format!(
        "splitpay_distributions_total{{result=\"error\"}} {}\n",
        s.distributions_failed
    ));

    out.push_str("# HELP splitpay_reconciliations_total Balance reconciliations by outcome\n");
    out.push_str("# TYPE splitpay_reconciliations_total counter\n");
    out.push_str(&format!(
        "splitpay_reconciliations_total{{result=\"ok\"}} {}\n",
        s.reconciliation_ok
    ));
    out.push_str(&format!(
        "splitpay_reconciliations_total{{result=\"err\"}} {}\n",
        s.reconciliation_err
    ));
    out.push_str(&format!(
        "splitpay_reconciliations_total{{result=\"stale\"}} {}\n",
        s.reconciliation_stale
    ));

    out
}
