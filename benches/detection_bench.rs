//! 钱包检测基准测试
//! 使用criterion进行性能测试

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::Value;
use splitpay::{
    domain::{
        provider::{InjectedProvider, ProviderRpcError},
        wallet_descriptor::WalletDescriptor,
        wallet_family::WalletFamily,
    },
    infrastructure::environment::InjectedEnvironment,
    metrics,
    service::wallet_detector::{dedupe, DeclaredWallet, MissingWalletPolicy, WalletDetector},
};

struct AnyMarker;

#[async_trait]
impl InjectedProvider for AnyMarker {
    fn has_marker(&self, _marker: &str) -> bool {
        true
    }

    async fn request(&self, _method: &str, _params: Value) -> Result<Value, ProviderRpcError> {
        Ok(Value::Null)
    }
}

fn declared(count: usize) -> Vec<DeclaredWallet> {
    (0..count)
        .map(|i| DeclaredWallet {
            id: None,
            name: format!("Wallet {}", i),
            icon: None,
            family: WalletFamily::Evm,
            injection_point: format!("wallet{}", i),
            marker: None,
        })
        .collect()
}

fn bench_detect(c: &mut Criterion) {
    let environment = Arc::new(InjectedEnvironment::new());
    for point in ["ethereum", "phantom.solana", "XverseProviders.BitcoinProvider"] {
        environment.install(point, Arc::new(AnyMarker));
    }
    let detector = WalletDetector::new(environment, declared(20), MissingWalletPolicy::ListMissing);

    c.bench_function("detect_wallets", |b| b.iter(|| black_box(detector.detect())));
}

fn bench_dedupe(c: &mut Criterion) {
    let provider: Arc<dyn InjectedProvider> = Arc::new(AnyMarker);
    let descriptors: Vec<WalletDescriptor> = (0..50)
        .map(|i| {
            WalletDescriptor::installed(
                format!("w{}", i),
                format!("Wallet {}", i % 10),
                "🔗",
                WalletFamily::Evm,
                "ethereum",
                &provider,
                i % 2 == 0,
            )
        })
        .collect();

    c.bench_function("dedupe_wallets", |b| {
        b.iter(|| black_box(dedupe(descriptors.clone())))
    });
}

fn bench_metrics_rendering(c: &mut Criterion) {
    c.bench_function("render_prometheus_metrics", |b| {
        b.iter(|| {
            metrics::observe_detection(3, false);
            metrics::inc_step_confirmed();
            black_box(metrics::render_prometheus())
        })
    });
}

criterion_group!(benches, bench_detect, bench_dedupe, bench_metrics_rendering);
criterion_main!(benches);
