//! 드라이버 루프.
//!
//! 래치 신호마다 한 사이클을 수행합니다: 설정 파일과 카탈로그
//! 스냅샷을 다시 읽어 원하는 심볼 집합을 계산하고, 연결 풀을 그
//! 집합으로 조정합니다. 설정과 카탈로그는 매 사이클 새로 읽으므로
//! 재시작 없이 운영 중 변경이 반영됩니다.

use feed_core::{FeedConfig, Latch, Symbol};
use feed_exchange::{CatalogClient, ConnectionPool};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 래치 신호에 따라 풀을 조정하는 루프.
pub struct Driver {
    config_path: PathBuf,
    catalog: CatalogClient,
    pool: Arc<ConnectionPool>,
    latch: Arc<Latch>,
}

impl Driver {
    pub fn new(
        config_path: impl Into<PathBuf>,
        catalog: CatalogClient,
        pool: Arc<ConnectionPool>,
        latch: Arc<Latch>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            catalog,
            pool,
            latch,
        }
    }

    /// 취소될 때까지 래치 신호를 기다리며 사이클을 수행합니다.
    ///
    /// 신호 소비 직후 래치를 내리므로, 사이클 수행 중 도착한 새
    /// 신호는 다음 반복에서 처리됩니다.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Driver loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Driver loop stopped");
                    return;
                }
                _ = self.latch.wait() => {
                    self.latch.reset();
                    self.run_cycle();
                }
            }
        }
    }

    /// 단일 조정 사이클.
    ///
    /// 카탈로그 스냅샷을 읽을 수 없으면 이번 사이클을 건너뜁니다.
    /// 기존 연결들은 그대로 유지됩니다.
    pub fn run_cycle(&self) {
        let config = FeedConfig::load(&self.config_path);

        let catalog = match self.catalog.load_symbols() {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!(error = %e, "카탈로그를 읽을 수 없음, 이번 사이클 건너뜀");
                return;
            }
        };

        let desired = desired_symbols(&catalog, &config);
        info!(
            catalog = catalog.len(),
            desired = desired.len(),
            live = self.pool.len(),
            "Reconciliation cycle"
        );

        self.pool.update(&desired);
    }
}

/// 카탈로그와 설정에서 원하는 심볼 집합을 계산합니다.
///
/// allow-list(`securities`)가 비어 있지 않으면 그 목록에 포함된
/// 심볼만, 이후 부분 문자열 필터를 통과한 심볼만 남습니다.
/// 순서는 카탈로그 순서를 따릅니다.
fn desired_symbols(catalog: &[Symbol], config: &FeedConfig) -> Vec<Symbol> {
    catalog
        .iter()
        .filter(|symbol| config.securities.is_empty() || config.securities.contains(symbol))
        .filter(|symbol| symbol.matches_filter(&config.filter))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_exchange::simulated::SimulatedSessionFactory;
    use feed_exchange::SessionFactory;
    use feed_signal::{ClassifierFactory, Signal, TradeClassifier};
    use std::time::Duration;

    struct NoopClassifier;

    impl TradeClassifier for NoopClassifier {
        fn on_message(&mut self, _payload: &str) -> Signal {
            Signal::Wait
        }
    }

    struct NoopFactory;

    impl ClassifierFactory for NoopFactory {
        fn create(&self, _symbol: &Symbol) -> Box<dyn TradeClassifier> {
            Box::new(NoopClassifier)
        }
    }

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(Symbol::new).collect()
    }

    fn pool(limit: usize) -> Arc<ConnectionPool> {
        Arc::new(ConnectionPool::with_limit(
            Arc::new(SimulatedSessionFactory::new()) as Arc<dyn SessionFactory>,
            Arc::new(NoopFactory),
            limit,
        ))
    }

    const SNAPSHOT: &str = r#"{
        "symbols": [
            {"symbol": "BTCUSDT"},
            {"symbol": "ETHUSDT"},
            {"symbol": "BNBBTC"}
        ]
    }"#;

    #[test]
    fn test_desired_symbols_applies_allow_list_then_filter() {
        let catalog = symbols(&["btcusdt", "ethusdt", "bnbbtc"]);

        let config = FeedConfig {
            securities: symbols(&["btcusdt", "bnbbtc"]),
            timer: 30,
            filter: "usdt".into(),
        };
        assert_eq!(desired_symbols(&catalog, &config), symbols(&["btcusdt"]));

        let config = FeedConfig {
            securities: Vec::new(),
            timer: 30,
            filter: "usdt".into(),
        };
        assert_eq!(
            desired_symbols(&catalog, &config),
            symbols(&["btcusdt", "ethusdt"])
        );

        let config = FeedConfig::default();
        assert_eq!(desired_symbols(&catalog, &config), catalog);
    }

    #[tokio::test]
    async fn test_cycle_reconciles_pool_to_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let snapshot_path = dir.path().join("info.json");
        std::fs::write(&config_path, "[main]\nfilter = \"usdt\"\n").unwrap();
        std::fs::write(&snapshot_path, SNAPSHOT).unwrap();

        let pool = pool(8);
        let driver = Driver::new(
            &config_path,
            CatalogClient::with_base_url("http://unused", &snapshot_path),
            Arc::clone(&pool),
            Arc::new(Latch::new()),
        );

        driver.run_cycle();

        let mut live = pool.live_symbols();
        live.sort();
        assert_eq!(live, symbols(&["btcusdt", "ethusdt"]));
    }

    #[tokio::test]
    async fn test_missing_snapshot_skips_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "[main]\n").unwrap();

        let pool = pool(8);
        pool.update(&symbols(&["btcusdt"]));

        let driver = Driver::new(
            &config_path,
            CatalogClient::with_base_url("http://unused", dir.path().join("missing.json")),
            Arc::clone(&pool),
            Arc::new(Latch::new()),
        );

        driver.run_cycle();

        // 스냅샷이 없으면 기존 연결은 건드리지 않는다
        assert_eq!(pool.live_symbols(), symbols(&["btcusdt"]));
    }

    #[tokio::test]
    async fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_path = dir.path().join("info.json");
        std::fs::write(&snapshot_path, SNAPSHOT).unwrap();

        let pool = pool(8);
        let driver = Driver::new(
            dir.path().join("missing.toml"),
            CatalogClient::with_base_url("http://unused", &snapshot_path),
            Arc::clone(&pool),
            Arc::new(Latch::new()),
        );

        driver.run_cycle();

        // 기본 설정은 allow-list도 필터도 없다: 카탈로그 전체 구독
        assert_eq!(pool.len(), 3);
    }

    #[tokio::test]
    async fn test_run_consumes_latch_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let snapshot_path = dir.path().join("info.json");
        std::fs::write(&config_path, "[main]\nsecurities = [\"BTCUSDT\"]\n").unwrap();
        std::fs::write(&snapshot_path, SNAPSHOT).unwrap();

        let pool = pool(8);
        let latch = Arc::new(Latch::new());
        let cancel = CancellationToken::new();

        let driver = Driver::new(
            &config_path,
            CatalogClient::with_base_url("http://unused", &snapshot_path),
            Arc::clone(&pool),
            Arc::clone(&latch),
        );
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { driver.run(cancel).await })
        };

        latch.signal();
        tokio::time::timeout(Duration::from_secs(2), async {
            while pool.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cycle should run after signal");

        assert!(!latch.is_signaled(), "signal must be consumed");
        assert_eq!(pool.live_symbols(), symbols(&["btcusdt"]));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("driver should stop on cancel")
            .unwrap();
    }
}
