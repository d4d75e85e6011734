//! 카탈로그 다운로드 스케줄러.
//!
//! 고정 주기로 종목 카탈로그 스냅샷을 갱신하고, 성공할 때마다
//! 래치를 올려 드라이버에게 새 스냅샷이 준비되었음을 알립니다.
//! 다운로드 실패는 서비스를 멈추지 않습니다: 에러를 로깅하고 다음
//! 틱을 기다리되, 디스크립터 고갈류의 자원 압박으로 보이는 실패는
//! 연결 풀 용량을 줄여 디스크립터를 회수합니다.

use feed_core::Latch;
use feed_exchange::{CatalogClient, ConnectionPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 자원 압박 시 한 번에 회수하는 연결 수.
const RESOURCE_PRESSURE_STEP: usize = 100;

/// 주기적 카탈로그 갱신 태스크.
pub struct DownloadScheduler {
    catalog: CatalogClient,
    pool: Arc<ConnectionPool>,
    latch: Arc<Latch>,
    interval: Duration,
}

impl DownloadScheduler {
    /// 스케줄러를 생성합니다. 주기는 시작 시 한 번 읽은 설정값으로
    /// 고정됩니다.
    pub fn new(
        catalog: CatalogClient,
        pool: Arc<ConnectionPool>,
        latch: Arc<Latch>,
        interval: Duration,
    ) -> Self {
        Self {
            catalog,
            pool,
            latch,
            interval,
        }
    }

    /// 취소될 때까지 주기적으로 갱신을 수행합니다.
    ///
    /// 첫 틱은 즉시 발화하므로 서비스 기동 직후에 스냅샷이 준비됩니다.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Download scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Download scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.refresh_once().await;
                }
            }
        }
    }

    /// 한 번의 갱신 시도.
    pub async fn refresh_once(&self) {
        match self.catalog.refresh().await {
            Ok(()) => {
                self.latch.signal();
            }
            Err(e) if e.is_resource_pressure() => {
                error!(error = %e, "카탈로그 다운로드 실패 (자원 압박), 연결 용량 축소");
                self.pool.reduce_capacity(RESOURCE_PRESSURE_STEP);
            }
            Err(e) => {
                // 낡은 스냅샷은 그대로 유효하다. 다음 틱에 재시도.
                error!(error = %e, "카탈로그 다운로드 실패, 다음 주기에 재시도");
            }
        }
    }
}
