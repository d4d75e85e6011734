//! 피드 서비스 CLI.

use clap::{Parser, Subcommand};
use feed_core::{init_logging, FeedConfig, Latch, LogFormat};
use feed_exchange::{BinanceSessionFactory, CatalogClient, ConnectionPool};
use feed_service::{Driver, DownloadScheduler};
use feed_signal::SmaClassifierFactory;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "feed-service")]
#[command(about = "Binance market data feed pool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// 설정 파일 경로
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// 카탈로그 스냅샷 경로
    #[arg(long, default_value = "exchange_info.json")]
    snapshot: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 피드 서비스 실행 (스케줄러 + 드라이버)
    Run,

    /// 카탈로그 스냅샷을 한 번 내려받고 종료
    FetchCatalog,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    let catalog = CatalogClient::new(&cli.snapshot);

    match cli.command {
        Commands::FetchCatalog => {
            catalog.refresh().await?;
            let symbols = catalog.load_symbols()?;
            tracing::info!(symbols = symbols.len(), "카탈로그 다운로드 완료");
        }
        Commands::Run => {
            tracing::info!("=== Feed service 시작 ===");

            // 갱신 주기는 시작 시 한 번 읽어 고정한다. 설정의 나머지는
            // 드라이버가 사이클마다 다시 읽는다.
            let config = FeedConfig::load(&cli.config);
            let interval = config.timer_interval();

            let pool = Arc::new(ConnectionPool::new(
                Arc::new(BinanceSessionFactory::new()),
                Arc::new(SmaClassifierFactory),
            ));
            let latch = Arc::new(Latch::new());
            let cancel = CancellationToken::new();

            let scheduler = DownloadScheduler::new(
                catalog.clone(),
                Arc::clone(&pool),
                Arc::clone(&latch),
                interval,
            );
            let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));

            let driver = Driver::new(&cli.config, catalog, Arc::clone(&pool), latch);
            let driver_handle = {
                let cancel = cancel.clone();
                tokio::spawn(async move { driver.run(cancel).await })
            };

            tokio::signal::ctrl_c().await?;
            tracing::info!("종료 신호 수신, 피드 서비스 종료 중...");

            cancel.cancel();
            let _ = scheduler_handle.await;
            let _ = driver_handle.await;

            // 남은 연결을 모두 정리하고 종료
            pool.update(&[]);
            tracing::info!("=== Feed service 종료 ===");
        }
    }

    Ok(())
}
