//! 종목 카탈로그 클라이언트.
//!
//! Binance `exchangeInfo`를 내려받아 디스크 스냅샷으로 보관하고,
//! 스냅샷에서 심볼 목록을 파싱합니다. 스냅샷 교체는 임시 파일에
//! 쓴 뒤 rename하므로 부분 쓰기가 읽는 쪽에 보이지 않습니다.

use feed_core::{FeedError, FeedResult, Symbol};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Binance REST API 기본 URL.
pub const DEFAULT_API_BASE: &str = "https://api.binance.com";

/// exchangeInfo 경로.
const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";

/// 카탈로그 다운로드 에러.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP 요청 실패
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 스냅샷 쓰기 실패
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// 디스크립터 고갈류의 자원 압박으로 보이는지 확인.
    ///
    /// 이 경우 호출자는 연결 예산을 줄여 디스크립터를 회수할 수
    /// 있습니다.
    pub fn is_resource_pressure(&self) -> bool {
        match self {
            CatalogError::Http(e) => e.is_connect(),
            CatalogError::Io(_) => false,
        }
    }
}

/// exchangeInfo 응답에서 필요한 부분.
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Deserialize)]
struct SymbolEntry {
    symbol: Symbol,
}

/// 카탈로그 다운로드/스냅샷 클라이언트.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    snapshot_path: PathBuf,
}

impl CatalogClient {
    /// 운영 엔드포인트용 클라이언트 생성.
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self::with_base_url(DEFAULT_API_BASE, snapshot_path)
    }

    /// 기본 URL을 지정하여 생성.
    pub fn with_base_url(base_url: impl Into<String>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    /// 스냅샷 파일 경로.
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// 카탈로그를 내려받아 스냅샷을 원자적으로 교체합니다.
    ///
    /// 틱마다 독립된 세션 하나가 이 호출을 수행합니다.
    pub async fn refresh(&self) -> Result<(), CatalogError> {
        let url = format!("{}{}", self.base_url, EXCHANGE_INFO_PATH);
        info!(%url, "Fetching exchange info");

        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body = response.bytes().await?;

        let tmp_path = self.snapshot_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &body).await?;
        tokio::fs::rename(&tmp_path, &self.snapshot_path).await?;

        info!(
            path = %self.snapshot_path.display(),
            bytes = body.len(),
            "Catalog snapshot replaced"
        );
        Ok(())
    }

    /// 스냅샷에서 심볼 목록을 읽습니다.
    ///
    /// 파일이 없거나 손상된 경우 `CatalogUnavailable`을 반환하며,
    /// 호출자는 이번 사이클 갱신을 건너뜁니다.
    pub fn load_symbols(&self) -> FeedResult<Vec<Symbol>> {
        Self::load_symbols_from(&self.snapshot_path)
    }

    /// 임의 경로의 스냅샷에서 심볼 목록을 읽습니다.
    pub fn load_symbols_from(path: impl AsRef<Path>) -> FeedResult<Vec<Symbol>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FeedError::CatalogUnavailable(format!("{}: {}", path.display(), e)))?;
        let info: ExchangeInfo = serde_json::from_str(&raw)
            .map_err(|e| FeedError::CatalogUnavailable(format!("{}: {}", path.display(), e)))?;

        Ok(info.symbols.into_iter().map(|entry| entry.symbol).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "timezone": "UTC",
        "symbols": [
            {"symbol": "BTCUSDT", "status": "TRADING"},
            {"symbol": "ETHUSDT", "status": "TRADING"},
            {"symbol": "BNBBTC", "status": "TRADING"}
        ]
    }"#;

    #[test]
    fn test_load_symbols_lowercases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_info.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let symbols = CatalogClient::load_symbols_from(&path).unwrap();
        assert_eq!(
            symbols,
            vec![
                Symbol::new("btcusdt"),
                Symbol::new("ethusdt"),
                Symbol::new("bnbbtc"),
            ]
        );
    }

    #[test]
    fn test_missing_snapshot_is_unavailable() {
        let result = CatalogClient::load_symbols_from("/nonexistent/exchange_info.json");
        assert!(matches!(result, Err(FeedError::CatalogUnavailable(_))));
    }

    #[test]
    fn test_malformed_snapshot_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_info.json");
        std::fs::write(&path, "{\"symbols\": \"oops\"}").unwrap();

        let result = CatalogClient::load_symbols_from(&path);
        assert!(matches!(result, Err(FeedError::CatalogUnavailable(_))));
    }

    #[tokio::test]
    async fn test_refresh_writes_snapshot_atomically() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/exchangeInfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SNAPSHOT)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_info.json");
        // 교체 전의 낡은 스냅샷
        std::fs::write(&path, "{\"symbols\": []}").unwrap();

        let client = CatalogClient::with_base_url(server.url(), &path);
        client.refresh().await.unwrap();

        mock.assert_async().await;
        let symbols = client.load_symbols().unwrap();
        assert_eq!(symbols.len(), 3);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_refresh_http_error_leaves_snapshot_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/exchangeInfo")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_info.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let client = CatalogClient::with_base_url(server.url(), &path);
        assert!(client.refresh().await.is_err());

        // 기존 스냅샷은 그대로
        assert_eq!(client.load_symbols().unwrap().len(), 3);
    }
}
