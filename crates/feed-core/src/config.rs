//! 서비스 설정 관리.
//!
//! `config.toml`의 `[main]` 테이블에서 설정을 읽습니다:
//!
//! ```toml
//! [main]
//! securities = ["BTCUSDT", "ETHUSDT"]
//! timer = 30
//! filter = "usdt"
//! ```
//!
//! 파일이 없거나 손상된 경우 에러를 로깅하고 기본값을 사용합니다.
//! 설정 문제로 서비스가 중단되어서는 안 됩니다.

use crate::symbol::Symbol;
use crate::{FeedError, FeedResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::error;

/// 카탈로그 갱신 주기 기본값 (초).
const DEFAULT_TIMER_SECS: u64 = 30;

/// 피드 서비스 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// 허용 종목 목록. 비어 있으면 allow-list 없음 (filter만 적용)
    pub securities: Vec<Symbol>,
    /// 카탈로그 갱신 주기 (초)
    pub timer: u64,
    /// 부분 문자열 필터 (소문자)
    pub filter: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            securities: Vec::new(),
            timer: DEFAULT_TIMER_SECS,
            filter: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    main: MainSection,
}

#[derive(Debug, Default, Deserialize)]
struct MainSection {
    #[serde(default)]
    securities: Vec<Symbol>,
    timer: Option<u64>,
    filter: Option<String>,
}

impl FeedConfig {
    /// 설정 파일을 파싱합니다.
    pub fn from_toml_str(raw: &str) -> FeedResult<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        Ok(Self {
            securities: file.main.securities,
            timer: file.main.timer.unwrap_or(DEFAULT_TIMER_SECS),
            filter: file.main.filter.unwrap_or_default().to_lowercase(),
        })
    }

    /// 설정 파일을 로드합니다. 실패 시 에러를 로깅하고 기본값을 반환합니다.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "설정 로드 실패, 기본값 사용");
                Self::default()
            }
        }
    }

    /// 설정 파일을 로드합니다. 실패를 에러로 반환합니다.
    pub fn try_load(path: impl AsRef<Path>) -> FeedResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| FeedError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// 갱신 주기를 Duration으로 반환.
    pub fn timer_interval(&self) -> Duration {
        Duration::from_secs(self.timer)
    }
}
