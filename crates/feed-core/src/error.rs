//! 피드 서비스의 공용 에러 타입.

use thiserror::Error;

/// 핵심 피드 에러.
///
/// 연결 단위 에러는 이 타입으로 전파되지 않습니다. 연결 에러는
/// 해당 연결 태스크 안에서 `Failed` 상태로 흡수됩니다.
#[derive(Debug, Error)]
pub enum FeedError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 카탈로그 스냅샷 없음/손상 (이번 사이클 갱신 생략)
    #[error("카탈로그 사용 불가: {0}")]
    CatalogUnavailable(String),

    /// 카탈로그 다운로드 에러
    #[error("카탈로그 다운로드 에러: {0}")]
    Download(String),

    /// 파싱/역직렬화 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 파일 I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// 피드 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// 이번 사이클만 건너뛰고 다음 사이클에 자가 회복되는 에러인지 확인.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::CatalogUnavailable(_) | FeedError::Download(_)
        )
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for FeedError {
    fn from(err: toml::de::Error) -> Self {
        FeedError::Config(err.to_string())
    }
}
