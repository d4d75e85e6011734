//! # Feed Core
//!
//! 피드 풀 서비스의 핵심 도메인 타입과 공용 인프라를 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 구성 요소를 제공합니다:
//! - 심볼 타입 정의
//! - 서비스 설정 (config.toml)
//! - 에러 타입
//! - 로깅 인프라
//! - 단계 핸드오프용 Latch 프리미티브

pub mod config;
pub mod error;
pub mod latch;
pub mod logging;
pub mod symbol;

pub use config::FeedConfig;
pub use error::{FeedError, FeedResult};
pub use latch::Latch;
pub use logging::{init_logging, LogFormat};
pub use symbol::Symbol;
