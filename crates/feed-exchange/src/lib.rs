//! # Feed Exchange
//!
//! Binance 시장 데이터 수집의 핵심: 심볼별 websocket 세션 상태 머신,
//! 연결 풀 매니저, 실패 보고 집합, 그리고 종목 카탈로그 클라이언트를
//! 제공합니다.
//!
//! 풀은 원하는 심볼 집합과 살아있는 연결 집합을 사이클마다 조정하며,
//! 호스트 디스크립터 한도에서 유도한 예산을 초과하지 않습니다.

pub mod catalog;
pub mod connection;
pub mod error;
pub mod failures;
pub mod limits;
pub mod pool;
pub mod session;
pub mod simulated;

pub use catalog::{CatalogClient, CatalogError};
pub use connection::Connection;
pub use error::{SessionError, SessionResult};
pub use failures::FailureSet;
pub use pool::ConnectionPool;
pub use session::{BinanceSessionFactory, ConnState, MarketSession, SessionFactory};
