//! 세션 에러 타입.

use thiserror::Error;

/// 심볼 세션 하나에서 발생하는 에러.
///
/// 이 에러들은 풀 경계를 넘어 전파되지 않습니다. 연결 태스크가
/// `Failed` 상태와 실패 집합 기록으로 변환해 흡수합니다.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// DNS 이름 해석 실패
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// TCP 연결 실패
    #[error("Transport error: {0}")]
    Transport(String),

    /// TLS 핸드셰이크 실패
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// websocket 프로토콜 핸드셰이크 실패
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// 읽기 실패
    #[error("Read error: {0}")]
    Read(String),

    /// 피어의 정상 종료. 실패가 아닙니다
    #[error("Closed by peer")]
    ClosedByPeer,
}

/// 세션 작업을 위한 Result 타입.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// 정상 종료인지 확인. 정상 종료는 실패 집합에 기록되지 않습니다.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, SessionError::ClosedByPeer)
    }
}
