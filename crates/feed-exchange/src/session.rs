//! 심볼 세션 수립과 읽기 스트림.
//!
//! 연결 하나의 수명은 다음 상태 머신을 따릅니다:
//!
//! ```text
//! Resolving → Connecting → TlsHandshaking → ProtocolHandshaking
//!     → Reading ⟲ → (Closing →) Closed
//! ```
//!
//! 비종단 상태 어디서든 `Failed`로 빠질 수 있습니다. 상태는
//! `tokio::sync::watch` 채널로 게시되어 풀과 테스트가 태스크 내부를
//! 건드리지 않고 전이를 관찰할 수 있습니다.
//!
//! 수립 단계는 `SessionFactory` trait 뒤에 있습니다. 운영 구현은
//! [`BinanceSessionFactory`]이고, 테스트는 [`crate::simulated`]의
//! 스크립트 팩토리를 사용합니다.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use feed_core::Symbol;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_native_tls::TlsStream;
use tokio_tungstenite::{
    client_async, tungstenite::protocol::Message, tungstenite::Error as WsError, WebSocketStream,
};
use tracing::debug;

/// Binance websocket 스트림 호스트 기본값.
pub const DEFAULT_STREAM_HOST: &str = "stream.binance.com";

/// 스트림 포트 기본값.
pub const DEFAULT_STREAM_PORT: u16 = 443;

/// 연결 수명 주기 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// DNS 이름 해석 중
    Resolving,
    /// TCP 연결 중
    Connecting,
    /// TLS 핸드셰이크 중
    TlsHandshaking,
    /// websocket 핸드셰이크 중
    ProtocolHandshaking,
    /// 메시지 읽기 루프
    Reading,
    /// 정상 종료 핸드셰이크 진행 중
    Closing,
    /// 종단: 종료 완료, 풀이 회수 가능
    Closed,
    /// 종단: 에러로 중단, 실패 집합에 보고됨
    Failed,
}

impl ConnState {
    /// 종단 상태인지 확인.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnState::Closed | ConnState::Failed)
    }
}

/// 수립이 끝난 읽기 단계의 세션.
#[async_trait]
pub trait MarketSession: Send {
    /// 다음 텍스트 페이로드를 수신합니다.
    ///
    /// 피어의 정상 종료는 `Err(SessionError::ClosedByPeer)`로,
    /// 그 외 에러는 해당 변형으로 반환됩니다.
    async fn next_message(&mut self) -> SessionResult<String>;

    /// 정상 종료 핸드셰이크를 시도합니다.
    async fn close(&mut self) -> SessionResult<()>;
}

/// 심볼 세션을 수립하는 팩토리.
///
/// `open()`은 해석/연결/핸드셰이크 단계를 수행하며 각 단계 진입을
/// `state` 채널로 게시해야 합니다. 성공 시 읽기 단계 세션을
/// 반환합니다.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// 심볼용 세션을 수립합니다.
    async fn open(
        &self,
        symbol: &Symbol,
        state: &watch::Sender<ConnState>,
    ) -> SessionResult<Box<dyn MarketSession>>;
}

/// Binance aggTrade 스트림용 세션 팩토리.
#[derive(Debug, Clone)]
pub struct BinanceSessionFactory {
    host: String,
    port: u16,
}

impl Default for BinanceSessionFactory {
    fn default() -> Self {
        Self {
            host: DEFAULT_STREAM_HOST.to_string(),
            port: DEFAULT_STREAM_PORT,
        }
    }
}

impl BinanceSessionFactory {
    /// 기본 운영 엔드포인트용 팩토리 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 호스트/포트를 지정하여 생성.
    pub fn with_endpoint(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 심볼의 스트림 경로.
    fn stream_path(symbol: &Symbol) -> String {
        format!("/ws/{}@aggTrade", symbol)
    }
}

#[async_trait]
impl SessionFactory for BinanceSessionFactory {
    async fn open(
        &self,
        symbol: &Symbol,
        state: &watch::Sender<ConnState>,
    ) -> SessionResult<Box<dyn MarketSession>> {
        state.send_replace(ConnState::Resolving);
        let addrs: Vec<_> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| SessionError::Resolution(e.to_string()))?
            .collect();
        if addrs.is_empty() {
            return Err(SessionError::Resolution(format!(
                "no address for {}",
                self.host
            )));
        }

        state.send_replace(ConnState::Connecting);
        let mut tcp = None;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    tcp = Some(stream);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let tcp = tcp.ok_or_else(|| {
            SessionError::Transport(
                last_err.map(|e| e.to_string()).unwrap_or_else(|| "connect failed".into()),
            )
        })?;

        state.send_replace(ConnState::TlsHandshaking);
        let connector = native_tls::TlsConnector::new()
            .map_err(|e| SessionError::TlsHandshake(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls = connector
            .connect(&self.host, tcp)
            .await
            .map_err(|e| SessionError::TlsHandshake(e.to_string()))?;

        state.send_replace(ConnState::ProtocolHandshaking);
        let url = format!("wss://{}{}", self.host, Self::stream_path(symbol));
        let (ws, _response) = client_async(&url, tls)
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        debug!(%symbol, %url, "Websocket session established");
        Ok(Box::new(BinanceSession { ws }))
    }
}

/// 수립된 Binance websocket 세션.
struct BinanceSession {
    ws: WebSocketStream<TlsStream<TcpStream>>,
}

#[async_trait]
impl MarketSession for BinanceSession {
    async fn next_message(&mut self) -> SessionResult<String> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Ping(data))) => {
                    // tungstenite는 flush 시 pong을 보내지만 읽기 전용
                    // 루프에서는 명시적으로 응답한다
                    self.ws
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| SessionError::Read(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => return Err(SessionError::ClosedByPeer),
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed)) | Some(Err(WsError::AlreadyClosed)) => {
                    return Err(SessionError::ClosedByPeer)
                }
                Some(Err(e)) => return Err(SessionError::Read(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> SessionResult<()> {
        match self.ws.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(SessionError::Read(e.to_string())),
        }
    }
}
