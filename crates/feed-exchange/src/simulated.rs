//! 스크립트 기반 시뮬레이션 세션 팩토리.
//!
//! 네트워크 없이 풀과 연결 수명 주기를 구동하기 위한 도구입니다.
//! 테스트가 심볼별로 수립 실패를 예약하거나, 살아있는 세션에
//! 메시지/에러를 주입할 수 있습니다.

use crate::error::{SessionError, SessionResult};
use crate::session::{ConnState, MarketSession, SessionFactory};
use async_trait::async_trait;
use feed_core::Symbol;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

/// 시뮬레이션 팩토리.
///
/// 기본 동작: `open()`은 수립 단계를 즉시 통과하고, 주입된 항목이
/// 올 때까지 대기하는 세션을 반환합니다.
#[derive(Debug, Default)]
pub struct SimulatedSessionFactory {
    /// 다음 open()에서 소비되는 심볼별 수립 실패 예약
    fail_next_open: Mutex<HashMap<Symbol, SessionError>>,
    /// 살아있는 세션으로의 주입 채널
    feeds: Mutex<HashMap<Symbol, mpsc::UnboundedSender<SessionResult<String>>>>,
    /// 심볼별 성공한 open 횟수
    opens: Mutex<HashMap<Symbol, usize>>,
}

impl SimulatedSessionFactory {
    /// 새 팩토리 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 심볼의 다음 `open()`이 `error`로 실패하도록 예약합니다.
    pub fn fail_open(&self, symbol: &Symbol, error: SessionError) {
        self.fail_next_open
            .lock()
            .unwrap()
            .insert(symbol.clone(), error);
    }

    /// 살아있는 세션에 페이로드 또는 에러를 주입합니다.
    pub fn inject(&self, symbol: &Symbol, item: SessionResult<String>) {
        let feeds = self.feeds.lock().unwrap();
        let tx = feeds
            .get(symbol)
            .unwrap_or_else(|| panic!("no live simulated session for {}", symbol));
        let _ = tx.send(item);
    }

    /// 해당 심볼로 성공한 `open()` 횟수.
    pub fn open_count(&self, symbol: &Symbol) -> usize {
        self.opens.lock().unwrap().get(symbol).copied().unwrap_or(0)
    }

    /// 수립 에러가 발생했을 단계까지 상태를 진행시킨다.
    fn walk_states_to_failure(error: &SessionError, state: &watch::Sender<ConnState>) {
        let phases: &[ConnState] = match error {
            SessionError::Resolution(_) => &[ConnState::Resolving],
            SessionError::Transport(_) => &[ConnState::Resolving, ConnState::Connecting],
            SessionError::TlsHandshake(_) => &[
                ConnState::Resolving,
                ConnState::Connecting,
                ConnState::TlsHandshaking,
            ],
            _ => &[
                ConnState::Resolving,
                ConnState::Connecting,
                ConnState::TlsHandshaking,
                ConnState::ProtocolHandshaking,
            ],
        };
        for phase in phases {
            state.send_replace(*phase);
        }
    }
}

#[async_trait]
impl SessionFactory for SimulatedSessionFactory {
    async fn open(
        &self,
        symbol: &Symbol,
        state: &watch::Sender<ConnState>,
    ) -> SessionResult<Box<dyn MarketSession>> {
        if let Some(error) = self.fail_next_open.lock().unwrap().remove(symbol) {
            Self::walk_states_to_failure(&error, state);
            return Err(error);
        }

        for phase in [
            ConnState::Resolving,
            ConnState::Connecting,
            ConnState::TlsHandshaking,
            ConnState::ProtocolHandshaking,
        ] {
            state.send_replace(phase);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().insert(symbol.clone(), tx);
        *self.opens.lock().unwrap().entry(symbol.clone()).or_insert(0) += 1;

        Ok(Box::new(SimulatedSession { rx }))
    }
}

/// 주입 채널을 읽는 시뮬레이션 세션.
struct SimulatedSession {
    rx: mpsc::UnboundedReceiver<SessionResult<String>>,
}

#[async_trait]
impl MarketSession for SimulatedSession {
    async fn next_message(&mut self) -> SessionResult<String> {
        match self.rx.recv().await {
            Some(item) => item,
            // 팩토리가 교체되어 송신단이 닫힌 경우
            None => Err(SessionError::Read("simulated feed dropped".into())),
        }
    }

    async fn close(&mut self) -> SessionResult<()> {
        Ok(())
    }
}
