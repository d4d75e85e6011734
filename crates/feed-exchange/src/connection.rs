//! 심볼 하나의 연결 핸들과 수명 주기 태스크.
//!
//! 풀은 심볼마다 [`Connection`] 핸들 하나를 소유합니다. 실제 I/O는
//! 분리된 tokio 태스크가 수행하며, 핸들은 상태 관찰(`watch`)과
//! 협조적 중지(`CancellationToken`)만 제공합니다. 삽입 이후 세션
//! 내부 상태를 만지는 것은 그 태스크뿐입니다.

use crate::error::SessionError;
use crate::failures::FailureSet;
use crate::session::{ConnState, SessionFactory};
use feed_core::Symbol;
use feed_signal::TradeClassifier;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 정상 종료 핸드셰이크 대기 상한 기본값.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// 살아있는 연결 하나의 핸들.
#[derive(Debug)]
pub struct Connection {
    symbol: Symbol,
    id: u64,
    state_rx: watch::Receiver<ConnState>,
    cancel: CancellationToken,
}

impl Connection {
    /// 연결 태스크를 띄우고 핸들을 반환합니다.
    ///
    /// 수립(해석→연결→핸드셰이크→읽기)은 전부 태스크 안에서
    /// 진행되므로 호출자는 블로킹되지 않습니다.
    pub(crate) fn spawn(
        symbol: Symbol,
        id: u64,
        factory: Arc<dyn SessionFactory>,
        classifier: Box<dyn TradeClassifier>,
        failures: Arc<FailureSet>,
        close_timeout: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnState::Resolving);
        let cancel = CancellationToken::new();

        let task_symbol = symbol.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            run(
                task_symbol,
                id,
                factory,
                classifier,
                failures,
                state_tx,
                task_cancel,
                close_timeout,
            )
            .await;
        });

        Self {
            symbol,
            id,
            state_rx,
            cancel,
        }
    }

    /// 연결된 심볼.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// 풀이 부여한 연결 식별자.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 현재 수명 주기 상태.
    pub fn state(&self) -> ConnState {
        *self.state_rx.borrow()
    }

    /// 종단 상태 여부.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// 상태 전이 관찰용 수신 채널.
    pub fn state_receiver(&self) -> watch::Receiver<ConnState> {
        self.state_rx.clone()
    }

    /// 협조적 중지를 요청합니다.
    ///
    /// 어느 스레드에서든 안전하며, 이미 종단 상태이거나 중복
    /// 호출이면 no-op입니다. 태스크는 정상 종료를 시도한 뒤
    /// `Closed`로 정착합니다.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// 연결 태스크 본체. 상태 머신을 끝까지 밀고 간다.
#[allow(clippy::too_many_arguments)]
async fn run(
    symbol: Symbol,
    id: u64,
    factory: Arc<dyn SessionFactory>,
    mut classifier: Box<dyn TradeClassifier>,
    failures: Arc<FailureSet>,
    state_tx: watch::Sender<ConnState>,
    cancel: CancellationToken,
    close_timeout: Duration,
) {
    // 수립 단계. 중지 요청이 오면 아직 회수할 전송 자원이 없으므로
    // 바로 Closed로 정착한다.
    let mut session = tokio::select! {
        _ = cancel.cancelled() => {
            info!(id, %symbol, "Connection stopped before establishment");
            state_tx.send_replace(ConnState::Closed);
            return;
        }
        opened = factory.open(&symbol, &state_tx) => match opened {
            Ok(session) => session,
            Err(e) => {
                fail(&symbol, id, &failures, &state_tx, &e);
                return;
            }
        }
    };

    state_tx.send_replace(ConnState::Reading);
    info!(id, %symbol, "Connection reading");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // 정상 종료 시도. 응답 없는 피어가 회수 경로를 붙잡지
                // 못하도록 대기 시간을 제한한다.
                state_tx.send_replace(ConnState::Closing);
                match tokio::time::timeout(close_timeout, session.close()).await {
                    Ok(Ok(())) => info!(id, %symbol, "Connection closed"),
                    Ok(Err(e)) => warn!(id, %symbol, error = %e, "Close handshake error"),
                    Err(_) => warn!(id, %symbol, "Close handshake timed out"),
                }
                state_tx.send_replace(ConnState::Closed);
                return;
            }
            message = session.next_message() => match message {
                Ok(payload) => {
                    // 역압: 다음 읽기는 분류가 끝난 뒤에야 발행된다
                    let signal = classifier.on_message(&payload);
                    debug!(id, %symbol, %signal, "Trade classified");
                }
                Err(SessionError::ClosedByPeer) => {
                    info!(id, %symbol, "Connection closed by peer");
                    state_tx.send_replace(ConnState::Closed);
                    return;
                }
                Err(e) => {
                    fail(&symbol, id, &failures, &state_tx, &e);
                    return;
                }
            }
        }
    }
}

/// 실패 처리: 심볼을 실패 집합에 한 번 기록하고 I/O를 멈춘다.
fn fail(
    symbol: &Symbol,
    id: u64,
    failures: &FailureSet,
    state_tx: &watch::Sender<ConnState>,
    error: &SessionError,
) {
    error!(id, %symbol, %error, "Connection failed, reporting symbol");
    failures.add(symbol.clone());
    state_tx.send_replace(ConnState::Failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedSessionFactory;
    use feed_signal::{Signal, TradeClassifier};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingClassifier(Arc<AtomicUsize>);

    impl TradeClassifier for CountingClassifier {
        fn on_message(&mut self, _payload: &str) -> Signal {
            self.0.fetch_add(1, Ordering::SeqCst);
            Signal::Wait
        }
    }

    fn spawn_with(
        factory: &Arc<SimulatedSessionFactory>,
        symbol: &Symbol,
        counter: Arc<AtomicUsize>,
    ) -> (Connection, Arc<FailureSet>) {
        let failures = Arc::new(FailureSet::new());
        let conn = Connection::spawn(
            symbol.clone(),
            1,
            Arc::clone(factory) as Arc<dyn SessionFactory>,
            Box::new(CountingClassifier(counter)),
            Arc::clone(&failures),
            Duration::from_millis(100),
        );
        (conn, failures)
    }

    async fn wait_for(conn: &Connection, target: ConnState) {
        let mut rx = conn.state_receiver();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| *s == target))
            .await
            .expect("state change timed out")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_healthy_connection_reaches_reading_and_forwards_messages() {
        let factory = Arc::new(SimulatedSessionFactory::new());
        let symbol = Symbol::new("btcusdt");
        let counter = Arc::new(AtomicUsize::new(0));
        let (conn, failures) = spawn_with(&factory, &symbol, Arc::clone(&counter));

        wait_for(&conn, ConnState::Reading).await;
        factory.inject(&symbol, Ok("{}".to_string()));
        factory.inject(&symbol, Ok("{}".to_string()));

        tokio::time::timeout(Duration::from_secs(1), async {
            while counter.load(Ordering::SeqCst) < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("messages should reach the classifier");

        assert!(failures.is_empty());
        conn.stop();
        wait_for(&conn, ConnState::Closed).await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let factory = Arc::new(SimulatedSessionFactory::new());
        let symbol = Symbol::new("ethusdt");
        let (conn, failures) = spawn_with(&factory, &symbol, Arc::new(AtomicUsize::new(0)));

        wait_for(&conn, ConnState::Reading).await;
        conn.stop();
        wait_for(&conn, ConnState::Closed).await;

        conn.stop();
        conn.stop();
        assert_eq!(conn.state(), ConnState::Closed);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_reports_symbol_once() {
        let factory = Arc::new(SimulatedSessionFactory::new());
        let symbol = Symbol::new("bnbusdt");
        factory.fail_open(&symbol, SessionError::Transport("refused".into()));
        let (conn, failures) = spawn_with(&factory, &symbol, Arc::new(AtomicUsize::new(0)));

        wait_for(&conn, ConnState::Failed).await;
        assert!(failures.contains(&symbol));
        assert_eq!(failures.len(), 1);

        // 종단 이후 stop은 no-op
        conn.stop();
        assert_eq!(conn.state(), ConnState::Failed);
    }

    #[tokio::test]
    async fn test_read_error_transitions_to_failed() {
        let factory = Arc::new(SimulatedSessionFactory::new());
        let symbol = Symbol::new("solusdt");
        let (conn, failures) = spawn_with(&factory, &symbol, Arc::new(AtomicUsize::new(0)));

        wait_for(&conn, ConnState::Reading).await;
        factory.inject(&symbol, Err(SessionError::Read("reset".into())));

        wait_for(&conn, ConnState::Failed).await;
        assert!(failures.contains(&symbol));
    }

    #[tokio::test]
    async fn test_clean_close_is_not_a_failure() {
        let factory = Arc::new(SimulatedSessionFactory::new());
        let symbol = Symbol::new("xrpusdt");
        let (conn, failures) = spawn_with(&factory, &symbol, Arc::new(AtomicUsize::new(0)));

        wait_for(&conn, ConnState::Reading).await;
        factory.inject(&symbol, Err(SessionError::ClosedByPeer));

        wait_for(&conn, ConnState::Closed).await;
        assert!(failures.is_empty());
    }
}
