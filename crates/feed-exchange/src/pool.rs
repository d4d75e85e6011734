//! 연결 풀 매니저.
//!
//! 살아있는 연결들의 컬렉션을 소유하고, 승인 예산을 강제하며,
//! 원하는 심볼 집합과 살아있는 집합을 조정합니다.
//!
//! 조정 순서는 고정입니다: 실패 회수 → 불필요 제거 → 신규 승인.
//! 실패했거나 더 이상 원하지 않는 연결이 항상 먼저 예산을 돌려준
//! 뒤에야 새 예산이 소비됩니다.

use crate::connection::{Connection, DEFAULT_CLOSE_TIMEOUT};
use crate::failures::FailureSet;
use crate::limits;
use crate::session::{ConnState, SessionFactory};
use feed_core::Symbol;
use feed_signal::ClassifierFactory;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// 구조적 변경(삽입/제거)이 단일 뮤텍스로 보호되는 풀 내부 상태.
#[derive(Debug)]
struct PoolInner {
    connections: HashMap<Symbol, Connection>,
    limit: usize,
}

/// 심볼 → 연결 맵과 승인 예산을 소유하는 매니저.
pub struct ConnectionPool {
    inner: Mutex<PoolInner>,
    failures: Arc<FailureSet>,
    factory: Arc<dyn SessionFactory>,
    classifiers: Arc<dyn ClassifierFactory>,
    next_id: AtomicU64,
    close_timeout: Duration,
}

impl ConnectionPool {
    /// 호스트 디스크립터 한도에서 예산을 유도하여 풀을 생성합니다.
    ///
    /// 예산 유도는 생성 시 한 번뿐인 외부 시스템 상호작용입니다.
    pub fn new(factory: Arc<dyn SessionFactory>, classifiers: Arc<dyn ClassifierFactory>) -> Self {
        let limit = limits::derive_connections_limit();
        Self::with_limit(factory, classifiers, limit)
    }

    /// 명시적 예산으로 풀을 생성합니다.
    pub fn with_limit(
        factory: Arc<dyn SessionFactory>,
        classifiers: Arc<dyn ClassifierFactory>,
        limit: usize,
    ) -> Self {
        info!(limit, "Connection pool created");
        Self {
            inner: Mutex::new(PoolInner {
                connections: HashMap::new(),
                limit,
            }),
            failures: Arc::new(FailureSet::new()),
            factory,
            classifiers,
            next_id: AtomicU64::new(0),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// 정상 종료 대기 상한을 설정합니다.
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// 사이클당 한 번 호출되는 조정 진입점.
    ///
    /// (a) 실패 집합을 비우며 보고된 연결을 강제 중지·제거하고,
    /// (b) 원하지 않는 심볼의 연결을 강제 중지·제거한 뒤,
    /// (c) 예산이 허용하는 동안 빠진 심볼을 승인합니다. 예산이
    /// 소진되면 이번 사이클의 추가 승인을 멈춥니다.
    pub fn update(&self, desired: &[Symbol]) {
        let mut inner = self.inner.lock().unwrap();

        // (a) 실패 보고 회수
        for symbol in self.failures.drain() {
            if let Some(conn) = inner.connections.remove(&symbol) {
                conn.stop();
                info!(%symbol, id = conn.id(), "Reclaimed failed connection");
            }
        }

        // (b) 현재 필터를 만족하지 않거나 이미 종단 상태(피어의 정상
        // 종료 포함)에 도달한 연결 제거. 종단 연결을 걷어내야 해당
        // 심볼이 다시 승인 대상이 된다.
        let desired_set: HashSet<&Symbol> = desired.iter().collect();
        let unwanted: Vec<Symbol> = inner
            .connections
            .iter()
            .filter(|(symbol, conn)| !desired_set.contains(*symbol) || conn.is_terminal())
            .map(|(symbol, _)| symbol.clone())
            .collect();
        for symbol in unwanted {
            if let Some(conn) = inner.connections.remove(&symbol) {
                conn.stop();
                info!(%symbol, id = conn.id(), "Stopped unwanted connection");
            }
        }

        // (c) 신규 승인. 맵에 엔트리를 커밋한 뒤에는 해당 연결의
        // 태스크만 세션 내부를 만진다. spawn은 I/O를 기다리지 않으므로
        // 락 보유 시간은 짧다.
        for symbol in desired {
            if inner.connections.contains_key(symbol) {
                // 핸드셰이크 중인 심볼도 장부상 살아있음: 그대로 둔다
                continue;
            }
            if inner.connections.len() >= inner.limit {
                warn!(
                    limit = inner.limit,
                    "Connection budget exhausted, no further admissions this cycle"
                );
                break;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let conn = Connection::spawn(
                symbol.clone(),
                id,
                Arc::clone(&self.factory),
                self.classifiers.create(symbol),
                Arc::clone(&self.failures),
                self.close_timeout,
            );
            info!(%symbol, id, "Admitted connection");
            inner.connections.insert(symbol.clone(), conn);
        }
    }

    /// 자원 압박 시 호출: 임의의 살아있는 연결을 최대 `by`개 강제
    /// 중지하고 예산을 `by`만큼 영구히 낮춥니다 (하한 0).
    pub fn reduce_capacity(&self, by: usize) {
        let mut inner = self.inner.lock().unwrap();

        let victims: Vec<Symbol> = inner.connections.keys().take(by).cloned().collect();
        for symbol in &victims {
            if let Some(conn) = inner.connections.remove(symbol) {
                conn.stop();
                info!(%symbol, id = conn.id(), "Stopped connection under resource pressure");
            }
        }

        inner.limit = inner.limit.saturating_sub(by);
        warn!(
            stopped = victims.len(),
            new_limit = inner.limit,
            "Reduced connection capacity"
        );
    }

    /// 실패 보고 집합. 연결 태스크들이 이 집합에 기록합니다.
    pub fn failures(&self) -> Arc<FailureSet> {
        Arc::clone(&self.failures)
    }

    /// 살아있는 연결 수.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().connections.len()
    }

    /// 풀이 비었는지 확인.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 현재 승인 예산.
    pub fn limit(&self) -> usize {
        self.inner.lock().unwrap().limit
    }

    /// 예산에 여유가 있는지 확인.
    pub fn can_admit(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connections.len() < inner.limit
    }

    /// 심볼이 살아있는지 확인.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.inner.lock().unwrap().connections.contains_key(symbol)
    }

    /// 살아있는 심볼 목록.
    pub fn live_symbols(&self) -> Vec<Symbol> {
        self.inner.lock().unwrap().connections.keys().cloned().collect()
    }

    /// 심볼의 연결 식별자.
    pub fn id_of(&self, symbol: &Symbol) -> Option<u64> {
        self.inner
            .lock()
            .unwrap()
            .connections
            .get(symbol)
            .map(Connection::id)
    }

    /// 심볼의 상태 관찰 채널.
    pub fn watch_state(&self, symbol: &Symbol) -> Option<watch::Receiver<ConnState>> {
        self.inner
            .lock()
            .unwrap()
            .connections
            .get(symbol)
            .map(Connection::state_receiver)
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("ConnectionPool")
            .field("live", &inner.connections.len())
            .field("limit", &inner.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedSessionFactory;
    use feed_signal::{Signal, TradeClassifier};

    struct NoopClassifier;

    impl TradeClassifier for NoopClassifier {
        fn on_message(&mut self, _payload: &str) -> Signal {
            Signal::Wait
        }
    }

    struct NoopFactory;

    impl ClassifierFactory for NoopFactory {
        fn create(&self, _symbol: &Symbol) -> Box<dyn TradeClassifier> {
            Box::new(NoopClassifier)
        }
    }

    fn pool_with_limit(limit: usize) -> ConnectionPool {
        ConnectionPool::with_limit(
            Arc::new(SimulatedSessionFactory::new()),
            Arc::new(NoopFactory),
            limit,
        )
    }

    #[tokio::test]
    async fn test_admission_respects_order_and_budget() {
        let pool = pool_with_limit(2);
        let desired: Vec<Symbol> = ["btcusdt", "ethusdt", "bnbusdt"]
            .iter()
            .map(Symbol::new)
            .collect();

        pool.update(&desired);

        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&Symbol::new("btcusdt")));
        assert!(pool.contains(&Symbol::new("ethusdt")));
        assert!(!pool.contains(&Symbol::new("bnbusdt")));
    }

    #[tokio::test]
    async fn test_update_is_reentrant_for_pending_symbols() {
        let pool = pool_with_limit(4);
        let desired = vec![Symbol::new("btcusdt")];

        pool.update(&desired);
        let first_id = pool.id_of(&Symbol::new("btcusdt"));

        // 수립이 끝나기 전에 다시 조정해도 기존 연결은 건드리지 않는다
        pool.update(&desired);
        assert_eq!(pool.id_of(&Symbol::new("btcusdt")), first_id);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_reduce_capacity_floors_at_zero() {
        let pool = pool_with_limit(2);
        pool.reduce_capacity(5);
        assert_eq!(pool.limit(), 0);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique_and_increasing() {
        let pool = pool_with_limit(8);
        pool.update(&[Symbol::new("a1usdt"), Symbol::new("b2usdt")]);

        let first = pool.id_of(&Symbol::new("a1usdt")).unwrap();
        let second = pool.id_of(&Symbol::new("b2usdt")).unwrap();
        assert_ne!(first, second);
    }
}
