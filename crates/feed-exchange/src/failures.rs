//! 실패한 연결의 심볼을 모으는 공유 집합.
//!
//! 어느 연결 태스크든 실패 시 자신의 심볼을 추가합니다. 소비는
//! 조정(reconciliation) 단계가 독점하며, `drain()`으로 한 번에
//! 가져가 비웁니다.

use feed_core::Symbol;
use std::collections::HashSet;
use std::sync::Mutex;

/// 실패 보고 집합. 모든 연산은 단일 내부 락으로 상호 배제됩니다.
#[derive(Debug, Default)]
pub struct FailureSet {
    symbols: Mutex<HashSet<Symbol>>,
}

impl FailureSet {
    /// 빈 집합 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼 추가. 멱등입니다.
    pub fn add(&self, symbol: Symbol) {
        self.symbols.lock().unwrap().insert(symbol);
    }

    /// 심볼 제거.
    pub fn remove(&self, symbol: &Symbol) {
        self.symbols.lock().unwrap().remove(symbol);
    }

    /// 포함 여부 확인.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.lock().unwrap().contains(symbol)
    }

    /// 모든 항목을 원자적으로 제거하고 반환.
    pub fn drain(&self) -> HashSet<Symbol> {
        std::mem::take(&mut *self.symbols.lock().unwrap())
    }

    /// 현재 항목 수.
    pub fn len(&self) -> usize {
        self.symbols.lock().unwrap().len()
    }

    /// 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
