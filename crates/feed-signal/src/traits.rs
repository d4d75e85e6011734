//! 분류기 trait 정의.

use feed_core::Symbol;
use std::fmt;

/// 분류 결과 레이블.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// 매수 신호
    Long,
    /// 매도 신호
    Short,
    /// 관망
    Hold,
    /// 워밍업 중 (데이터 부족)
    Wait,
    /// 해석 불가능한 페이로드
    Invalid,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Signal::Long => "LONG",
            Signal::Short => "SHORT",
            Signal::Hold => "HOLD",
            Signal::Wait => "WAIT",
            Signal::Invalid => "INVALID",
        };
        f.write_str(label)
    }
}

/// 심볼 하나의 메시지 스트림을 분류하는 상태 보유 분류기.
///
/// 하나의 연결 수명 동안 심볼별로 상태를 유지합니다. 연결이
/// 재생성되면 분류기도 새로 만들어집니다.
pub trait TradeClassifier: Send {
    /// 다음 원시 메시지를 처리하고 결정 레이블을 반환합니다.
    fn on_message(&mut self, payload: &str) -> Signal;
}

/// 승인된 심볼마다 분류기를 생성하는 팩토리.
pub trait ClassifierFactory: Send + Sync {
    /// 심볼용 분류기를 생성합니다.
    fn create(&self, symbol: &Symbol) -> Box<dyn TradeClassifier>;
}
