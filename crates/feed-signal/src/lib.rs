//! # Feed Signal
//!
//! 심볼별 트레이딩 시그널 분류기를 제공합니다.
//!
//! 연결이 수신한 각 원시 메시지는 해당 심볼의 분류기에 동기적으로
//! 전달되고, 분류기는 결정 레이블 하나를 돌려줍니다. 호출자는
//! 레이블을 해석하지 않고 로깅만 합니다.

pub mod sma;
pub mod traits;

pub use sma::{SmaClassifierFactory, SmaCrossClassifier};
pub use traits::{ClassifierFactory, Signal, TradeClassifier};
