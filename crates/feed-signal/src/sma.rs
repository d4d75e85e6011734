//! 단순 이동평균 크로스오버 분류기.
//!
//! 단기 이동평균이 장기 이동평균보다 높으면 매수, 낮으면 매도로
//! 분류하는 클래식한 추세 추종 로직입니다. 분류 결과에 따라
//! 페이퍼 포지션을 시뮬레이션하고 체결/수익을 로깅합니다.

use crate::traits::{ClassifierFactory, Signal, TradeClassifier};
use feed_core::Symbol;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{info, warn};

/// 단기 이동평균 기간 기본값.
const DEFAULT_SHORT_WINDOW: usize = 5;

/// 장기 이동평균 기간 기본값.
const DEFAULT_LONG_WINDOW: usize = 20;

/// 시뮬레이션 초기 잔고.
const DEFAULT_INITIAL_BALANCE: u64 = 1_000_000;

/// Binance aggTrade 페이로드.
#[derive(Debug, Deserialize)]
struct AggTrade {
    /// 이벤트 타입 ("aggTrade")
    #[serde(rename = "e")]
    _event_type: String,
    /// 심볼 (대문자)
    #[serde(rename = "s")]
    symbol: String,
    /// 체결가 (문자열 인코딩)
    #[serde(rename = "p")]
    price: String,
    /// 체결량 (문자열 인코딩)
    #[serde(rename = "q")]
    quantity: String,
}

/// SMA 크로스오버 분류기.
pub struct SmaCrossClassifier {
    short_window: usize,
    long_window: usize,
    prices: VecDeque<Decimal>,
    balance: Decimal,
    position: Decimal,
    realized: Vec<Decimal>,
    id: String,
}

impl SmaCrossClassifier {
    /// 기본 기간(5/20)과 기본 잔고로 분류기 생성.
    pub fn new(symbol: &Symbol) -> Self {
        Self::with_windows(symbol, DEFAULT_SHORT_WINDOW, DEFAULT_LONG_WINDOW)
    }

    /// 기간을 지정하여 분류기 생성.
    ///
    /// `short_window`는 `long_window` 이하여야 합니다.
    pub fn with_windows(symbol: &Symbol, short_window: usize, long_window: usize) -> Self {
        debug_assert!(short_window <= long_window);
        Self {
            short_window,
            long_window,
            prices: VecDeque::with_capacity(long_window + 1),
            balance: Decimal::from(DEFAULT_INITIAL_BALANCE),
            position: Decimal::ZERO,
            realized: Vec::new(),
            id: symbol.to_string(),
        }
    }

    /// 누적 실현 수익.
    pub fn total_profit(&self) -> Decimal {
        self.realized.iter().copied().sum()
    }

    /// 최근 `window`개 가격의 평균.
    fn moving_average(&self, window: usize) -> Decimal {
        let sum: Decimal = self.prices.iter().rev().take(window).copied().sum();
        sum / Decimal::from(window as u64)
    }

    fn classify(short_ma: Decimal, long_ma: Decimal) -> Signal {
        if short_ma > long_ma {
            Signal::Long
        } else if short_ma < long_ma {
            Signal::Short
        } else {
            Signal::Hold
        }
    }

    /// 분류 결과에 따라 페이퍼 포지션을 갱신합니다.
    fn simulate_trade(&mut self, signal: Signal, price: Decimal, quantity: Decimal) {
        let mut profit = Decimal::ZERO;
        let cost = price * quantity;

        match signal {
            Signal::Long if self.balance >= cost => {
                self.position += quantity;
                self.balance -= cost;
                info!(
                    id = %self.id,
                    %quantity,
                    %price,
                    balance = %self.balance,
                    profit = %self.total_profit(),
                    "Bought"
                );
            }
            Signal::Short if self.position >= quantity => {
                profit = cost;
                self.balance += profit;
                self.position -= quantity;
                info!(
                    id = %self.id,
                    %quantity,
                    %price,
                    %profit,
                    balance = %self.balance,
                    total = %self.total_profit(),
                    "Sold"
                );
            }
            _ => {}
        }

        self.realized.push(profit);
    }
}

impl TradeClassifier for SmaCrossClassifier {
    fn on_message(&mut self, payload: &str) -> Signal {
        let trade: AggTrade = match serde_json::from_str(payload) {
            Ok(trade) => trade,
            Err(e) => {
                warn!(id = %self.id, error = %e, "Failed to parse trade payload");
                return Signal::Invalid;
            }
        };

        let (Ok(price), Ok(quantity)) = (
            trade.price.parse::<Decimal>(),
            trade.quantity.parse::<Decimal>(),
        ) else {
            warn!(id = %self.id, "Non-numeric price/quantity in trade payload");
            return Signal::Invalid;
        };
        self.id = trade.symbol;

        self.prices.push_back(price);
        if self.prices.len() > self.long_window {
            self.prices.pop_front();
        }

        if self.prices.len() < self.long_window {
            return Signal::Wait;
        }

        let short_ma = self.moving_average(self.short_window);
        let long_ma = self.moving_average(self.long_window);
        let signal = Self::classify(short_ma, long_ma);

        self.simulate_trade(signal, price, quantity);
        signal
    }
}

/// `SmaCrossClassifier`를 만들어 주는 기본 팩토리.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmaClassifierFactory;

impl ClassifierFactory for SmaClassifierFactory {
    fn create(&self, symbol: &Symbol) -> Box<dyn TradeClassifier> {
        Box::new(SmaCrossClassifier::new(symbol))
    }
}
