//! 심볼 타입 정의.
//!
//! 심볼은 거래 가능한 하나의 종목 스트림을 식별하는 소문자 문자열입니다.
//! 풀과 카탈로그의 유일한 키로 사용됩니다.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// 거래 종목 스트림 식별자.
///
/// 생성 시 항상 소문자로 정규화됩니다. Binance 스트림 경로와
/// 풀의 맵 키가 모두 소문자 표기를 사용하기 때문입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Symbol(String);

impl Symbol {
    /// 새 심볼을 생성합니다. 입력은 소문자로 정규화됩니다.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().to_lowercase())
    }

    /// 문자열 슬라이스로 반환.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 부분 문자열 필터 매칭.
    pub fn matches_filter(&self, filter: &str) -> bool {
        filter.is_empty() || self.0.contains(filter)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Symbol::new(raw))
    }
}
