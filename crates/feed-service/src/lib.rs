//! 피드 서비스 오케스트레이션.
//!
//! 두 개의 장기 태스크를 운영합니다:
//! - [`DownloadScheduler`]: 주기적으로 종목 카탈로그를 내려받고
//!   래치로 갱신을 알립니다.
//! - [`Driver`]: 래치 신호마다 설정과 스냅샷을 다시 읽어 원하는
//!   심볼 집합을 계산하고 연결 풀을 조정합니다.

pub mod driver;
pub mod scheduler;

pub use driver::Driver;
pub use scheduler::DownloadScheduler;
