//! 단계 핸드오프용 이진 래치.
//!
//! 단일 의도 작성자(다운로드 스케줄러)가 `signal()`로 상태를 올리고,
//! 소비자(드라이버 루프)가 확인 후 `reset()`으로 내리는 페이즈 게이트입니다.
//! 페이로드는 전달하지 않고 타이밍만 전달합니다.
//!
//! 바쁜 대기 대신 `wait()`로 신호를 블로킹 대기할 수 있습니다.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// 모노토닉 2상태 신호.
#[derive(Debug, Default)]
pub struct Latch {
    signaled: AtomicBool,
    notify: Notify,
}

impl Latch {
    /// 내려간 상태의 새 래치 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 상태를 올립니다. 멱등이며 어느 태스크/스레드에서든 안전합니다.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        // wait() 진입 전에 신호가 올라간 경우를 위해 permit도 남긴다
        self.notify.notify_one();
    }

    /// 논블로킹 상태 확인.
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// 상태를 내립니다. 신호를 소비한 쪽에서만 호출해야 합니다.
    pub fn reset(&self) {
        self.signaled.store(false, Ordering::SeqCst);
    }

    /// 상태가 올라갈 때까지 대기합니다. 이미 올라가 있으면 즉시 반환합니다.
    pub async fn wait(&self) {
        loop {
            // notified()를 먼저 등록해야 signal()과의 경합에서 신호를 놓치지 않는다
            let notified = self.notify.notified();
            if self.is_signaled() {
                return;
            }
            notified.await;
        }
    }
}
