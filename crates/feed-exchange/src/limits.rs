//! 호스트 디스크립터 한도에서 연결 예산 유도.
//!
//! 생성 시 한 번 `RLIMIT_NOFILE` 소프트 한도를 목표치까지 올리고,
//! 최종 소프트 한도의 절반을 연결 예산으로 사용합니다. 나머지
//! 절반은 카탈로그 다운로드 등 다른 디스크립터 소비자의 여유분입니다.

use tracing::{error, info, warn};

/// 소프트 한도 목표치.
const FD_LIMIT_TARGET: u64 = 8912;

/// rlimit 조회가 불가능할 때의 보수적 예산.
const FALLBACK_LIMIT: usize = 512;

/// 연결 예산을 유도합니다.
#[cfg(unix)]
pub fn derive_connections_limit() -> usize {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };

    // SAFETY: 유효한 rlimit 구조체 포인터를 넘긴다
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        error!(
            errno = std::io::Error::last_os_error().raw_os_error(),
            "getrlimit(RLIMIT_NOFILE) failed, using fallback budget"
        );
        return FALLBACK_LIMIT;
    }

    info!(
        soft = limit.rlim_cur,
        hard = limit.rlim_max,
        "Current descriptor limits"
    );

    let target = if FD_LIMIT_TARGET > limit.rlim_max as u64 {
        warn!(
            requested = FD_LIMIT_TARGET,
            maximum = limit.rlim_max,
            "Requested descriptor limit exceeds hard limit, clamping"
        );
        limit.rlim_max
    } else {
        FD_LIMIT_TARGET as libc::rlim_t
    };

    if target > limit.rlim_cur {
        let requested = libc::rlimit {
            rlim_cur: target,
            rlim_max: limit.rlim_max,
        };
        // SAFETY: 위와 동일
        if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &requested) } == 0 {
            info!(soft = target, "Raised soft descriptor limit");
            limit.rlim_cur = target;
        } else {
            error!(
                errno = std::io::Error::last_os_error().raw_os_error(),
                "setrlimit(RLIMIT_NOFILE) failed, keeping current soft limit"
            );
        }
    }

    let budget = (limit.rlim_cur / 2) as usize;
    info!(budget, "Derived connection budget");
    budget
}

/// 연결 예산을 유도합니다 (rlimit 없는 플랫폼).
#[cfg(not(unix))]
pub fn derive_connections_limit() -> usize {
    warn!("No rlimit interface on this platform, using fallback budget");
    FALLBACK_LIMIT
}
