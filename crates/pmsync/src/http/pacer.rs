//! 请求节流
//!
//! 分页接口之间强制最小间隔，避免连续翻页触发服务端限流。

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

/// 最小间隔节流器（线程安全）
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    /// 上次放行时间
    last_request: RwLock<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: RwLock::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 距离允许下次请求还需等待的时间，并登记本次请求
    ///
    /// 返回 `Duration::ZERO` 表示可以立即发送。
    pub fn reserve(&self) -> Duration {
        let now = Instant::now();
        let mut last = self.last_request.write();
        let wait = match *last {
            Some(prev) => {
                let ready_at = prev + self.min_interval;
                ready_at.saturating_duration_since(now)
            }
            None => Duration::ZERO,
        };
        *last = Some(now + wait);
        wait
    }

    /// 等待到允许发送为止
    pub async fn wait(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            debug!("请求节流，等待 {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }
}
