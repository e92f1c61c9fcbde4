use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PmSyncError;

/// 请求失败原因分类
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// 网络超时 - 可重试
    Timeout,
    /// 连接失败 - 可重试
    Connection,
    /// 服务端错误 - 5xx 可重试
    ServerError(u16),
    /// 限流，携带服务端给出的 Retry-After（秒）
    RateLimited(Option<u64>),
    /// 4xx 客户端错误 - 不重试
    ClientError(u16),
    /// 未知错误
    Unknown(String),
}

impl FailureReason {
    /// 判断是否可以重试
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureReason::Timeout => true,
            FailureReason::Connection => true,
            FailureReason::ServerError(code) => (500..600).contains(code),
            FailureReason::RateLimited(_) => true,
            FailureReason::ClientError(_) => false,
            FailureReason::Unknown(_) => false,
        }
    }

    /// 获取重试延迟倍数
    pub fn delay_multiplier(&self) -> f64 {
        match self {
            FailureReason::Timeout => 1.0,
            FailureReason::Connection => 2.0,
            FailureReason::ServerError(_) => 1.5,
            _ => 1.0,
        }
    }

    /// 按 HTTP 状态码分类
    pub fn from_status(status: u16, retry_after: Option<u64>) -> Self {
        match status {
            429 => FailureReason::RateLimited(retry_after),
            500..=599 => FailureReason::ServerError(status),
            _ => FailureReason::ClientError(status),
        }
    }
}

impl From<&reqwest::Error> for FailureReason {
    fn from(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FailureReason::Timeout
        } else if error.is_connect() {
            FailureReason::Connection
        } else {
            FailureReason::Unknown(error.to_string())
        }
    }
}

impl From<&PmSyncError> for FailureReason {
    fn from(error: &PmSyncError) -> Self {
        match error {
            PmSyncError::Http { status, .. } => FailureReason::from_status(*status, None),
            PmSyncError::RateLimited { .. } => FailureReason::RateLimited(None),
            PmSyncError::Transport(msg) => {
                if msg.contains("timed out") || msg.contains("timeout") {
                    FailureReason::Timeout
                } else if msg.contains("connect") {
                    FailureReason::Connection
                } else {
                    FailureReason::Unknown(msg.clone())
                }
            }
            other => FailureReason::Unknown(other.to_string()),
        }
    }
}

/// 重试策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大重试次数
    pub max_retries: u32,
    /// 基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟（毫秒）
    pub max_delay_ms: u64,
    /// 指数退避因子
    pub backoff_factor: f64,
    /// 随机抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 429 未带 Retry-After 时的固定等待（秒）
    pub rate_limit_fallback_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
            rate_limit_fallback_secs: 1,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &crate::config::HttpClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_fallback_secs: config.rate_limit_fallback_secs,
            ..Self::default()
        }
    }

    /// 检查是否应该重试
    pub fn should_retry(&self, retry_count: u32, reason: &FailureReason) -> bool {
        retry_count < self.max_retries && reason.is_retryable()
    }

    /// 计算第 `retry_count` 次重试前的等待时间；不应重试时返回 None
    ///
    /// 限流按服务端给出的 Retry-After 固定等待，其余按指数退避加抖动。
    pub fn next_delay(&self, retry_count: u32, reason: &FailureReason) -> Option<Duration> {
        if !self.should_retry(retry_count, reason) {
            return None;
        }

        if let FailureReason::RateLimited(retry_after) = reason {
            let secs = retry_after.unwrap_or(self.rate_limit_fallback_secs);
            return Some(Duration::from_secs(secs));
        }

        // 基础延迟 = base_delay * (backoff_factor ^ retry_count)
        let base = self.base_delay_ms as f64 * self.backoff_factor.powf(retry_count as f64);
        let adjusted = base * reason.delay_multiplier();
        let capped = adjusted.min(self.max_delay_ms as f64);

        let jitter = capped * self.jitter_factor * (rand::random::<f64>() - 0.5);
        let final_ms = (capped + jitter).max(0.0);
        Some(Duration::from_millis(final_ms as u64))
    }
}
