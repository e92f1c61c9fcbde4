//! HTTP 客户端模块 - 用于访问 Linear / Notion API
//!
//! 基于 reqwest，统一处理鉴权头、JSON 编解码、429 限流与 5xx 重试，
//! 以及分页请求之间的最小间隔。

use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::pacer::RequestPacer;
use super::retry::{FailureReason, RetryPolicy};
use crate::config::HttpClientConfig;
use crate::error::{PmSyncError, Result};

/// 错误日志中保留的响应体长度
const MAX_LOGGED_BODY: usize = 200;

/// 鉴权方式
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: <key>`（Linear personal API key）
    Raw(String),
}

/// JSON API 客户端
pub struct ApiHttpClient {
    client: Client,
    base_url: String,
    auth: AuthScheme,
    headers: Vec<(String, String)>,
    retry: RetryPolicy,
    pacer: RequestPacer,
}

impl ApiHttpClient {
    /// 创建新的 HTTP 客户端
    pub fn new(config: &HttpClientConfig, base_url: impl Into<String>, auth: AuthScheme) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| PmSyncError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("✅ HTTP 客户端已创建 (base_url: {})", base_url);

        Ok(Self {
            client,
            base_url,
            auth,
            headers: Vec::new(),
            retry: RetryPolicy::from_config(config),
            pacer: RequestPacer::from_millis(config.min_request_interval_ms),
        })
    }

    /// 附加固定请求头
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_start_matches('/');
        if endpoint.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.execute(Method::GET, endpoint, query, None::<&()>).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(Method::POST, endpoint, &[], Some(body)).await
    }

    async fn execute<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.url(endpoint);
        let mut attempt = 0u32;

        loop {
            self.pacer.wait().await;

            let mut request = self.client.request(method.clone(), &url);
            request = match &self.auth {
                AuthScheme::Bearer(token) => request.bearer_auth(token),
                AuthScheme::Raw(key) => request.header("Authorization", key),
            };
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(b) = body {
                request = request.json(b);
            }

            debug!("➡️ {} {} (attempt {})", method, url, attempt + 1);
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let reason = FailureReason::from(&e);
                    if let Some(delay) = self.retry.next_delay(attempt, &reason) {
                        warn!(
                            "请求 {} 失败 ({:?})，{}ms 后重试 {}/{}",
                            url,
                            reason,
                            delay.as_millis(),
                            attempt + 1,
                            self.retry.max_retries
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    error!("❌ 请求 {} 失败: {}", url, e);
                    return Err(e.into());
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| PmSyncError::Serialization(format!("解析 {} 响应失败: {}", url, e)));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let reason = FailureReason::from_status(status.as_u16(), retry_after);

            if let Some(delay) = self.retry.next_delay(attempt, &reason) {
                warn!(
                    "⏳ HTTP {} from {}，等待 {}s 后重试 {}/{}",
                    status.as_u16(),
                    url,
                    delay.as_secs_f64(),
                    attempt + 1,
                    self.retry.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if status.as_u16() == 429 {
                error!("❌ {} 重试 {} 次后仍被限流", url, attempt + 1);
                return Err(PmSyncError::RateLimited {
                    attempts: attempt + 1,
                });
            }

            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            let preview: String = text.chars().take(MAX_LOGGED_BODY).collect();
            error!("❌ HTTP 状态码: {}, URL: {}, 错误: {}", status, url, preview);
            return Err(PmSyncError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
    }
}
