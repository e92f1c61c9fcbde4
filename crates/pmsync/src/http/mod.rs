//! HTTP 访问层
//!
//! - `client`: reqwest 封装，鉴权、JSON、重试
//! - `retry`: 失败分类与退避策略
//! - `pacer`: 请求最小间隔

pub mod client;
pub mod pacer;
pub mod retry;

pub use client::{ApiHttpClient, AuthScheme};
pub use pacer::RequestPacer;
pub use retry::{FailureReason, RetryPolicy};
