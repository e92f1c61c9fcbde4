//! 版本与构建元信息
//!
//! - **Crate Version** → Cargo.toml（唯一权威源）
//! - **Build Metadata** → vergen（build.rs），缺失时回退为 "unknown"

/// pmsync semver，来自 Cargo.toml
pub const PMSYNC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// git commit（由 vergen 在 build.rs 中生成）
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// build time（由 vergen 在 build.rs 中生成）
pub const BUILD_TIME: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// 用于日志与 `--version` 的完整版本串
pub fn version_line() -> String {
    format!("pmsync {} ({} built {})", PMSYNC_VERSION, GIT_SHA, BUILD_TIME)
}
