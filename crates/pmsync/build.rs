//! 编译期生成 GIT_SHA、BUILD_TIMESTAMP 等元信息（供 version.rs 使用）

use vergen::EmitBuilder;

fn main() {
    // 非 git 检出（如 crates.io 源码包）时 vergen 只会给出警告，version.rs 用 option_env! 兜底
    let _ = EmitBuilder::builder()
        .build_timestamp()
        .git_sha(false)
        .emit();
}
