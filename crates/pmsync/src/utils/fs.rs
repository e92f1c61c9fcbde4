use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{PmSyncError, Result};

/// 原子写文件：先写同目录下的临时文件，sync 后 rename 覆盖目标
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PmSyncError::IO(format!("路径没有父目录: {}", path.display())))?;
    fs::create_dir_all(parent)
        .map_err(|e| PmSyncError::IO(format!("创建目录 {} 失败: {}", parent.display(), e)))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PmSyncError::IO(format!("非法文件名: {}", path.display())))?;
    let tmp_path = parent.join(format!(".{}.tmp", file_name));

    {
        let mut file = fs::File::create(&tmp_path)
            .map_err(|e| PmSyncError::IO(format!("创建临时文件 {} 失败: {}", tmp_path.display(), e)))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        PmSyncError::IO(format!("重命名 {} 失败: {}", path.display(), e))
    })
}
