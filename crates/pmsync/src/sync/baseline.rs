use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use super::batch::BatchFile;
use super::codec::parse_batch;
use super::record::{LegacyKeyFn, Record};
use crate::error::{PmSyncError, Result};

/// 上一次落盘的快照
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    /// 按文件序号与文件内顺序排列的全部记录
    pub records: Vec<Record>,
    pub batches: Vec<BatchFile>,
    /// 序号 → 现有文件路径
    pub paths: Vec<(usize, PathBuf)>,
    /// 无帧头的旧格式文件序号
    pub legacy_indices: Vec<usize>,
}

impl Baseline {
    pub fn path_of(&self, index: usize) -> Option<&Path> {
        self.paths
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, p)| p.as_path())
    }
}

/// 读取目录下全部 `<prefix>-<n>.md` 批文件
///
/// 目录不存在视为空快照；任一文件无法拆分即整体失败。
pub fn load_baseline(
    dir: &Path,
    prefix: &str,
    capacity: usize,
    legacy_key: LegacyKeyFn,
) -> Result<Baseline> {
    if !dir.exists() {
        debug!("批文件目录 {} 不存在，按空快照处理", dir.display());
        return Ok(Baseline::default());
    }

    let name_re = Regex::new(&format!(r"^{}-(\d+)\.md$", regex::escape(prefix)))?;
    let mut files: Vec<(usize, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = name_re.captures(name) {
            if let Ok(index) = caps[1].parse::<usize>() {
                files.push((index, entry.path()));
            }
        }
    }
    files.sort_by_key(|(index, _)| *index);

    let mut baseline = Baseline::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, path) in files {
        let text = fs::read_to_string(&path)
            .map_err(|e| PmSyncError::IO(format!("读取 {} 失败: {}", path.display(), e)))?;
        let parsed = parse_batch(&path, &text, legacy_key)?;
        if parsed.legacy {
            baseline.legacy_indices.push(index);
        }

        let mut members = Vec::with_capacity(parsed.records.len());
        for record in parsed.records {
            if !seen.insert(record.id.clone()) {
                return Err(PmSyncError::malformed(
                    &path,
                    format!("record {} appears more than once", record.id),
                ));
            }
            members.push(record.id.clone());
            baseline.records.push(record);
        }
        baseline.batches.push(BatchFile {
            index,
            members,
            capacity,
        });
        baseline.paths.push((index, path));
    }

    if !baseline.legacy_indices.is_empty() {
        warn!(
            "{} 下有 {} 个旧格式批文件，本次会按新格式重写",
            dir.display(),
            baseline.legacy_indices.len()
        );
    }
    debug!(
        "已加载快照 {}: {} 个批文件, {} 条记录",
        dir.display(),
        baseline.batches.len(),
        baseline.records.len()
    );
    Ok(baseline)
}
