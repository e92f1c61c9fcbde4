use std::collections::{BTreeSet, HashSet};

use super::record::Record;

/// 磁盘上的一个批文件：全局有序序列中的一段连续记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    /// 从 1 开始，决定文件名 `<prefix>-<index>.md`
    pub index: usize,
    /// 按顺序排列的记录 id
    pub members: Vec<String>,
    pub capacity: usize,
}

impl BatchFile {
    pub fn file_name(&self, prefix: &str) -> String {
        batch_file_name(prefix, self.index)
    }
}

pub fn batch_file_name(prefix: &str, index: usize) -> String {
    format!("{}-{}.md", prefix, index)
}

/// 批文件变更集
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDiff {
    pub rewrite: BTreeSet<usize>,
    pub delete: BTreeSet<usize>,
}

impl BatchDiff {
    pub fn is_empty(&self) -> bool {
        self.rewrite.is_empty() && self.delete.is_empty()
    }
}

/// 把有序记录重新切分为批文件，每次从头推导，不保留旧的分界
pub fn rebatch(records: &[Record], capacity: usize) -> Vec<BatchFile> {
    let capacity = capacity.max(1);
    records
        .chunks(capacity)
        .enumerate()
        .map(|(i, chunk)| BatchFile {
            index: i + 1,
            members: chunk.iter().map(|r| r.id.clone()).collect(),
            capacity,
        })
        .collect()
}

/// 计算需要重写和删除的批文件
///
/// 成员序列变化或包含本次新增/修改记录的批需要重写；
/// 批数量缩减后多出来的旧序号需要删除。
pub fn diff_batches(old: &[BatchFile], new: &[BatchFile], touched: &HashSet<String>) -> BatchDiff {
    let mut diff = BatchDiff::default();

    for batch in new {
        let previous = old.iter().find(|b| b.index == batch.index);
        let membership_changed = previous.map_or(true, |p| p.members != batch.members);
        let has_touched = batch.members.iter().any(|id| touched.contains(id));
        if membership_changed || has_touched {
            diff.rewrite.insert(batch.index);
        }
    }

    let new_indices: HashSet<usize> = new.iter().map(|b| b.index).collect();
    for batch in old {
        if !new_indices.contains(&batch.index) {
            diff.delete.insert(batch.index);
        }
    }

    diff
}
