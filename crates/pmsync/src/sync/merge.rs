use std::collections::{HashMap, HashSet};

use super::record::Record;

/// 合并结果
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// 按 (sort_key, id) 严格有序、id 唯一
    pub records: Vec<Record>,
    /// 已存在且本次被替换的 id（按到达顺序）
    pub updated_ids: Vec<String>,
    /// 新增 id（按到达顺序）
    pub new_ids: Vec<String>,
    /// 全量模式下源端不再返回的 id
    pub removed_ids: Vec<String>,
}

impl MergeOutcome {
    /// 本次新增或修改的 id
    pub fn touched(&self) -> HashSet<String> {
        self.updated_ids
            .iter()
            .chain(self.new_ids.iter())
            .cloned()
            .collect()
    }
}

/// 同一批 incoming 里重复的 id 以最后一次为准
fn dedupe_incoming(incoming: Vec<Record>) -> Vec<Record> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Record> = Vec::with_capacity(incoming.len());
    for record in incoming {
        match position.get(&record.id) {
            Some(&i) => out[i] = record,
            None => {
                position.insert(record.id.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// 增量合并：已存在的 id 原位替换正文与时间戳（排序键变化时移动位置），
/// 新 id 按排序键插入。
pub fn merge(baseline: Vec<Record>, incoming: Vec<Record>) -> MergeOutcome {
    let mut records = baseline;
    let mut index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();

    let mut outcome = MergeOutcome::default();
    for record in dedupe_incoming(incoming) {
        match index.get(&record.id) {
            Some(&i) => {
                outcome.updated_ids.push(record.id.clone());
                records[i] = record;
            }
            None => {
                outcome.new_ids.push(record.id.clone());
                index.insert(record.id.clone(), records.len());
                records.push(record);
            }
        }
    }

    records.sort_by(|a, b| a.total_cmp(b));
    outcome.records = records;
    outcome
}

/// 全量替换：结果只包含源端本次返回的记录。
///
/// 正文与排序键都没变的记录不算修改。
pub fn replace_all(baseline: Vec<Record>, incoming: Vec<Record>) -> MergeOutcome {
    let previous: HashMap<String, Record> = baseline
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();

    let mut records = dedupe_incoming(incoming);
    let mut outcome = MergeOutcome::default();
    let mut incoming_ids: HashSet<&str> = HashSet::new();

    for record in &records {
        incoming_ids.insert(record.id.as_str());
        match previous.get(&record.id) {
            Some(old) if old.body == record.body && old.sort_key == record.sort_key => {}
            Some(_) => outcome.updated_ids.push(record.id.clone()),
            None => outcome.new_ids.push(record.id.clone()),
        }
    }

    let mut removed: Vec<String> = previous
        .keys()
        .filter(|id| !incoming_ids.contains(id.as_str()))
        .cloned()
        .collect();
    removed.sort();
    outcome.removed_ids = removed;

    records.sort_by(|a, b| a.total_cmp(b));
    outcome.records = records;
    outcome
}
