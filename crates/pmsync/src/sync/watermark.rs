use chrono::{DateTime, Utc};

use super::record::Record;
use crate::utils::format_day;

/// 摘要里最多列出的 id 个数
const MAX_LISTED_IDS: usize = 6;

/// 同步水位
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncWatermark {
    /// 已完整覆盖的最近修改时间；全量同步之前可以为空
    pub timestamp: Option<DateTime<Utc>>,
    pub last_summary: Option<String>,
}

impl SyncWatermark {
    pub fn new(timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            timestamp,
            last_summary: None,
        }
    }
}

/// 推进水位：`max(当前, 本次触及记录的最大 updated_at, now)`
///
/// `now` 作为下限，保证空窗口的 run 也会前进。
pub fn advance_watermark(
    current: &SyncWatermark,
    touched: &[&Record],
    now: DateTime<Utc>,
    summary: String,
) -> SyncWatermark {
    let latest = touched
        .iter()
        .filter_map(|r| r.updated_at)
        .chain(current.timestamp)
        .fold(now, |acc, ts| acc.max(ts));

    SyncWatermark {
        timestamp: Some(latest),
        last_summary: Some(summary),
    }
}

/// 一次 run 的变更内容
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub updated_ids: Vec<String>,
    pub new_ids: Vec<String>,
    pub removed_ids: Vec<String>,
    /// 重写的文件（展示用相对路径）
    pub rewritten_files: Vec<String>,
    pub removed_files: Vec<String>,
}

fn list_ids(ids: &[String]) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut display = sorted
        .iter()
        .take(MAX_LISTED_IDS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if sorted.len() > MAX_LISTED_IDS {
        display.push_str(", …");
    }
    display
}

/// 生成状态文档里的摘要行
///
/// `- 2024-05-01: 2 updated (ENG-1, ENG-7), 1 new (ENG-9) → touched Issues-Batch-1.md`
pub fn summarize(changes: &ChangeSet, today: &DateTime<Utc>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !changes.updated_ids.is_empty() {
        parts.push(format!(
            "{} updated ({})",
            changes.updated_ids.len(),
            list_ids(&changes.updated_ids)
        ));
    }
    if !changes.new_ids.is_empty() {
        parts.push(format!("{} new ({})", changes.new_ids.len(), list_ids(&changes.new_ids)));
    }
    if !changes.removed_ids.is_empty() {
        parts.push(format!(
            "{} removed ({})",
            changes.removed_ids.len(),
            list_ids(&changes.removed_ids)
        ));
    }
    if parts.is_empty() {
        parts.push("no changes".to_string());
    }

    let mut line = format!("- {}: {}", format_day(today), parts.join(", "));
    if !changes.rewritten_files.is_empty() {
        line.push_str(&format!(" → touched {}", changes.rewritten_files.join(", ")));
    }
    if !changes.removed_files.is_empty() {
        line.push_str(&format!("; removed {}", changes.removed_files.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::record::SortKey;
    use crate::utils::parse_iso_datetime;

    fn ts(value: &str) -> DateTime<Utc> {
        parse_iso_datetime(value).unwrap()
    }

    #[test]
    fn watermark_takes_the_maximum_and_never_goes_back() {
        let now = ts("2024-05-01T00:00:00Z");
        let future = Record::new("A", SortKey::Numeric(1), Some(ts("2024-05-02T00:00:00Z")), "");
        let past = Record::new("B", SortKey::Numeric(2), Some(ts("2024-04-01T00:00:00Z")), "");

        let current = SyncWatermark::new(Some(ts("2024-04-15T00:00:00Z")));
        let next = advance_watermark(&current, &[&past], now, "s".into());
        assert_eq!(next.timestamp, Some(now));

        let next = advance_watermark(&current, &[&past, &future], now, "s".into());
        assert_eq!(next.timestamp, Some(ts("2024-05-02T00:00:00Z")));

        // 时钟回拨时保持原水位
        let ahead = SyncWatermark::new(Some(ts("2024-06-01T00:00:00Z")));
        let next = advance_watermark(&ahead, &[], now, "s".into());
        assert_eq!(next.timestamp, ahead.timestamp);

        let unset = SyncWatermark::default();
        assert_eq!(advance_watermark(&unset, &[], now, "s".into()).timestamp, Some(now));
    }

    #[test]
    fn empty_change_set_reads_no_changes() {
        let line = summarize(&ChangeSet::default(), &ts("2024-05-01T09:00:00Z"));
        assert_eq!(line, "- 2024-05-01: no changes");
    }

    #[test]
    fn long_id_lists_are_truncated() {
        let changes = ChangeSet {
            updated_ids: (1..=8).map(|i| format!("ENG-{}", i)).collect(),
            new_ids: vec!["ENG-20".into()],
            rewritten_files: vec!["Issues-Batch-1.md".into(), "Issues-Batch-2.md".into()],
            ..ChangeSet::default()
        };
        let line = summarize(&changes, &ts("2024-05-01T09:00:00Z"));
        assert_eq!(
            line,
            "- 2024-05-01: 8 updated (ENG-1, ENG-2, ENG-3, ENG-4, ENG-5, ENG-6, …), 1 new (ENG-20) \
             → touched Issues-Batch-1.md, Issues-Batch-2.md"
        );
    }

    #[test]
    fn removals_are_reported() {
        let changes = ChangeSet {
            removed_ids: vec!["ENG-3".into()],
            removed_files: vec!["Issues-Batch-4.md".into()],
            ..ChangeSet::default()
        };
        let line = summarize(&changes, &ts("2024-05-01T09:00:00Z"));
        assert_eq!(line, "- 2024-05-01: 1 removed (ENG-3); removed Issues-Batch-4.md");
    }
}
