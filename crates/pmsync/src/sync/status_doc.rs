//! 同步状态文档
//!
//! 状态文档是一份人工也会编辑的 markdown，水位以
//! `` `<label>`: 2024-05-01T12:30:00Z `` 的形式出现，摘要写在固定标题下。
//! 读取时即校验字段与标题都存在，写盘前不会再因为结构问题失败。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use regex::{Captures, Regex};
use tracing::info;

use crate::error::{PmSyncError, Result};
use crate::utils::{format_iso_timestamp, parse_iso_datetime};

const TIMESTAMP_VALUE: &str = r"[0-9T:\-\.]+Z";
const UNSET_VALUE: &str = "None";
const PLACEHOLDER: &str = "_None yet_";

const LINEAR_TEMPLATE: &str = "# Linear Sync Status

- `lastSyncTimestamp`: None

## Daily Summaries

_None yet_
";

const NOTION_TEMPLATE: &str = "# Notion Sync Status

- `lastFullSyncTimestamp`: None
- `nextFullSync`: None
- `lastIncrementalSyncTimestamp`: None

## Full Sync History

_None yet_

## Incremental Summaries

_None yet_
";

/// 状态文档布局：水位字段名与摘要小节标题
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLayout {
    pub timestamp_label: &'static str,
    pub summary_heading: &'static str,
    /// 下次全量同步日期字段及间隔天数
    pub next_due: Option<(&'static str, i64)>,
    /// 同时推进的另一个水位字段（全量同步也覆盖了增量窗口）
    pub companion_label: Option<&'static str>,
    /// 文档不存在时的初始内容
    pub template: &'static str,
}

impl StatusLayout {
    pub const LINEAR: StatusLayout = StatusLayout {
        timestamp_label: "lastSyncTimestamp",
        summary_heading: "## Daily Summaries",
        next_due: None,
        companion_label: None,
        template: LINEAR_TEMPLATE,
    };

    pub const NOTION_INCREMENTAL: StatusLayout = StatusLayout {
        timestamp_label: "lastIncrementalSyncTimestamp",
        summary_heading: "## Incremental Summaries",
        next_due: None,
        companion_label: None,
        template: NOTION_TEMPLATE,
    };

    pub const NOTION_FULL: StatusLayout = StatusLayout {
        timestamp_label: "lastFullSyncTimestamp",
        summary_heading: "## Full Sync History",
        next_due: Some(("nextFullSync", 30)),
        companion_label: Some("lastIncrementalSyncTimestamp"),
        template: NOTION_TEMPLATE,
    };
}

/// 已加载并校验过的状态文档
#[derive(Debug, Clone)]
pub struct StatusDocument {
    path: PathBuf,
    layout: StatusLayout,
    text: String,
    watermark: Option<DateTime<Utc>>,
}

impl StatusDocument {
    /// 严格读取：文档必须存在且水位是一个时间戳
    pub fn load(path: &Path, layout: StatusLayout) -> Result<Self> {
        if !path.exists() {
            return Err(PmSyncError::StatusDoc(format!(
                "Status doc not found at {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)?;
        Self::from_text(path, layout, text, false)
    }

    /// 全量同步使用：允许水位为 `None`，文档不存在时按模板新建
    pub fn load_or_bootstrap(path: &Path, layout: StatusLayout) -> Result<Self> {
        let text = if path.exists() {
            fs::read_to_string(path)?
        } else {
            info!("📝 状态文档 {} 不存在，使用模板初始化", path.display());
            layout.template.to_string()
        };
        Self::from_text(path, layout, text, true)
    }

    pub fn from_text(path: &Path, layout: StatusLayout, text: String, allow_unset: bool) -> Result<Self> {
        let value_pattern = if allow_unset {
            format!("{}|{}", TIMESTAMP_VALUE, UNSET_VALUE)
        } else {
            TIMESTAMP_VALUE.to_string()
        };
        let label_re = Regex::new(&format!(
            r"`{}`:\s*({})",
            regex::escape(layout.timestamp_label),
            value_pattern
        ))?;
        let caps = label_re.captures(&text).ok_or_else(|| {
            PmSyncError::StatusDoc(format!(
                "Could not locate `{}` in status doc.",
                layout.timestamp_label
            ))
        })?;
        let watermark = match &caps[1] {
            UNSET_VALUE => None,
            raw => Some(parse_iso_datetime(raw).map_err(|e| {
                PmSyncError::StatusDoc(format!("Invalid `{}` value: {}", layout.timestamp_label, e))
            })?),
        };

        if find_heading(&text, layout.summary_heading).is_none() {
            return Err(PmSyncError::StatusDoc(format!(
                "Could not locate '{}' section.",
                layout.summary_heading
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            layout,
            text,
            watermark,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> StatusLayout {
        self.layout
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    /// 生成更新后的文档内容（不写盘）
    ///
    /// 替换水位字段；摘要行替换标题下的占位符或上一批摘要，只保留最新一行。
    pub fn render_update(&self, timestamp: &DateTime<Utc>, summary_line: &str) -> Result<String> {
        let ts = format_iso_timestamp(timestamp);
        let mut text = replace_field(
            &self.text,
            self.layout.timestamp_label,
            &format!("{}|{}", TIMESTAMP_VALUE, UNSET_VALUE),
            &ts,
        )?
        .ok_or_else(|| {
            PmSyncError::StatusDoc(format!(
                "Failed to locate `{}` in status doc.",
                self.layout.timestamp_label
            ))
        })?;

        if let Some((label, days)) = self.layout.next_due {
            let due = (*timestamp + Duration::days(days)).format("%Y-%m-%d").to_string();
            if let Some(updated) = replace_field(&text, label, r"[0-9T:\-\.Z]+|None", &due)? {
                text = updated;
            }
        }

        if let Some(label) = self.layout.companion_label {
            if companion_is_behind(&text, label, timestamp)? {
                if let Some(updated) =
                    replace_field(&text, label, &format!("{}|{}", TIMESTAMP_VALUE, UNSET_VALUE), &ts)?
                {
                    text = updated;
                }
            }
        }

        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        let heading_idx = find_heading(&text, self.layout.summary_heading).ok_or_else(|| {
            PmSyncError::StatusDoc(format!(
                "Could not locate '{}' section.",
                self.layout.summary_heading
            ))
        })?;

        let mut idx = heading_idx + 1;
        while idx < lines.len() && lines[idx].trim().is_empty() {
            idx += 1;
        }

        let replaceable = idx < lines.len() && {
            let current = lines[idx].trim();
            current == PLACEHOLDER || current.starts_with("- ")
        };

        if replaceable {
            lines[idx] = summary_line.to_string();
            let next = idx + 1;
            while next < lines.len() && lines[next].trim_start().starts_with("- ") {
                lines.remove(next);
            }
            let mut blank_end = next;
            while blank_end < lines.len() && lines[blank_end].trim().is_empty() {
                blank_end += 1;
            }
            if blank_end < lines.len() {
                // 与下一小节之间保留一个空行
                lines.drain(next..blank_end);
                lines.insert(next, String::new());
            } else {
                lines.truncate(next);
            }
        } else {
            lines.insert(idx, summary_line.to_string());
            if idx + 1 < lines.len() && !lines[idx + 1].trim().is_empty() {
                lines.insert(idx + 1, String::new());
            }
        }

        Ok(lines.join("\n") + "\n")
    }
}

fn find_heading(text: &str, heading: &str) -> Option<usize> {
    text.lines().position(|line| line.trim_end() == heading)
}

/// 替换第一处 `` `label`: value ``，字段不存在时返回 None
fn replace_field(text: &str, label: &str, value_pattern: &str, new_value: &str) -> Result<Option<String>> {
    let re = Regex::new(&format!(r"(`{}`:\s*)({})", regex::escape(label), value_pattern))?;
    if !re.is_match(text) {
        return Ok(None);
    }
    let replaced = re.replacen(text, 1, |caps: &Captures| format!("{}{}", &caps[1], new_value));
    Ok(Some(replaced.into_owned()))
}

fn companion_is_behind(text: &str, label: &str, timestamp: &DateTime<Utc>) -> Result<bool> {
    let re = Regex::new(&format!(
        r"`{}`:\s*({}|{})",
        regex::escape(label),
        TIMESTAMP_VALUE,
        UNSET_VALUE
    ))?;
    Ok(match re.captures(text) {
        Some(caps) => match &caps[1] {
            UNSET_VALUE => true,
            raw => parse_iso_datetime(raw).map(|t| t < *timestamp).unwrap_or(true),
        },
        None => false,
    })
}
