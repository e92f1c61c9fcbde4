//! 批文件编解码
//!
//! 新格式每条记录前有一行帧头，记录正文长度与 sha256：
//!
//! ```text
//! <!-- pmsync:record id="ENG-12" sort="n:12" updated="2024-05-01T12:30:00Z" bytes=311 sha256=… -->
//! <正文，恰好 bytes 字节>
//! ---
//! ```
//!
//! 正文里出现 `\n---\n\n` 不会影响拆分。没有帧头的旧格式文件按分隔符拆分，
//! 只有两种块会开启新记录：
//!
//! - `# ENG-12: <title>` 形式的 issue 标题，id 取冒号前的标识符
//! - `# <title>` 后紧跟 `**Notion URL:** …<page id>` 的页面，id 取 URL 末尾的页面 id
//!
//! 其余块（包括正文里普通的 `# ` 标题）都拼回上一条记录。

use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

use super::record::{LegacyKeyFn, Record, SortKey};
use crate::error::{PmSyncError, Result};
use crate::utils::{format_generated, format_iso_timestamp, parse_iso_datetime};

/// 记录分隔行
pub const RECORD_DELIMITER: &str = "\n---\n\n";

const FRAME_PREFIX: &str = "<!-- pmsync:record ";

const LEGACY_ISSUE_HEADING: &str = r"^# ([A-Za-z0-9]+[-_]\d+):";

const NOTION_URL_PREFIX: &str = "**Notion URL:**";

const FRAME_PATTERN: &str = r#"^<!-- pmsync:record id="([^"]*)" sort="([^"]*)" updated="([^"]*)" bytes=(\d+) sha256=([0-9a-f]{64}) -->$"#;

/// 解析后的批文件
#[derive(Debug, Clone)]
pub struct ParsedBatch {
    /// 分隔符之前的页眉
    pub header: String,
    pub records: Vec<Record>,
    /// 是否为无帧头的旧格式
    pub legacy: bool,
}

/// 渲染一个批文件
pub fn render_batch(
    header_title: &str,
    index: usize,
    generated: &DateTime<Utc>,
    records: &[Record],
) -> String {
    let mut out = format!(
        "# {} {}\n\n_Generated: {}_\n\n---\n\n",
        header_title,
        index,
        format_generated(generated)
    );
    for record in records {
        out.push_str(&render_frame(record));
        out.push('\n');
        out.push_str(&record.body);
        out.push_str(RECORD_DELIMITER);
    }
    out
}

fn render_frame(record: &Record) -> String {
    let updated = record
        .updated_at
        .as_ref()
        .map(format_iso_timestamp)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}id=\"{}\" sort=\"{}\" updated=\"{}\" bytes={} sha256={} -->",
        FRAME_PREFIX,
        escape_attr(&record.id),
        escape_attr(&record.sort_key.encode()),
        updated,
        record.body.len(),
        digest(&record.body)
    )
}

/// 解析批文件内容；任何结构问题都返回 `MalformedBatch`
pub fn parse_batch(path: &Path, text: &str, legacy_key: LegacyKeyFn) -> Result<ParsedBatch> {
    let (header, remainder) = text
        .split_once(RECORD_DELIMITER)
        .ok_or_else(|| PmSyncError::malformed(path, "missing header separator"))?;

    let (records, legacy) = if remainder.starts_with(FRAME_PREFIX) {
        (parse_framed(path, remainder)?, false)
    } else if remainder.trim().is_empty() {
        (Vec::new(), false)
    } else {
        (parse_legacy(path, remainder, legacy_key)?, true)
    };

    Ok(ParsedBatch {
        header: header.to_string(),
        records,
        legacy,
    })
}

fn parse_framed(path: &Path, remainder: &str) -> Result<Vec<Record>> {
    let frame_re = Regex::new(FRAME_PATTERN)?;
    let mut records = Vec::new();
    let mut rest = remainder;

    while !rest.trim().is_empty() {
        let line_end = rest
            .find('\n')
            .ok_or_else(|| PmSyncError::malformed(path, "unterminated record frame"))?;
        let frame = rest[..line_end].trim_end_matches('\r');
        let caps = frame_re.captures(frame).ok_or_else(|| {
            PmSyncError::malformed(path, format!("invalid record frame after {} record(s)", records.len()))
        })?;

        let id = unescape_attr(&caps[1]);
        let sort_key = SortKey::decode(&unescape_attr(&caps[2])).ok_or_else(|| {
            PmSyncError::malformed(path, format!("record {} has an invalid sort key", id))
        })?;
        let updated_at = match &caps[3] {
            "-" => None,
            raw => Some(parse_iso_datetime(raw).map_err(|_| {
                PmSyncError::malformed(path, format!("record {} has an invalid timestamp", id))
            })?),
        };
        let len: usize = caps[4]
            .parse()
            .map_err(|_| PmSyncError::malformed(path, format!("record {} has an invalid length", id)))?;
        let expected_digest = caps[5].to_string();

        let body_start = line_end + 1;
        let body_end = body_start + len;
        if body_end > rest.len() || !rest.is_char_boundary(body_end) {
            return Err(PmSyncError::malformed(path, format!("record {} is truncated", id)));
        }
        let body = &rest[body_start..body_end];
        if digest(body) != expected_digest {
            return Err(PmSyncError::malformed(path, format!("record {} fails its checksum", id)));
        }

        rest = rest[body_end..].strip_prefix(RECORD_DELIMITER).ok_or_else(|| {
            PmSyncError::malformed(path, format!("missing delimiter after record {}", id))
        })?;

        records.push(Record {
            id,
            sort_key,
            updated_at,
            body: body.to_string(),
        });
    }

    Ok(records)
}

fn parse_legacy(path: &Path, remainder: &str, legacy_key: LegacyKeyFn) -> Result<Vec<Record>> {
    let heading_re = Regex::new(LEGACY_ISSUE_HEADING)?;
    let mut blocks: Vec<(String, String)> = Vec::new();

    for block in remainder.split(RECORD_DELIMITER) {
        let stripped = block.trim();
        if stripped.is_empty() {
            continue;
        }
        match legacy_record_id(&heading_re, stripped) {
            Some(id) => blocks.push((id, block.to_string())),
            // 正文中的分隔符把一条记录切成了两段，拼回上一条
            None => match blocks.last_mut() {
                Some((_, raw)) => {
                    raw.push_str(RECORD_DELIMITER);
                    raw.push_str(block);
                }
                None => {
                    return Err(PmSyncError::malformed(
                        path,
                        "first record block has no `# <id>:` heading",
                    ))
                }
            },
        }
    }

    Ok(blocks
        .into_iter()
        .map(|(id, raw)| {
            let body = raw.trim().to_string();
            let sort_key = legacy_key(&id, &body);
            Record {
                id,
                sort_key,
                updated_at: None,
                body,
            }
        })
        .collect())
}

/// 旧格式块的记录 id；不是记录开头时返回 None
fn legacy_record_id(heading_re: &Regex, block: &str) -> Option<String> {
    let first_line = block.lines().next().unwrap_or_default().trim();
    if let Some(caps) = heading_re.captures(first_line) {
        return Some(caps[1].to_string());
    }
    first_line.strip_prefix("# ")?;
    block
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(3)
        .find_map(|line| line.strip_prefix(NOTION_URL_PREFIX))
        .and_then(notion_page_id)
}

/// URL 末尾的 32 位十六进制页面 id，输出带连字符的形式
fn notion_page_id(url: &str) -> Option<String> {
    let url = url.trim();
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let chars: Vec<char> = path.chars().filter(|c| *c != '-').collect();
    if chars.len() < 32 {
        return None;
    }
    let tail = &chars[chars.len() - 32..];
    if !tail.iter().all(char::is_ascii_hexdigit) {
        return None;
    }
    let tail: String = tail.iter().map(char::to_ascii_lowercase).collect();
    Some(format!(
        "{}-{}-{}-{}-{}",
        &tail[0..8],
        &tail[8..12],
        &tail[12..16],
        &tail[16..20],
        &tail[20..32]
    ))
}

fn digest(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

fn escape_attr(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('"', "%22")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

fn unescape_attr(value: &str) -> String {
    value
        .replace("%0D", "\r")
        .replace("%0A", "\n")
        .replace("%22", "\"")
        .replace("%25", "%")
}
