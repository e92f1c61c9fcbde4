//! 时间处理工具模块
//!
//! # 约定
//!
//! - **水位/比较**: 一律 `DateTime<Utc>`
//! - **状态文档**: ISO 8601 秒级精度，以 `Z` 结尾（`2024-05-01T12:30:00Z`）
//! - **批文件页眉**: `YYYY-MM-DD HH:MM:SS`（UTC）
//! - **摘要行**: `YYYY-MM-DD`（UTC）

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{PmSyncError, Result};

/// 解析 ISO 8601 时间戳
///
/// 支持 `Z` / `+hh:mm` 后缀与小数秒；无时区信息时按 UTC 处理。
pub fn parse_iso_datetime(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(PmSyncError::InvalidData(format!("无法解析时间戳: {}", value)))
}

/// 格式化为状态文档使用的 ISO 串（秒级，`Z` 结尾）
pub fn format_iso_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 截取 ISO 时间戳的日期部分（`2024-05-01T12:30:00Z` → `2024-05-01`）
pub fn date_part(value: &str) -> &str {
    value.split('T').next().unwrap_or(value)
}

/// 批文件页眉中的生成时间
pub fn format_generated(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 摘要行使用的日期
pub fn format_day(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zulu_and_offsets() {
        let a = parse_iso_datetime("2024-05-01T12:30:00Z").unwrap();
        let b = parse_iso_datetime("2024-05-01T14:30:00+02:00").unwrap();
        assert_eq!(a, b);

        let frac = parse_iso_datetime("2024-05-01T12:30:00.123Z").unwrap();
        assert_eq!(format_iso_timestamp(&frac), "2024-05-01T12:30:00Z");
    }

    #[test]
    fn naive_values_are_utc() {
        let dt = parse_iso_datetime("2024-05-01T12:30:00").unwrap();
        assert_eq!(format_iso_timestamp(&dt), "2024-05-01T12:30:00Z");
        let day = parse_iso_datetime("2024-05-01").unwrap();
        assert_eq!(format_iso_timestamp(&day), "2024-05-01T00:00:00Z");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_iso_datetime("yesterday").is_err());
    }

    #[test]
    fn date_helpers() {
        assert_eq!(date_part("2024-05-01T12:30:00Z"), "2024-05-01");
        assert_eq!(date_part("2024-05-01"), "2024-05-01");
        let dt = parse_iso_datetime("2024-05-01T08:09:10Z").unwrap();
        assert_eq!(format_generated(&dt), "2024-05-01 08:09:10");
        assert_eq!(format_day(&dt), "2024-05-01");
    }
}
