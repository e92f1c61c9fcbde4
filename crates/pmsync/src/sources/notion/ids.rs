//! Notion id / 文件名工具

/// 文件系统不接受的字符
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// 文件名最大长度（字符）
const MAX_FILENAME_CHARS: usize = 200;

/// 去掉 id 里的 `-`
pub fn clean_page_id(page_id: &str) -> String {
    page_id.replace('-', "")
}

/// 格式化为 Notion API 使用的 8-4-4-4-12 形式；长度不是 32 时原样返回去横线的值
pub fn format_page_id_with_dashes(page_id: &str) -> String {
    let clean = clean_page_id(page_id);
    if clean.len() == 32 && clean.is_ascii() {
        format!(
            "{}-{}-{}-{}-{}",
            &clean[..8],
            &clean[8..12],
            &clean[12..16],
            &clean[16..20],
            &clean[20..]
        )
    } else {
        clean
    }
}

/// 从页面 URL 中取出页面 id
///
/// 支持 `https://www.notion.so/<id>`、`https://www.notion.so/<Title>-<id>?v=...`。
pub fn extract_page_id_from_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let path = url
        .trim()
        .trim_start_matches("https://www.notion.so/")
        .trim_start_matches("https://notion.so/");
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    let clean = clean_page_id(last_segment);
    // 带标题前缀的 URL，id 是末尾 32 位十六进制
    if clean.len() > 32 && clean.is_ascii() {
        let tail = &clean[clean.len() - 32..];
        if tail.chars().all(|c| c.is_ascii_hexdigit()) {
            return format_page_id_with_dashes(tail);
        }
    }
    format_page_id_with_dashes(&clean)
}

/// 清理成可用作文件名 / 目录名的字符串
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(MAX_FILENAME_CHARS).collect()
}
