//! Notion 页面 → markdown

use super::client::{BlockNode, NotionBlock, NotionDatabase, NotionPage, RichText};
use crate::utils::time::date_part;

/// rich text 数组拼成纯文本；页面引用写成 `[标题]`
pub fn extract_text(rich_text: &[RichText]) -> String {
    let mut out = String::new();
    for item in rich_text {
        match item.kind.as_str() {
            "text" => {
                if let Some(text) = &item.text {
                    out.push_str(&text.content);
                }
            }
            "mention" => {
                let is_page = item.mention.as_ref().is_some_and(|m| m.kind == "page");
                if is_page {
                    out.push('[');
                    out.push_str(&item.plain_text);
                    out.push(']');
                } else {
                    out.push_str(&item.plain_text);
                }
            }
            _ => out.push_str(&item.plain_text),
        }
    }
    out
}

fn block_text(block: &NotionBlock) -> String {
    let rich_text: Vec<RichText> = block
        .payload()
        .and_then(|p| p.get("rich_text"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    extract_text(&rich_text)
}

fn payload_str<'a>(block: &'a NotionBlock, key: &str) -> &'a str {
    block
        .payload()
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn payload_flag(block: &NotionBlock, key: &str) -> bool {
    block
        .payload()
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn render_block(block: &NotionBlock, indent: &str, out: &mut String) {
    let text = block_text(block);
    let has_text = !text.trim().is_empty();

    match block.kind.as_str() {
        "paragraph" if has_text => out.push_str(&format!("{}{}\n", indent, text)),
        "heading_1" if has_text => out.push_str(&format!("{}# {}\n\n", indent, text)),
        "heading_2" if has_text => out.push_str(&format!("{}## {}\n\n", indent, text)),
        "heading_3" if has_text => out.push_str(&format!("{}### {}\n\n", indent, text)),
        "bulleted_list_item" if has_text => out.push_str(&format!("{}- {}\n", indent, text)),
        "numbered_list_item" if has_text => out.push_str(&format!("{}1. {}\n", indent, text)),
        "to_do" if has_text => {
            let checkbox = if payload_flag(block, "checked") { "[x]" } else { "[ ]" };
            out.push_str(&format!("{}{} {}\n", indent, checkbox, text));
        }
        "quote" if has_text => out.push_str(&format!("{}> {}\n\n", indent, text)),
        "code" if has_text => {
            let language = payload_str(block, "language");
            out.push_str(&format!(
                "{indent}```{language}\n{indent}{text}\n{indent}```\n\n",
                indent = indent,
                language = language,
                text = text
            ));
        }
        "divider" => out.push_str(&format!("{}---\n\n", indent)),
        "table" => out.push_str(&format!("{}[Table block - content not fully parsed]\n\n", indent)),
        _ => {}
    }
}

/// block 树渲染为 markdown，每深一层缩进两个空格
pub fn blocks_to_markdown(blocks: &[BlockNode], depth: usize) -> String {
    let mut out = String::new();
    // 显式栈，子节点紧跟在父节点之后输出
    let mut stack: Vec<(&BlockNode, usize)> = blocks.iter().rev().map(|b| (b, depth)).collect();
    while let Some((node, level)) = stack.pop() {
        render_block(&node.block, &"  ".repeat(level), &mut out);
        stack.extend(node.children.iter().rev().map(|c| (c, level + 1)));
    }
    out
}

/// 页面标题：title 属性 → `Page_<id 前 8 位>`（无属性）→ `Untitled Page`
pub fn page_title(page: &NotionPage) -> String {
    if let Some(title) = page
        .properties
        .values()
        .find(|p| p.kind == "title" && !p.title.is_empty())
    {
        return extract_text(&title.title);
    }
    if page.properties.is_empty() && !page.id.is_empty() {
        let prefix: String = page.id.chars().take(8).collect();
        return format!("Page_{}", prefix);
    }
    "Untitled Page".to_string()
}

pub fn database_title(database: &NotionDatabase) -> String {
    if database.title.is_empty() {
        "Untitled Database".to_string()
    } else {
        extract_text(&database.title)
    }
}

/// 完整页面 markdown：标题、元数据、正文
pub fn format_page_markdown(page: &NotionPage, blocks: &[BlockNode], page_url: &str) -> String {
    let mut out = format!("# {}\n\n", page_title(page));
    out.push_str(&format!("**Notion URL:** {}\n", page_url));
    if let Some(created) = page.created_time.as_deref().filter(|v| !v.is_empty()) {
        out.push_str(&format!("**Created:** {}\n", date_part(created)));
    }
    if let Some(edited) = page.last_edited_time.as_deref().filter(|v| !v.is_empty()) {
        out.push_str(&format!("**Last Edited:** {}\n", date_part(edited)));
    }
    out.push_str("\n---\n\n");
    out.push_str(&blocks_to_markdown(blocks, 0));
    out
}
