//! 记录模型与数据源适配器

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

/// 记录的排序键
///
/// 数字键（issue 编号）排在文本键（页面标题）之前；同类之间自然序。
/// 排序键可以重复，重复时按 id 决胜。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SortKey {
    Numeric(u64),
    Text(String),
}

impl SortKey {
    /// 编码为批文件帧里的 `sort` 属性：`n:12` / `t:title`
    pub fn encode(&self) -> String {
        match self {
            SortKey::Numeric(n) => format!("n:{}", n),
            SortKey::Text(t) => format!("t:{}", t),
        }
    }

    pub fn decode(value: &str) -> Option<SortKey> {
        if let Some(n) = value.strip_prefix("n:") {
            return n.parse().ok().map(SortKey::Numeric);
        }
        value.strip_prefix("t:").map(|t| SortKey::Text(t.to_string()))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Numeric(n) => write!(f, "{}", n),
            SortKey::Text(t) => write!(f, "{}", t),
        }
    }
}

/// 待同步的远端实体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 稳定的外部标识（issue identifier / page id）
    pub id: String,
    pub sort_key: SortKey,
    /// 源端最后修改时间；旧格式批文件里读出的记录没有该值
    pub updated_at: Option<DateTime<Utc>>,
    /// 已渲染好的 markdown，引擎不解析
    pub body: String,
}

impl Record {
    pub fn new<I: Into<String>, B: Into<String>>(
        id: I,
        sort_key: SortKey,
        updated_at: Option<DateTime<Utc>>,
        body: B,
    ) -> Self {
        Self {
            id: id.into(),
            sort_key,
            updated_at,
            body: body.into(),
        }
    }

    /// 全序：先排序键，再 id
    pub fn total_cmp(&self, other: &Record) -> Ordering {
        self.sort_key
            .cmp(&other.sort_key)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// 数据源适配器：把某个源的原始条目转换成引擎能处理的 `Record`
pub trait SourceAdapter {
    type Item;

    fn id(&self, item: &Self::Item) -> String;

    fn sort_key(&self, item: &Self::Item) -> SortKey;

    fn updated_at(&self, item: &Self::Item) -> Option<DateTime<Utc>>;

    /// 渲染完整正文
    fn render(&self, item: &Self::Item) -> String;

    fn to_record(&self, item: &Self::Item) -> Record {
        Record::new(
            self.id(item),
            self.sort_key(item),
            self.updated_at(item),
            self.render(item),
        )
    }

    /// 旧格式批文件没有排序键，只能从 id 与正文推导
    fn legacy_sort_key(id: &str, body: &str) -> SortKey
    where
        Self: Sized;
}

/// 旧格式记录的排序键推导函数
pub type LegacyKeyFn = fn(&str, &str) -> SortKey;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_sort_before_text_keys() {
        let mut keys = vec![
            SortKey::Text("Alpha".into()),
            SortKey::Numeric(10),
            SortKey::Numeric(2),
            SortKey::Text("Beta".into()),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                SortKey::Numeric(2),
                SortKey::Numeric(10),
                SortKey::Text("Alpha".into()),
                SortKey::Text("Beta".into()),
            ]
        );
    }

    #[test]
    fn sort_key_encoding_is_reversible() {
        for key in [SortKey::Numeric(504), SortKey::Text("Roadmap: Q3 \"draft\"".into())] {
            assert_eq!(SortKey::decode(&key.encode()), Some(key));
        }
        assert_eq!(SortKey::decode("x:1"), None);
        assert_eq!(SortKey::decode("n:abc"), None);
    }

    #[test]
    fn ties_on_sort_key_break_by_id() {
        let a = Record::new("B-7", SortKey::Numeric(7), None, "");
        let b = Record::new("A-7", SortKey::Numeric(7), None, "");
        assert_eq!(a.total_cmp(&b), Ordering::Greater);
    }
}
