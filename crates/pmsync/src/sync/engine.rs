//! 对账引擎
//!
//! 一次 run 分两段：先对所有集合做规划（读快照、合并、重新分批、比对），
//! 再统一落盘。规划阶段的任何错误都会在写任何文件之前中止整个 run；
//! 状态文档最后写，进程中途被杀时水位保持不变，下次重新抓取同一窗口。
//!
//! 引擎不做重试，也不知道记录来自哪个数据源。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::baseline::{load_baseline, Baseline};
use super::batch::{batch_file_name, diff_batches, rebatch, BatchDiff};
use super::codec::render_batch;
use super::merge::{merge, replace_all, MergeOutcome};
use super::record::{LegacyKeyFn, Record, SourceAdapter};
use super::status_doc::StatusDocument;
use super::watermark::{advance_watermark, summarize, ChangeSet, SyncWatermark};
use crate::error::{PmSyncError, Result};
use crate::utils::{format_iso_timestamp, write_atomic};

/// 同步模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// 只合并水位之后变化的记录
    Incremental,
    /// 源端返回的就是全集，替换快照
    Full,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Incremental => "incremental",
            SyncMode::Full => "full",
        }
    }
}

/// 一组共享同一目录与文件名前缀的记录
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub dir: PathBuf,
    pub prefix: String,
    /// 批文件页眉：`# <header_title> <index>`
    pub header_title: String,
    pub records: Vec<Record>,
    /// 本次抓取失败的 id：全量模式下沿用快照里的旧内容，不算移除
    pub retained_ids: HashSet<String>,
    pub legacy_key: LegacyKeyFn,
}

impl Collection {
    pub fn new<A: SourceAdapter>(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        header_title: impl Into<String>,
        records: Vec<Record>,
    ) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            prefix: prefix.into(),
            header_title: header_title.into(),
            records,
            retained_ids: HashSet::new(),
            legacy_key: A::legacy_sort_key,
        }
    }

    pub fn with_retained<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.retained_ids.extend(ids);
        self
    }
}

/// 一次 run 的结果
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub rewritten: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub updated_ids: Vec<String>,
    pub new_ids: Vec<String>,
    pub removed_ids: Vec<String>,
    pub watermark: SyncWatermark,
    pub summary_line: String,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.rewritten.is_empty()
            && self.removed.is_empty()
            && self.updated_ids.is_empty()
            && self.new_ids.is_empty()
            && self.removed_ids.is_empty()
    }
}

/// 单个集合的落盘计划
#[derive(Debug)]
struct CollectionPlan {
    name: String,
    outcome: MergeOutcome,
    diff: BatchDiff,
    writes: Vec<(PathBuf, String)>,
    deletes: Vec<PathBuf>,
}

pub struct ReconciliationEngine {
    capacity: usize,
    /// 摘要中的文件路径相对于该目录展示
    display_root: Option<PathBuf>,
}

impl ReconciliationEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            display_root: None,
        }
    }

    pub fn with_display_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.display_root = Some(root.into());
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 执行一次对账并落盘
    pub fn run(
        &self,
        status: &StatusDocument,
        collections: Vec<Collection>,
        mode: SyncMode,
        now: DateTime<Utc>,
    ) -> Result<SyncReport> {
        info!(
            "🔄 开始对账 ({}): {} 个集合, 上次水位 {}",
            mode.as_str(),
            collections.len(),
            status
                .watermark()
                .map(|t| format_iso_timestamp(&t))
                .unwrap_or_else(|| "None".to_string())
        );

        let mut plans = Vec::with_capacity(collections.len());
        for collection in collections {
            plans.push(self.plan_collection(collection, mode, now)?);
        }

        let mut changes = ChangeSet::default();
        for plan in &plans {
            changes.updated_ids.extend(plan.outcome.updated_ids.iter().cloned());
            changes.new_ids.extend(plan.outcome.new_ids.iter().cloned());
            changes.removed_ids.extend(plan.outcome.removed_ids.iter().cloned());
            changes
                .rewritten_files
                .extend(plan.writes.iter().map(|(p, _)| self.display_path(p)));
            changes
                .removed_files
                .extend(plan.deletes.iter().map(|p| self.display_path(p)));
        }

        let summary_line = summarize(&changes, &now);
        let touched: Vec<&Record> = plans
            .iter()
            .flat_map(|plan| {
                let touched = plan.outcome.touched();
                plan.outcome
                    .records
                    .iter()
                    .filter(move |r| touched.contains(&r.id))
            })
            .collect();
        let current = SyncWatermark::new(status.watermark());
        let watermark = advance_watermark(&current, &touched, now, summary_line.clone());
        let new_timestamp = watermark.timestamp.unwrap_or(now);

        // 状态文档在写任何文件之前渲染，结构错误不会留下半截结果
        let status_text = status.render_update(&new_timestamp, &summary_line)?;

        let mut report = SyncReport {
            mode,
            rewritten: Vec::new(),
            removed: Vec::new(),
            updated_ids: changes.updated_ids,
            new_ids: changes.new_ids,
            removed_ids: changes.removed_ids,
            watermark,
            summary_line,
        };

        for plan in plans {
            debug!(
                "集合 {} 重写 {:?} 删除 {:?}",
                plan.name, plan.diff.rewrite, plan.diff.delete
            );
            for (path, content) in plan.writes {
                write_atomic(&path, &content)?;
                info!("✅ 已更新 {}", self.display_path(&path));
                report.rewritten.push(path);
            }
            for path in plan.deletes {
                if path.exists() {
                    fs::remove_file(&path).map_err(|e| {
                        PmSyncError::IO(format!("删除 {} 失败: {}", path.display(), e))
                    })?;
                    info!("🗑️ 已删除过期批文件 {}", self.display_path(&path));
                }
                report.removed.push(path);
            }
        }

        write_atomic(status.path(), &status_text)?;
        info!(
            "✅ 状态文档已更新 → {}",
            format_iso_timestamp(&new_timestamp)
        );
        Ok(report)
    }

    fn plan_collection(
        &self,
        collection: Collection,
        mode: SyncMode,
        now: DateTime<Utc>,
    ) -> Result<CollectionPlan> {
        let Collection {
            name,
            dir,
            prefix,
            header_title,
            records,
            retained_ids,
            legacy_key,
        } = collection;

        let baseline: Baseline = load_baseline(&dir, &prefix, self.capacity, legacy_key)?;
        let incoming = records.len();
        let outcome = match mode {
            SyncMode::Incremental => merge(baseline.records.clone(), records),
            SyncMode::Full => {
                // 快照副本放在前面，源端若仍返回了同一 id 则以源端为准
                let mut full: Vec<Record> = baseline
                    .records
                    .iter()
                    .filter(|r| retained_ids.contains(&r.id))
                    .cloned()
                    .collect();
                if !full.is_empty() {
                    warn!("⚠️ 集合 {}: {} 条记录抓取失败，保留旧内容", name, full.len());
                }
                full.extend(records);
                replace_all(baseline.records.clone(), full)
            }
        };

        let batches = rebatch(&outcome.records, self.capacity);
        let mut diff = diff_batches(&baseline.batches, &batches, &outcome.touched());
        // 旧格式文件整体换成带帧头的格式
        for index in &baseline.legacy_indices {
            if batches.iter().any(|b| b.index == *index) {
                diff.rewrite.insert(*index);
            }
        }

        let mut writes = Vec::with_capacity(diff.rewrite.len());
        for (batch, chunk) in batches.iter().zip(outcome.records.chunks(self.capacity)) {
            if !diff.rewrite.contains(&batch.index) {
                continue;
            }
            let path = baseline
                .path_of(batch.index)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dir.join(batch_file_name(&prefix, batch.index)));
            writes.push((path, render_batch(&header_title, batch.index, &now, chunk)));
        }

        let deletes = diff
            .delete
            .iter()
            .filter_map(|index| baseline.path_of(*index).map(Path::to_path_buf))
            .collect();

        info!(
            "📦 集合 {}: 快照 {} 条, 收到 {} 条, 更新 {} 新增 {} 移除 {}, 重写 {} 个批文件, 删除 {} 个",
            name,
            baseline.records.len(),
            incoming,
            outcome.updated_ids.len(),
            outcome.new_ids.len(),
            outcome.removed_ids.len(),
            diff.rewrite.len(),
            diff.delete.len()
        );

        Ok(CollectionPlan {
            name,
            outcome,
            diff,
            writes,
            deletes,
        })
    }

    fn display_path(&self, path: &Path) -> String {
        self.display_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
