/// 增量对账模块
///
/// 职责：
/// - 读取上一次落盘的批文件快照
/// - 把源端变化的记录合并进全局有序序列
/// - 重新分批并只重写内容变化的批文件
/// - 推进水位并在状态文档里写入摘要

pub mod record;
pub mod codec;
pub mod baseline;
pub mod merge;
pub mod batch;
pub mod watermark;
pub mod status_doc;
pub mod engine;

pub use record::{LegacyKeyFn, Record, SortKey, SourceAdapter};
pub use codec::{parse_batch, render_batch, ParsedBatch, RECORD_DELIMITER};
pub use baseline::{load_baseline, Baseline};
pub use merge::{merge, replace_all, MergeOutcome};
pub use batch::{batch_file_name, diff_batches, rebatch, BatchDiff, BatchFile};
pub use watermark::{advance_watermark, summarize, ChangeSet, SyncWatermark};
pub use status_doc::{StatusDocument, StatusLayout};
pub use engine::{Collection, ReconciliationEngine, SyncMode, SyncReport};
