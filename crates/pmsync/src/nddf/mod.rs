//! NDDF Plus 价格提取
//!
//! 读取 NDDF Plus "Descriptive and Pricing" 平面文件，按目标药品列表生成
//! JSON 价格报告（明细行 + 按厂商汇总行）。

pub mod pricing;
pub mod reader;

use std::path::Path;

use tracing::info;

pub use pricing::{
    build_report, load_targets, quantize_currency, CondensedRow, FrequencyInfo, MedicationTarget,
    NddfTables, PricingReport, PricingRow, WHN_PKG, WHN_UNIT,
};
pub use reader::{read_pipe_file, NddfPaths};

use crate::config::NddfConfig;
use crate::error::Result;
use crate::utils::write_atomic;

/// 读取数据集并生成报告
pub fn extract_pricing(config: &NddfConfig, targets_path: &Path) -> Result<PricingReport> {
    let targets = load_targets(targets_path)?;
    info!(
        "📂 NDDF 数据目录 {}，{} 个目标药品",
        config.root.display(),
        targets.len()
    );
    let tables = NddfTables::load(&NddfPaths::new(&config.root))?;
    build_report(&targets, &tables)
}

impl PricingReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 写到文件（原子替换）
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut text = self.to_json_pretty()?;
        text.push('\n');
        write_atomic(path, &text)?;
        info!("✅ 价格报告已写入 {}", path.display());
        Ok(())
    }
}
