//! NDDF Plus 平面文件读取
//!
//! 文件以 `|` 分隔，没有表头；编码不保证是 UTF-8，按 lossy 方式解码。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PmSyncError, Result};

/// 数据集内各文件位置（相对 "Descriptive and Pricing" 根目录）
#[derive(Debug, Clone)]
pub struct NddfPaths {
    pub med: PathBuf,
    pub ndc_medid: PathBuf,
    pub route_master: PathBuf,
    pub ndc_route: PathBuf,
    pub ndc_master: PathBuf,
    pub ndc_price: PathBuf,
}

impl NddfPaths {
    pub fn new(root: &Path) -> Self {
        let mednames = root.join("NDDF MEDNAMES 3.0");
        let basics = root.join("NDDF BASICS 3.0");
        let generic = basics.join("Generic Formulation and Ingredient");
        let packaged = basics.join("Packaged Product");
        let pricing = basics.join("Pricing");

        Self {
            med: mednames.join("RMIID1_MED"),
            ndc_medid: mednames.join("RMINDC1_NDC_MEDID"),
            route_master: generic.join("RPEIRM0_RT_MSTR"),
            ndc_route: packaged.join("RPEINR0_NDC_RT_RELATION"),
            ndc_master: packaged.join("RNDC14_NDC_MSTR"),
            ndc_price: pricing.join("RNP3_NDC_PRICE"),
        }
    }
}

/// 读取整份文件，每行拆成字段
pub fn read_pipe_file(path: &Path) -> Result<Vec<Vec<String>>> {
    let bytes = fs::read(path)
        .map_err(|e| PmSyncError::Nddf(format!("无法读取 {}: {}", path.display(), e)))?;
    let rows = parse_pipe_rows(&String::from_utf8_lossy(&bytes));
    debug!("{}: {} 行", path.display(), rows.len());
    Ok(rows)
}

pub fn parse_pipe_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(|line| line.split('|').map(str::to_string).collect())
        .collect()
}

/// 去掉前导 0；全是 0 时返回 `"0"`
pub fn strip_leading_zeros(value: &str) -> String {
    let stripped = value.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rows_split_on_pipes_and_tolerate_bad_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("RNP3_NDC_PRICE");
        fs::write(&path, b"00001|09|20240101|1.5\r\n00002|10|\xff|2\n").unwrap();

        let rows = read_pipe_file(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["00001", "09", "20240101", "1.5"]);
        assert_eq!(rows[1][2], "\u{fffd}");
    }

    #[test]
    fn missing_file_is_an_nddf_error() {
        let err = read_pipe_file(Path::new("/nonexistent/RMIID1_MED")).unwrap_err();
        assert!(matches!(err, PmSyncError::Nddf(_)));
    }

    #[test]
    fn leading_zeros() {
        assert_eq!(strip_leading_zeros("000123"), "123");
        assert_eq!(strip_leading_zeros("0000"), "0");
        assert_eq!(strip_leading_zeros(""), "0");
    }
}
