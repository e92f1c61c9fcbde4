//! WAC 价格提取
//!
//! 目标药品 → MEDID → NDC，过滤掉非口服和已停用的 NDC，取每个 NDC 最新的
//! WHN 单价（`09`）与包装价（`10`），按日剂量算出每日费用。

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::reader::{read_pipe_file, strip_leading_zeros, NddfPaths};
use crate::error::{PmSyncError, Result};

/// WHN 单价
pub const WHN_UNIT: &str = "09";
/// WHN 包装价
pub const WHN_PKG: &str = "10";

const UNSET_DATE: &str = "00000000";
const DEFAULT_ROUTE: &str = "PO (default assumption)";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyInfo {
    pub label: String,
    pub daily_units: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

/// 目标药品（从 JSON 读取）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationTarget {
    pub key: String,
    /// 与 RMIID1_MED 中的描述匹配（不区分大小写）
    pub med_desc: String,
    pub display_name: String,
    pub generic_or_brand: String,
    pub frequency: FrequencyInfo,
}

/// 解析出的 MEDNAMES 元数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedMetadata {
    pub medid: String,
    pub gcn_seqno: String,
    pub generic_medid: Option<String>,
}

/// RNDC14 中用到的 NDC 属性
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdcAttributes {
    pub labeler_id: String,
    pub gcn_seqno: String,
    pub package_size: String,
    pub dosage_form: String,
    pub label_name: String,
    pub brand_name: String,
    pub obsolete_date: String,
}

/// 某 NDC 某价格类型的最新价格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestPrice {
    pub effective: NaiveDate,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "NDC")]
    pub ndc: String,
    #[serde(rename = "Route")]
    pub route: Vec<String>,
    #[serde(rename = "Price_WHN")]
    pub price_whn: Option<String>,
    #[serde(rename = "Price_WHN_effective")]
    pub price_whn_effective: Option<String>,
    #[serde(rename = "Package_Price")]
    pub package_price: Option<String>,
    #[serde(rename = "Package_Price_effective")]
    pub package_price_effective: Option<String>,
    #[serde(rename = "Price_per_day")]
    pub price_per_day: Option<String>,
    #[serde(rename = "Generic_or_Brand")]
    pub generic_or_brand: String,
    #[serde(rename = "Frequency")]
    pub frequency: String,
    #[serde(rename = "Daily_units")]
    pub daily_units: String,
    #[serde(rename = "Daily_note")]
    pub daily_note: Option<String>,
    #[serde(rename = "Brand_Generic_NDC")]
    pub brand_generic_ndc: Option<String>,
    #[serde(rename = "Label_Name")]
    pub label_name: Option<String>,
    #[serde(rename = "Brand_Name")]
    pub brand_name: Option<String>,
    #[serde(rename = "Package_Size")]
    pub package_size: Option<String>,
    #[serde(rename = "Obsolete_Date")]
    pub obsolete_date: Option<String>,
}

/// 每个 (名称, 厂商) 只保留价格最新的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondensedRow {
    #[serde(flatten)]
    pub row: PricingRow,
    #[serde(rename = "Labeler")]
    pub labeler: String,
    #[serde(rename = "Price_Effective")]
    pub price_effective: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingReport {
    pub detail_rows: Vec<PricingRow>,
    pub condensed_rows: Vec<CondensedRow>,
}

/// 从 JSON 文件读取目标药品列表
pub fn load_targets(path: &Path) -> Result<Vec<MedicationTarget>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PmSyncError::Nddf(format!("无法读取目标列表 {}: {}", path.display(), e)))?;
    let targets: Vec<MedicationTarget> = serde_json::from_str(&text)?;
    if targets.is_empty() {
        return Err(PmSyncError::Nddf(format!("目标列表为空: {}", path.display())));
    }
    Ok(targets)
}

/// RMIID1_MED：按描述匹配目标，返回 target 下标 → 元数据
pub fn match_med_metadata(targets: &[MedicationTarget], rows: &[Vec<String>]) -> HashMap<usize, MedMetadata> {
    let lookup: HashMap<String, usize> = targets
        .iter()
        .enumerate()
        .map(|(i, t)| (t.med_desc.to_lowercase(), i))
        .collect();

    let mut found = HashMap::new();
    for row in rows.iter().filter(|r| r.len() >= 20) {
        let Some(&index) = lookup.get(&row[4].trim().to_lowercase()) else {
            continue;
        };
        let generic = row[row.len() - 1].trim_start_matches('0');
        found.insert(
            index,
            MedMetadata {
                medid: strip_leading_zeros(&row[0]),
                gcn_seqno: strip_leading_zeros(&row[5]),
                generic_medid: (!generic.is_empty()).then(|| generic.to_string()),
            },
        );
    }
    found
}

/// RMINDC1_NDC_MEDID：每个 target 的 NDC 集合
pub fn collect_target_ndcs(
    metadata: &HashMap<usize, MedMetadata>,
    rows: &[Vec<String>],
) -> HashMap<usize, BTreeSet<String>> {
    let mut by_medid: HashMap<&str, usize> = HashMap::new();
    let mut indices: Vec<&usize> = metadata.keys().collect();
    indices.sort();
    for index in indices {
        by_medid.insert(metadata[index].medid.as_str(), *index);
    }

    let mut ndcs: HashMap<usize, BTreeSet<String>> = HashMap::new();
    for row in rows.iter().filter(|r| r.len() >= 2) {
        if let Some(&index) = by_medid.get(strip_leading_zeros(&row[1]).as_str()) {
            ndcs.entry(index).or_default().insert(row[0].clone());
        }
    }
    ndcs
}

/// NDC → 给药途径描述（大写）
pub fn parse_routes(master_rows: &[Vec<String>], relation_rows: &[Vec<String>]) -> HashMap<String, BTreeSet<String>> {
    let descriptions: HashMap<&str, String> = master_rows
        .iter()
        .filter(|r| r.len() >= 3 && !r[1].is_empty())
        .map(|r| (r[0].as_str(), r[1].trim().to_uppercase()))
        .collect();

    let mut routes: HashMap<String, BTreeSet<String>> = HashMap::new();
    for row in relation_rows.iter().filter(|r| r.len() >= 3) {
        for route_id in [&row[1], &row[2]] {
            if let Some(desc) = descriptions.get(route_id.as_str()) {
                routes.entry(row[0].clone()).or_default().insert(desc.clone());
            }
        }
    }
    routes
}

/// 没有途径信息时按口服处理
pub fn is_oral_route(routes: &BTreeSet<String>) -> bool {
    if routes.is_empty() {
        return true;
    }
    routes.iter().map(|r| r.to_uppercase()).any(|r| {
        matches!(r.as_str(), "ORAL" | "PO" | "PER OS") || r.contains("ORAL")
    })
}

/// RNDC14_NDC_MSTR：只保留目标 NDC
pub fn load_ndc_attributes(rows: &[Vec<String>], ndcs: &HashSet<String>) -> HashMap<String, NdcAttributes> {
    rows.iter()
        .filter(|r| r.len() >= 40 && ndcs.contains(&r[0]))
        .map(|r| {
            (
                r[0].clone(),
                NdcAttributes {
                    labeler_id: r[1].clone(),
                    gcn_seqno: r[2].clone(),
                    package_size: r[3].clone(),
                    dosage_form: r[4].clone(),
                    label_name: r[6].clone(),
                    brand_name: r[7].clone(),
                    obsolete_date: r[26].clone(),
                },
            )
        })
        .collect()
}

/// RNP3_NDC_PRICE：每个 (NDC, 价格类型) 的最新价格；生效日期为空或 `00000000` 的跳过
pub fn load_latest_prices(
    rows: &[Vec<String>],
    ndcs: &HashSet<String>,
    price_types: &[&str],
) -> HashMap<(String, String), LatestPrice> {
    let mut latest: HashMap<(String, String), LatestPrice> = HashMap::new();
    for row in rows.iter().filter(|r| r.len() >= 4) {
        let (ndc, price_type, effective, price) = (&row[0], &row[1], &row[2], row[3].trim());
        if !ndcs.contains(ndc) || !price_types.contains(&price_type.as_str()) {
            continue;
        }
        if effective.is_empty() || effective == UNSET_DATE {
            continue;
        }
        let Ok(effective) = NaiveDate::parse_from_str(effective, "%Y%m%d") else {
            continue;
        };
        let price = if price.is_empty() {
            Decimal::ZERO
        } else {
            match price.parse::<Decimal>() {
                Ok(p) => p,
                Err(e) => {
                    warn!("⚠️ NDC {} 价格 {:?} 无法解析: {}", ndc, price, e);
                    continue;
                }
            }
        };

        let key = (ndc.clone(), price_type.clone());
        let newer = latest.get(&key).map_or(true, |cur| effective > cur.effective);
        if newer {
            latest.insert(key, LatestPrice { effective, price });
        }
    }
    latest
}

/// 金额四舍五入到分（0.5 进位）
pub fn quantize_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_row_date(value: Option<&String>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

/// 每个 (名称, NDC 前 5 位) 取价格生效日期最新的一行，按 (名称, NDC) 排序
pub fn condense_rows(rows: &[PricingRow]) -> Vec<CondensedRow> {
    let mut condensed: HashMap<(String, String), CondensedRow> = HashMap::new();
    for row in rows {
        let labeler: String = row.ndc.chars().take(5).collect();
        let candidate = parse_row_date(row.price_whn_effective.as_ref())
            .or_else(|| parse_row_date(row.package_price_effective.as_ref()));
        let key = (row.name.clone(), labeler.clone());

        let replace = match condensed.get(&key) {
            None => true,
            Some(existing) => {
                let existing_date = parse_row_date(existing.row.price_whn_effective.as_ref())
                    .or_else(|| parse_row_date(existing.row.package_price_effective.as_ref()));
                match (candidate, existing_date) {
                    (Some(c), Some(e)) => c > e,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            }
        };
        if replace {
            condensed.insert(
                key,
                CondensedRow {
                    row: row.clone(),
                    labeler,
                    price_effective: candidate.map(iso_date),
                },
            );
        }
    }

    let mut out: Vec<CondensedRow> = condensed.into_values().collect();
    out.sort_by(|a, b| (&a.row.name, &a.row.ndc).cmp(&(&b.row.name, &b.row.ndc)));
    out
}

/// 已加载的数据集切片
#[derive(Debug, Clone, Default)]
pub struct NddfTables {
    pub med: Vec<Vec<String>>,
    pub ndc_medid: Vec<Vec<String>>,
    pub route_master: Vec<Vec<String>>,
    pub ndc_route: Vec<Vec<String>>,
    pub ndc_master: Vec<Vec<String>>,
    pub ndc_price: Vec<Vec<String>>,
}

impl NddfTables {
    pub fn load(paths: &NddfPaths) -> Result<Self> {
        Ok(Self {
            med: read_pipe_file(&paths.med)?,
            ndc_medid: read_pipe_file(&paths.ndc_medid)?,
            route_master: read_pipe_file(&paths.route_master)?,
            ndc_route: read_pipe_file(&paths.ndc_route)?,
            ndc_master: read_pipe_file(&paths.ndc_master)?,
            ndc_price: read_pipe_file(&paths.ndc_price)?,
        })
    }
}

/// 生成价格报告
pub fn build_report(targets: &[MedicationTarget], tables: &NddfTables) -> Result<PricingReport> {
    let metadata = match_med_metadata(targets, &tables.med);
    let missing: Vec<&str> = targets
        .iter()
        .enumerate()
        .filter(|(i, _)| !metadata.contains_key(i))
        .map(|(_, t)| t.med_desc.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(PmSyncError::Nddf(format!("MEDID not found for: {:?}", missing)));
    }

    let target_ndcs = collect_target_ndcs(&metadata, &tables.ndc_medid);
    let all_ndcs: HashSet<String> = target_ndcs.values().flatten().cloned().collect();
    info!("💊 {} 个目标药品对应 {} 个 NDC", targets.len(), all_ndcs.len());

    let routes = parse_routes(&tables.route_master, &tables.ndc_route);
    let attributes = load_ndc_attributes(&tables.ndc_master, &all_ndcs);
    let prices = load_latest_prices(&tables.ndc_price, &all_ndcs, &[WHN_UNIT, WHN_PKG]);

    let no_routes = BTreeSet::new();
    let mut detail_rows = Vec::new();
    for (index, target) in targets.iter().enumerate() {
        let Some(ndcs) = target_ndcs.get(&index) else {
            continue;
        };
        for ndc in ndcs {
            let ndc_routes = routes.get(ndc).unwrap_or(&no_routes);
            if !is_oral_route(ndc_routes) {
                continue;
            }
            let attrs = attributes.get(ndc);
            if let Some(a) = attrs {
                if !a.obsolete_date.is_empty() && a.obsolete_date != UNSET_DATE {
                    continue;
                }
            }

            let unit = prices.get(&(ndc.clone(), WHN_UNIT.to_string()));
            let package = prices.get(&(ndc.clone(), WHN_PKG.to_string()));
            if unit.is_none() && package.is_none() {
                continue;
            }
            let unit_price = unit.map(|p| quantize_currency(p.price));
            let package_price = package.map(|p| quantize_currency(p.price));
            let per_day = unit_price.map(|p| quantize_currency(p * target.frequency.daily_units));

            detail_rows.push(PricingRow {
                name: target.display_name.clone(),
                ndc: ndc.clone(),
                route: if ndc_routes.is_empty() {
                    vec![DEFAULT_ROUTE.to_string()]
                } else {
                    ndc_routes.iter().cloned().collect()
                },
                price_whn: unit_price.map(money),
                price_whn_effective: unit.map(|p| iso_date(p.effective)),
                package_price: package_price.map(money),
                package_price_effective: package.map(|p| iso_date(p.effective)),
                price_per_day: per_day.map(money),
                generic_or_brand: target.generic_or_brand.clone(),
                frequency: target.frequency.label.clone(),
                daily_units: target.frequency.daily_units.normalize().to_string(),
                daily_note: target.frequency.note.clone(),
                brand_generic_ndc: None,
                label_name: attrs.map(|a| a.label_name.clone()),
                brand_name: attrs.map(|a| a.brand_name.clone()),
                package_size: attrs.map(|a| a.package_size.clone()),
                obsolete_date: attrs
                    .map(|a| a.obsolete_date.clone())
                    .filter(|d| !d.is_empty()),
            });
        }
    }

    let condensed_rows = condense_rows(&detail_rows);
    info!(
        "✅ 价格提取完成: {} 行明细, {} 行汇总",
        detail_rows.len(),
        condensed_rows.len()
    );
    Ok(PricingReport {
        detail_rows,
        condensed_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nddf::reader::parse_pipe_rows;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn med_row(medid: &str, desc: &str, gcn: &str, generic: &str) -> String {
        let mut fields = vec![String::new(); 20];
        fields[0] = medid.to_string();
        fields[4] = desc.to_string();
        fields[5] = gcn.to_string();
        fields[19] = generic.to_string();
        fields.join("|")
    }

    fn ndc_master_row(ndc: &str, label: &str, obsolete: &str) -> String {
        let mut fields = vec![String::new(); 40];
        fields[0] = ndc.to_string();
        fields[1] = ndc[..5].to_string();
        fields[3] = "30".to_string();
        fields[6] = label.to_string();
        fields[7] = "BRAND".to_string();
        fields[26] = obsolete.to_string();
        fields.join("|")
    }

    fn target(key: &str, desc: &str, daily_units: &str) -> MedicationTarget {
        MedicationTarget {
            key: key.to_string(),
            med_desc: desc.to_string(),
            display_name: desc.to_string(),
            generic_or_brand: "Generic".to_string(),
            frequency: FrequencyInfo {
                label: "BID".to_string(),
                daily_units: dec(daily_units),
                note: None,
            },
        }
    }

    #[test]
    fn currency_rounds_half_up() {
        assert_eq!(quantize_currency(dec("2.345")), dec("2.35"));
        assert_eq!(quantize_currency(dec("0.125")), dec("0.13"));
        assert_eq!(quantize_currency(dec("0.124")), dec("0.12"));
        assert_eq!(money(quantize_currency(dec("3"))), "3.00");
    }

    #[test]
    fn oral_route_detection() {
        let set = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<BTreeSet<_>>();
        assert!(is_oral_route(&set(&[])));
        assert!(is_oral_route(&set(&["PO"])));
        assert!(is_oral_route(&set(&["SUBLINGUAL", "ORAL INHALATION"])));
        assert!(!is_oral_route(&set(&["IV", "TOPICAL"])));
    }

    #[test]
    fn latest_price_wins_and_unset_dates_are_skipped() {
        let rows = parse_pipe_rows(
            "11111222233|09|20230101|1.00\n\
             11111222233|09|20240101|1.20\n\
             11111222233|09|00000000|9.99\n\
             11111222233|09|20220101|0.80\n\
             11111222233|01|20250101|5.00\n\
             99999888877|09|20250101|7.00\n",
        );
        let ndcs: HashSet<String> = ["11111222233".to_string()].into_iter().collect();
        let latest = load_latest_prices(&rows, &ndcs, &[WHN_UNIT, WHN_PKG]);
        assert_eq!(latest.len(), 1);
        let price = latest[&("11111222233".to_string(), WHN_UNIT.to_string())];
        assert_eq!(price.price, dec("1.20"));
        assert_eq!(price.effective, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn report_joins_filters_and_condenses() {
        let targets = vec![target("carvedilol", "carvedilol 6.25 mg tablet", "2")];
        let tables = NddfTables {
            med: parse_pipe_rows(&format!(
                "{}\n{}\n",
                med_row("000123", "Carvedilol 6.25 MG Tablet ", "0045", "000000"),
                med_row("000999", "something else", "1", "0")
            )),
            ndc_medid: parse_pipe_rows(
                "11111000001|000123\n11111000002|123\n22222000003|123\n33333000004|123\n44444000005|123\n55555000006|999\n",
            ),
            route_master: parse_pipe_rows("1|oral|x\n2|intravenous|x\n"),
            ndc_route: parse_pipe_rows("33333000004|2|2\n11111000001|1|\n"),
            ndc_master: parse_pipe_rows(&format!(
                "{}\n{}\n",
                ndc_master_row("44444000005", "OLD", "20200101"),
                ndc_master_row("11111000001", "CARVEDILOL", "00000000"),
            )),
            ndc_price: parse_pipe_rows(
                "11111000001|09|20240101|0.1249\n\
                 11111000001|10|20240101|12.345\n\
                 11111000002|09|20240301|0.2000\n\
                 22222000003|10|20230101|40.00\n\
                 33333000004|09|20240101|1.00\n\
                 44444000005|09|20240101|1.00\n",
            ),
        };

        let report = build_report(&targets, &tables).unwrap();
        let ndcs: Vec<&str> = report.detail_rows.iter().map(|r| r.ndc.as_str()).collect();
        // 33333 是静脉给药，44444 已停用
        assert_eq!(ndcs, vec!["11111000001", "11111000002", "22222000003"]);

        let first = &report.detail_rows[0];
        assert_eq!(first.route, vec!["ORAL".to_string()]);
        assert_eq!(first.price_whn.as_deref(), Some("0.12"));
        assert_eq!(first.package_price.as_deref(), Some("12.35"));
        assert_eq!(first.price_per_day.as_deref(), Some("0.24"));
        assert_eq!(first.daily_units, "2");
        assert_eq!(first.label_name.as_deref(), Some("CARVEDILOL"));
        assert_eq!(first.obsolete_date.as_deref(), Some("00000000"));

        let package_only = &report.detail_rows[2];
        assert_eq!(package_only.route, vec![DEFAULT_ROUTE.to_string()]);
        assert_eq!(package_only.price_whn, None);
        assert_eq!(package_only.price_per_day, None);
        assert_eq!(package_only.label_name, None);

        // 11111 厂商保留生效日期更晚的 000002
        let condensed: Vec<(&str, &str, Option<&str>)> = report
            .condensed_rows
            .iter()
            .map(|r| (r.row.ndc.as_str(), r.labeler.as_str(), r.price_effective.as_deref()))
            .collect();
        assert_eq!(
            condensed,
            vec![
                ("11111000002", "11111", Some("2024-03-01")),
                ("22222000003", "22222", Some("2023-01-01")),
            ]
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["condensed_rows"][0]["Labeler"], "11111");
        assert_eq!(json["condensed_rows"][0]["Name"], "carvedilol 6.25 mg tablet");
        assert!(json["detail_rows"][2]["Price_WHN"].is_null());
    }

    #[test]
    fn unknown_medication_is_an_error() {
        let targets = vec![target("x", "no such drug", "1")];
        let err = build_report(&targets, &NddfTables::default()).unwrap_err();
        assert!(matches!(err, PmSyncError::Nddf(msg) if msg.contains("no such drug")));
    }

    #[test]
    fn targets_load_from_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(
            &path,
            r#"[{"key":"spiro","med_desc":"spironolactone 25 mg tablet","display_name":"spironolactone 25 mg tablet",
                "generic_or_brand":"Generic","frequency":{"label":"Daily","daily_units":"0.5","note":"half tablet"}}]"#,
        )
        .unwrap();
        let targets = load_targets(&path).unwrap();
        assert_eq!(targets[0].frequency.daily_units, dec("0.5"));
        assert_eq!(targets[0].frequency.note.as_deref(), Some("half tablet"));

        std::fs::write(&path, "[]").unwrap();
        assert!(load_targets(&path).is_err());
    }
}
