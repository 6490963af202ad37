use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use tracing::debug;

use super::grouping::{group_rows, sheet_names};
use super::{AnalysisReport, ReportRow, ReportTable};
use crate::app::ports::AnalysisPlugin;
use crate::common::error::AnalysisError;
use crate::domain::{FilterBy, PersistedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceResult {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "NO SPEC")]
    NoSpec,
}

impl ComplianceResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceResult::Pass => "PASS",
            ComplianceResult::Fail => "FAIL",
            ComplianceResult::NoSpec => "NO SPEC",
        }
    }

    /// Compare measured extremes against the bound spec window. A bound with
    /// no measurement to compare falls back to the mean.
    pub fn evaluate(row: &PersistedRecord) -> Self {
        let capture = &row.record.capture;
        let rail = &row.record.rail;
        if rail.spec_min.is_none() && rail.spec_max.is_none() {
            return ComplianceResult::NoSpec;
        }

        let low = capture.min.or(capture.mean);
        let high = capture.max.or(capture.mean);
        let under = match (rail.spec_min, low) {
            (Some(bound), Some(measured)) => measured < bound,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let over = match (rail.spec_max, high) {
            (Some(bound), Some(measured)) => measured > bound,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if under || over {
            ComplianceResult::Fail
        } else {
            ComplianceResult::Pass
        }
    }
}

/// Reference analysis: one sheet per group, one row per capture with its
/// spec window and a pass/fail verdict.
#[derive(Debug, Clone)]
pub struct SpecComplianceAnalysis {
    label: String,
}

impl SpecComplianceAnalysis {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    fn report_row(row: &PersistedRecord) -> ReportRow {
        let key = &row.record.key;
        let capture = &row.record.capture;
        let rail = &row.record.rail;

        let mut out = ReportRow::new();
        out.insert("_id".into(), json!(row.id));
        out.insert("dut".into(), json!(key.dut));
        out.insert("pba".into(), json!(key.pba));
        out.insert("rework".into(), json!(key.rework));
        out.insert("serial_number".into(), json!(key.serial_number));
        out.insert("runid".into(), json!(key.runid));
        out.insert("scope_channel".into(), json!(key.scope_channel));
        out.insert("testpoint".into(), json!(key.testpoint));
        out.insert("trace_order".into(), json!(rail.trace_order));
        out.insert("min".into(), json!(capture.min));
        out.insert("mean".into(), json!(capture.mean));
        out.insert("max".into(), json!(capture.max));
        out.insert("spec_min".into(), json!(rail.spec_min));
        out.insert("spec_max".into(), json!(rail.spec_max));
        out.insert("expected_nominal".into(), json!(rail.expected_nominal));
        out.insert(
            "result".into(),
            Value::String(ComplianceResult::evaluate(row).as_str().to_string()),
        );
        out
    }
}

fn report_order(a: &&PersistedRecord, b: &&PersistedRecord) -> Ordering {
    let trace = match (a.record.rail.trace_order, b.record.rail.trace_order) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    trace
        .then_with(|| a.record.key.testpoint.cmp(&b.record.key.testpoint))
        .then_with(|| a.record.key.cmp(&b.record.key))
}

impl AnalysisPlugin for SpecComplianceAnalysis {
    fn name(&self) -> &str {
        &self.label
    }

    fn execute(&self, table: &[PersistedRecord], filter_by: FilterBy) -> Result<AnalysisReport, AnalysisError> {
        if table.is_empty() {
            return Err(AnalysisError::Failed {
                test: self.label.clone(),
                message: "no keyed rows survived cleanup".to_string(),
            });
        }
        let groups = group_rows(table, filter_by);
        let keys: Vec<Vec<String>> = groups.iter().map(|g| g.key.clone()).collect();
        let names = sheet_names(&keys, &self.label);

        let mut report = AnalysisReport::new();
        for (name, mut group) in names.into_iter().zip(groups) {
            group.rows.sort_by(report_order);
            let rows = group.rows.into_iter().map(Self::report_row).collect();
            report.insert(name, ReportTable { rows });
        }

        debug!(
            analysis = %self.label,
            filter_by = filter_by.as_str(),
            sheets = report.sheets.len(),
            "Built compliance report"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaptureStats, EnrichedRecord, RailTags, SampleKey};
    use uuid::Uuid;

    fn row(testpoint: &str, trace: Option<u32>, min: f64, max: f64, spec: Option<(f64, f64)>) -> PersistedRecord {
        PersistedRecord {
            id: Uuid::new_v4(),
            record: EnrichedRecord {
                key: SampleKey {
                    dut: "DUT7".into(),
                    pba: "PBA".into(),
                    rework: "1".into(),
                    serial_number: "SN9".into(),
                    runid: "4".into(),
                    scope_channel: "CH3".into(),
                    testpoint: testpoint.into(),
                },
                capture: CaptureStats {
                    min: Some(min),
                    mean: Some((min + max) / 2.0),
                    max: Some(max),
                    ..Default::default()
                },
                rail: RailTags {
                    trace_order: trace,
                    spec_min: spec.map(|s| s.0),
                    spec_max: spec.map(|s| s.1),
                    ..Default::default()
                },
                extra: Default::default(),
            },
        }
    }

    #[test]
    fn test_verdicts() {
        assert_eq!(ComplianceResult::evaluate(&row("A", None, 1.7, 1.9, Some((1.6, 2.0)))), ComplianceResult::Pass);
        assert_eq!(ComplianceResult::evaluate(&row("A", None, 1.5, 1.9, Some((1.6, 2.0)))), ComplianceResult::Fail);
        assert_eq!(ComplianceResult::evaluate(&row("A", None, 1.7, 2.1, Some((1.6, 2.0)))), ComplianceResult::Fail);
        assert_eq!(ComplianceResult::evaluate(&row("A", None, 1.7, 2.1, None)), ComplianceResult::NoSpec);
    }

    #[test]
    fn test_rows_ordered_by_trace_then_testpoint() {
        let table = vec![
            row("ZZ", None, 1.0, 1.0, None),
            row("V5P0", Some(2), 5.0, 5.0, None),
            row("AA", None, 1.0, 1.0, None),
            row("V3P3", Some(1), 3.3, 3.3, None),
        ];
        let report = SpecComplianceAnalysis::new("Sequencing")
            .execute(&table, FilterBy::Default)
            .unwrap();

        let sheet = report.sheet("Sequencing").unwrap();
        let order: Vec<&str> = sheet.rows.iter().map(|r| r["testpoint"].as_str().unwrap()).collect();
        assert_eq!(order, vec!["V3P3", "V5P0", "AA", "ZZ"]);
        assert_eq!(sheet.rows[0]["result"], "NO SPEC");
    }

    #[test]
    fn test_sheet_per_group() {
        let mut other = row("V1", None, 1.0, 1.0, None);
        other.record.key.dut = "DUT8".into();
        let table = vec![row("V1", None, 1.0, 1.0, None), other];

        let report = SpecComplianceAnalysis::new("Inrush")
            .execute(&table, FilterBy::Dut)
            .unwrap();
        let names: Vec<&String> = report.sheets.keys().collect();
        assert_eq!(names, vec!["DUT7", "DUT8"]);
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let err = SpecComplianceAnalysis::new("Load Profile")
            .execute(&[], FilterBy::Default)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Failed { ref test, .. } if test == "Load Profile"));
    }
}
