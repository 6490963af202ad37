//! Report shapes returned by analysis plugins, plus the grouping helpers
//! shared by every plugin.

pub mod grouping;
pub mod spec_compliance;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use grouping::{group_rows, sheet_names, RowGroup};
pub use spec_compliance::{ComplianceResult, SpecComplianceAnalysis};

pub type ReportRow = Map<String, Value>;

/// One report sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportTable {
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Sheet-keyed plugin result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisReport {
    pub sheets: BTreeMap<String, ReportTable>,
}

impl AnalysisReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: ReportTable) {
        self.sheets.insert(name.into(), table);
    }

    pub fn sheet(&self, name: &str) -> Option<&ReportTable> {
        self.sheets.get(name)
    }

    pub fn row_count(&self) -> usize {
        self.sheets.values().map(ReportTable::len).sum()
    }
}
