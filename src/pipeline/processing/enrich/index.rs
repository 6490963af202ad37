use std::collections::HashMap;

use super::TaggedSample;

/// Row positions by testpoint name, built once per enrichment pass after
/// renaming so each workbook entry is a lookup instead of a table scan.
#[derive(Debug, Default)]
pub struct TestpointIndex {
    rows: HashMap<String, Vec<usize>>,
}

impl TestpointIndex {
    pub fn build(table: &[TaggedSample]) -> Self {
        let mut rows: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, row) in table.iter().enumerate() {
            if let Some(testpoint) = &row.sample.testpoint {
                rows.entry(testpoint.clone()).or_default().push(position);
            }
        }
        Self { rows }
    }

    pub fn rows(&self, testpoint: &str) -> &[usize] {
        self.rows.get(testpoint).map(Vec::as_slice).unwrap_or(&[])
    }
}
