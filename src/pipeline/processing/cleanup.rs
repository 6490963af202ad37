use tracing::info;

use super::enrich::{self, steps, EnrichmentSummary, TaggedSample};
use crate::common::constants::SHEET_RAILS_TO_RENAME;
use crate::common::error::EnrichError;
use crate::domain::{EnrichedTable, RawSample, Workbook};

/// How a test type turns raw captures plus its workbook into the table that
/// gets persisted.
pub trait CleanupStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn clean(
        &self,
        raw: Vec<RawSample>,
        workbook: &Workbook,
    ) -> Result<(EnrichedTable, EnrichmentSummary), EnrichError>;
}

/// Full rail enrichment for waveform-based tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaveformCleanup;

impl CleanupStrategy for WaveformCleanup {
    fn name(&self) -> &'static str {
        "waveform"
    }

    fn clean(
        &self,
        raw: Vec<RawSample>,
        workbook: &Workbook,
    ) -> Result<(EnrichedTable, EnrichmentSummary), EnrichError> {
        enrich::enrich_with_summary(raw, workbook)
    }
}

/// Renaming and key pruning only. Link captures (BER) carry no rail specs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureCleanup;

impl CleanupStrategy for CaptureCleanup {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn clean(
        &self,
        raw: Vec<RawSample>,
        workbook: &Workbook,
    ) -> Result<(EnrichedTable, EnrichmentSummary), EnrichError> {
        let mut summary = EnrichmentSummary { rows_in: raw.len(), ..Default::default() };
        let mut table: Vec<TaggedSample> = raw.into_iter().map(TaggedSample::from).collect();
        if let Some(sheet) = workbook.sheet(SHEET_RAILS_TO_RENAME) {
            table = steps::resolve_renames(table, sheet, &mut summary)?;
            summary.sheets_applied.push(SHEET_RAILS_TO_RENAME.to_string());
        }
        let cleaned = steps::prune_unkeyed(table, &mut summary);
        summary.rows_out = cleaned.len();
        info!(rows_in = summary.rows_in, rows_out = summary.rows_out, "Cleaned capture table");
        Ok((cleaned, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, Sheet, SheetRow};

    #[test]
    fn test_capture_cleanup_ignores_rail_sheets() {
        let mut seq = SheetRow::new();
        seq.insert("Trace".into(), Cell::from("LANE0"));
        seq.insert("Expected Time".into(), Cell::Number(1.0));
        let workbook = Workbook::new().with_sheet("Sequencing", Sheet::new(vec![seq]));

        let raw = RawSample {
            dut: Some("D".into()),
            pba: Some("P".into()),
            rework: Some("0".into()),
            serial_number: Some("S".into()),
            runid: Some("7".into()),
            scope_channel: Some("CH1".into()),
            testpoint: Some("LANE0".into()),
            ..Default::default()
        };

        let (table, summary) = CaptureCleanup.clean(vec![raw], &workbook).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].rail.trace_order, None);
        assert!(summary.sheets_applied.is_empty());
    }
}
