//! Rule-based reconciliation of a configuration workbook onto a raw
//! capture table.
//!
//! Steps run in a fixed order because later steps look rows up by the
//! testpoint names the rename step produces:
//!
//! ```text
//! 1. Rails to Rename   rewrite wrong testpoint names
//! 2. Edge Channels     tag board-input voltage/current pairs
//! 3. On-Board Rails    bind nominal and spec bounds
//! 4. Timing            bind cross-rail timing limits
//! 5. Sequencing        assign power-on order
//! 6. prune             drop rows missing identifying keys
//! ```
//!
//! A step whose sheet is absent returns its input unchanged. The engine
//! consumes raw samples and yields keyed `EnrichedRecord`s, so a table can
//! only be sequenced once.

mod columns;
mod index;
pub mod steps;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::constants::{
    SHEET_EDGE_CHANNELS, SHEET_ONBOARD_RAILS, SHEET_RAILS_TO_RENAME, SHEET_SEQUENCING,
    SHEET_TIMING,
};
use crate::common::error::EnrichError;
use crate::domain::{EnrichedTable, RailTags, RawSample, Workbook};

pub use columns::normalize_header;
pub use index::TestpointIndex;

/// A raw sample together with the tags accumulated so far.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSample {
    pub sample: RawSample,
    pub tags: RailTags,
}

impl From<RawSample> for TaggedSample {
    fn from(sample: RawSample) -> Self {
        Self { sample, tags: RailTags::default() }
    }
}

/// Counts describing one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    pub rows_in: usize,
    pub sheets_applied: Vec<String>,
    pub renamed_rows: usize,
    pub edge_rows_tagged: usize,
    pub onboard_rows_bound: usize,
    pub timing_rows_bound: usize,
    pub sequenced_entries: usize,
    pub skipped_current_rails: usize,
    pub unmatched_sequencing: Vec<String>,
    pub rows_dropped: usize,
    pub rows_out: usize,
}

/// Enrich `raw` with every recognized sheet present in `workbook`.
pub fn enrich(raw: Vec<RawSample>, workbook: &Workbook) -> Result<EnrichedTable, EnrichError> {
    enrich_with_summary(raw, workbook).map(|(table, _)| table)
}

pub fn enrich_with_summary(
    raw: Vec<RawSample>,
    workbook: &Workbook,
) -> Result<(EnrichedTable, EnrichmentSummary), EnrichError> {
    let mut summary = EnrichmentSummary { rows_in: raw.len(), ..Default::default() };
    let mut table: Vec<TaggedSample> = raw.into_iter().map(TaggedSample::from).collect();

    if let Some(sheet) = workbook.sheet(SHEET_RAILS_TO_RENAME) {
        table = steps::resolve_renames(table, sheet, &mut summary)?;
        summary.sheets_applied.push(SHEET_RAILS_TO_RENAME.to_string());
    }

    let index = TestpointIndex::build(&table);

    if let Some(sheet) = workbook.sheet(SHEET_EDGE_CHANNELS) {
        table = steps::tag_edge_channels(table, &index, sheet, &mut summary)?;
        summary.sheets_applied.push(SHEET_EDGE_CHANNELS.to_string());
    }
    if let Some(sheet) = workbook.sheet(SHEET_ONBOARD_RAILS) {
        table = steps::bind_onboard_rails(table, &index, sheet, &mut summary)?;
        summary.sheets_applied.push(SHEET_ONBOARD_RAILS.to_string());
    }
    if let Some(sheet) = workbook.sheet(SHEET_TIMING) {
        table = steps::bind_timing(table, &index, sheet, &mut summary)?;
        summary.sheets_applied.push(SHEET_TIMING.to_string());
    }
    if let Some(sheet) = workbook.sheet(SHEET_SEQUENCING) {
        table = steps::bind_sequencing(table, &index, sheet, &mut summary)?;
        summary.sheets_applied.push(SHEET_SEQUENCING.to_string());
    }

    let enriched = steps::prune_unkeyed(table, &mut summary);
    summary.rows_out = enriched.len();

    debug!(?summary, "Enrichment pass finished");
    info!(
        rows_in = summary.rows_in,
        rows_out = summary.rows_out,
        dropped = summary.rows_dropped,
        sequenced = summary.sequenced_entries,
        "Enriched capture table"
    );
    Ok((enriched, summary))
}
