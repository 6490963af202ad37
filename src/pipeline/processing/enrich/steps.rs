use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::columns::{cell, find_column, require_column};
use super::index::TestpointIndex;
use super::{EnrichmentSummary, TaggedSample};
use crate::common::constants::{
    SHEET_EDGE_CHANNELS, SHEET_ONBOARD_RAILS, SHEET_RAILS_TO_RENAME, SHEET_SEQUENCING,
    SHEET_TIMING, SPEC_MIN_TOKEN,
};
use crate::common::error::EnrichError;
use crate::domain::{Cell, EnrichedRecord, EnrichedTable, Sheet, ValidVoltage};

type Table = Vec<TaggedSample>;

/// Fold the rename sheet into a wrong -> right map with chains collapsed,
/// so that applying it a second time changes nothing.
pub fn rename_map(sheet: &Sheet) -> Result<HashMap<String, String>, EnrichError> {
    if sheet.is_empty() {
        return Ok(HashMap::new());
    }
    let wrong_col = require_column(sheet, SHEET_RAILS_TO_RENAME, &["wrong name", "from", "old name", "wrong"])?;
    let right_col = require_column(sheet, SHEET_RAILS_TO_RENAME, &["right name", "to", "new name", "right"])?;

    let mut direct: HashMap<String, String> = HashMap::new();
    for row in &sheet.rows {
        let (Some(wrong), Some(right)) = (
            cell(row, Some(&wrong_col)).as_text(),
            cell(row, Some(&right_col)).as_text(),
        ) else {
            continue;
        };
        if wrong != right {
            // later rows win for a repeated wrong name
            direct.insert(wrong, right);
        }
    }

    let mut resolved = HashMap::with_capacity(direct.len());
    for (wrong, first) in &direct {
        let mut visited: HashSet<&str> = HashSet::from([wrong.as_str()]);
        let mut target = first;
        while let Some(next) = direct.get(target) {
            if !visited.insert(target.as_str()) {
                return Err(EnrichError::RenameCycle(target.clone()));
            }
            target = next;
        }
        resolved.insert(wrong.clone(), target.clone());
    }
    Ok(resolved)
}

/// Step 1: rewrite wrong testpoint names to their right names.
pub fn resolve_renames(table: Table, sheet: &Sheet, summary: &mut EnrichmentSummary) -> Result<Table, EnrichError> {
    let renames = rename_map(sheet)?;
    let mut renamed = 0;
    let table = table
        .into_iter()
        .map(|mut row| {
            if let Some(right) = row.sample.testpoint.as_ref().and_then(|tp| renames.get(tp)) {
                row.sample.testpoint = Some(right.clone());
                renamed += 1;
            }
            row
        })
        .collect();
    summary.renamed_rows = renamed;
    debug!(renamed, rules = renames.len(), "Resolved rail renames");
    Ok(table)
}

/// Step 2: tag board-input voltage/current pairs.
pub fn tag_edge_channels(
    mut table: Table,
    index: &TestpointIndex,
    sheet: &Sheet,
    summary: &mut EnrichmentSummary,
) -> Result<Table, EnrichError> {
    if sheet.is_empty() {
        return Ok(table);
    }
    let voltage_col = require_column(sheet, SHEET_EDGE_CHANNELS, &["voltage", "voltage rail"])?;
    let current_col = require_column(sheet, SHEET_EDGE_CHANNELS, &["current", "current rail"])?;
    let nominal_col = find_column(sheet, &["nominal", "nominal voltage", "expected nominal"]);
    let max_current_col = find_column(sheet, &["max current"]);
    let max_power_col = find_column(sheet, &["max power"]);

    for row in &sheet.rows {
        let (Some(voltage), Some(current)) = (
            cell(row, Some(&voltage_col)).as_text(),
            cell(row, Some(&current_col)).as_text(),
        ) else {
            warn!(sheet = SHEET_EDGE_CHANNELS, "Skipping edge channel row without both testpoint names");
            continue;
        };
        let nominal = cell(row, nominal_col.as_deref()).as_number();
        let max_current = cell(row, max_current_col.as_deref()).as_number();
        let max_power = cell(row, max_power_col.as_deref()).as_number();

        for &i in index.rows(&voltage) {
            let tags = &mut table[i].tags;
            tags.edge_rail = true;
            tags.associated_rail = Some(current.clone());
            tags.expected_nominal = nominal;
            tags.max_power = max_power;
            summary.edge_rows_tagged += 1;
        }
        for &i in index.rows(&current) {
            let tags = &mut table[i].tags;
            tags.edge_rail = true;
            tags.current_rail = true;
            tags.associated_rail = Some(voltage.clone());
            tags.spec_max = max_current;
            tags.max_power = max_power;
            summary.edge_rows_tagged += 1;
        }
    }
    Ok(table)
}

/// Step 3: bind nominal and do-not-cross bounds to onboard rails.
pub fn bind_onboard_rails(
    mut table: Table,
    index: &TestpointIndex,
    sheet: &Sheet,
    summary: &mut EnrichmentSummary,
) -> Result<Table, EnrichError> {
    if sheet.is_empty() {
        return Ok(table);
    }
    let rail_col = require_column(sheet, SHEET_ONBOARD_RAILS, &["rail", "rail name", "testpoint"])?;
    let nominal_col = find_column(sheet, &["nominal", "nominal voltage", "expected nominal"]);
    let min_col = find_column(sheet, &["spec min", "min"]);
    let max_col = find_column(sheet, &["spec max", "max"]);

    for row in &sheet.rows {
        let Some(rail) = cell(row, Some(&rail_col)).as_text() else {
            continue;
        };
        for &i in index.rows(&rail) {
            let tags = &mut table[i].tags;
            tags.expected_nominal = cell(row, nominal_col.as_deref()).as_number();
            tags.spec_min = cell(row, min_col.as_deref()).as_number();
            tags.spec_max = cell(row, max_col.as_deref()).as_number();
            summary.onboard_rows_bound += 1;
        }
    }
    Ok(table)
}

/// Step 4: attach cross-rail timing limits to the from-rail.
pub fn bind_timing(
    mut table: Table,
    index: &TestpointIndex,
    sheet: &Sheet,
    summary: &mut EnrichmentSummary,
) -> Result<Table, EnrichError> {
    if sheet.is_empty() {
        return Ok(table);
    }
    let from_col = require_column(sheet, SHEET_TIMING, &["from rail", "from"])?;
    let to_col = require_column(sheet, SHEET_TIMING, &["to rail", "to"])?;
    let timing_col = require_column(sheet, SHEET_TIMING, &["max timing", "max timing ms", "timing"])?;

    let complete = sheet.rows.iter().filter_map(|row| {
        Some((
            cell(row, Some(&from_col)).as_text()?,
            cell(row, Some(&to_col)).as_text()?,
            cell(row, Some(&timing_col)).as_number()?,
        ))
    });

    for (from, to, max_ms) in complete {
        for &i in index.rows(&from) {
            let tags = &mut table[i].tags;
            tags.to_rail = Some(to.clone());
            tags.to_rail_timing_spec = Some(max_ms);
            summary.timing_rows_bound += 1;
        }
    }
    Ok(table)
}

struct SequencingEntry {
    trace: String,
    expected_ms: Option<f64>,
    valid_voltage: Cell,
}

/// `None` for an empty cell. Numeric text such as `"2.5"` is read as volts,
/// the same as a number cell. Any other text must be `spec_min`
/// (case-insensitive) or the entry is rejected.
fn parse_valid_voltage(trace: &str, raw: &Cell) -> Result<Option<ValidVoltage>, EnrichError> {
    match raw {
        Cell::Empty => Ok(None),
        Cell::Number(v) => Ok(Some(ValidVoltage::Volts(*v))),
        Cell::Text(text) => {
            if let Ok(v) = text.trim().parse::<f64>() {
                Ok(Some(ValidVoltage::Volts(v)))
            } else if text.trim().eq_ignore_ascii_case(SPEC_MIN_TOKEN) {
                Ok(Some(ValidVoltage::SpecMin))
            } else {
                Err(EnrichError::InvalidValidVoltage {
                    testpoint: trace.to_string(),
                    value: text.clone(),
                })
            }
        }
    }
}

/// Step 5: assign power-on order in ascending expected-time order.
///
/// Current rails never receive sequencing fields. An entry whose matched rows
/// include a current rail and whose valid-voltage cell is empty is skipped
/// without consuming a sequence number; so is an entry that matches no rows.
pub fn bind_sequencing(
    mut table: Table,
    index: &TestpointIndex,
    sheet: &Sheet,
    summary: &mut EnrichmentSummary,
) -> Result<Table, EnrichError> {
    if sheet.is_empty() {
        return Ok(table);
    }
    let trace_col = require_column(sheet, SHEET_SEQUENCING, &["trace", "testpoint", "rail"])?;
    let time_col = require_column(
        sheet,
        SHEET_SEQUENCING,
        &["expected time", "expected power on time", "power on time", "expected time ms"],
    )?;
    let voltage_col = find_column(sheet, &["valid voltage"]);

    let mut entries: Vec<SequencingEntry> = sheet
        .rows
        .iter()
        .filter_map(|row| {
            Some(SequencingEntry {
                trace: cell(row, Some(&trace_col)).as_text()?,
                expected_ms: cell(row, Some(&time_col)).as_number(),
                valid_voltage: cell(row, voltage_col.as_deref()).clone(),
            })
        })
        .collect();

    // stable; entries without an expected time go last
    entries.sort_by(|a, b| match (a.expected_ms, b.expected_ms) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut sequence: u32 = 1;
    for entry in entries {
        let valid_voltage = parse_valid_voltage(&entry.trace, &entry.valid_voltage)?;
        let matched = index.rows(&entry.trace);
        if matched.is_empty() {
            warn!(trace = %entry.trace, "Sequencing entry matches no captured testpoint");
            summary.unmatched_sequencing.push(entry.trace);
            continue;
        }

        let has_current_rail = matched.iter().any(|&i| table[i].tags.current_rail);
        let targets: Vec<usize> = matched
            .iter()
            .copied()
            .filter(|&i| !table[i].tags.current_rail)
            .collect();
        if (has_current_rail && valid_voltage.is_none()) || targets.is_empty() {
            debug!(trace = %entry.trace, "Current rail validated through its voltage pair; not sequenced");
            summary.skipped_current_rails += 1;
            continue;
        }

        for i in targets {
            let tags = &mut table[i].tags;
            tags.trace_order = Some(sequence);
            tags.power_on_time_spec = entry.expected_ms;
            tags.valid_voltage = valid_voltage;
        }
        summary.sequenced_entries += 1;
        sequence += 1;
    }
    Ok(table)
}

/// Step 6: drop rows missing any identifying key and seal the rest.
pub fn prune_unkeyed(table: Table, summary: &mut EnrichmentSummary) -> EnrichedTable {
    let before = table.len();
    let records: EnrichedTable = table
        .into_iter()
        .filter_map(|row| {
            let key = row.sample.key()?;
            Some(EnrichedRecord::seal(
                key,
                row.sample.capture,
                row.tags,
                row.sample.extra,
            ))
        })
        .collect();
    summary.rows_dropped = before - records.len();
    records
}
