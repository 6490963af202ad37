use anyhow::Result;
use serde_json::json;

use tempfile::tempdir;

use rail_postproc::common::error::EnrichError;
use rail_postproc::domain::{EnrichedRecord, RawSample, ValidVoltage, Workbook};
use rail_postproc::pipeline::processing::{enrich, enrich_with_summary};
use rail_postproc::pipeline::storage::ArtifactStore;

fn samples(testpoints: &[&str]) -> Result<Vec<RawSample>> {
    let rows: Vec<serde_json::Value> = testpoints
        .iter()
        .enumerate()
        .map(|(i, tp)| {
            json!({
                "dut": "DUT3", "pba": "PBA-1", "rework": "2", "serial_number": "SN77",
                "runid": i % 2, "scope_channel": format!("CH{}", i % 4 + 1), "testpoint": tp,
                "mean": 1.0
            })
        })
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Array(rows))?)
}

fn workbook(value: serde_json::Value) -> Result<Workbook> {
    Ok(serde_json::from_value(value)?)
}

#[test]
fn test_sequence_is_gapless_and_skips_current_rails() -> Result<()> {
    let raw = samples(&["A", "B", "B", "I_A", "C", "D"])?;
    let workbook = workbook(json!({
        "Edge Channels": [{ "Voltage": "A", "Current": "I_A", "Nominal": 3.3, "Max Current": 2, "Max Power": 6.6 }],
        "Sequencing": [
            { "Trace": "D", "Expected Time": 40, "Valid Voltage": null },
            { "Trace": "I_A", "Expected Time": 1, "Valid Voltage": "" },
            { "Trace": "TYPO", "Expected Time": 2, "Valid Voltage": "" },
            { "Trace": "B", "Expected Time": "15", "Valid Voltage": "2.5" },
            { "Trace": "A", "Expected Time": 3, "Valid Voltage": "SPEC_MIN" },
            { "Trace": "C", "Expected Time": null, "Valid Voltage": "" }
        ]
    }))?;

    let (table, summary) = enrich_with_summary(raw, &workbook)?;

    let order = |tp: &str| -> Vec<Option<u32>> {
        table.iter().filter(|r| r.testpoint() == tp).map(|r| r.rail.trace_order).collect()
    };
    assert_eq!(order("A"), vec![Some(1)]);
    assert_eq!(order("B"), vec![Some(2), Some(2)]);
    assert_eq!(order("D"), vec![Some(3)]);
    assert_eq!(order("C"), vec![Some(4)]);
    assert_eq!(order("I_A"), vec![None]);
    assert!(table.iter().filter(|r| r.rail.current_rail).all(|r| r.rail.trace_order.is_none()));

    let b = table.iter().find(|r| r.testpoint() == "B").expect("B present");
    assert_eq!(b.rail.valid_voltage, Some(ValidVoltage::Volts(2.5)));
    assert_eq!(b.rail.power_on_time_spec, Some(15.0));

    assert_eq!(summary.unmatched_sequencing, vec!["TYPO".to_string()]);
    assert_eq!(summary.sequenced_entries, 4);
    assert_eq!(summary.skipped_current_rails, 1);
    Ok(())
}

#[test]
fn test_renaming_twice_changes_nothing() -> Result<()> {
    let sheet = json!({
        "Rails to Rename": [
            { "Wrong Name": "OLD_A", "Right Name": "MID_A" },
            { "Wrong Name": "MID_A", "Right Name": "NEW_A" }
        ]
    });
    let once = enrich(samples(&["OLD_A", "MID_A", "OTHER"])?, &workbook(sheet.clone())?)?;
    let names: Vec<&str> = once.iter().map(|r| r.testpoint()).collect();
    assert_eq!(names, vec!["NEW_A", "NEW_A", "OTHER"]);

    // Feed the renamed names back in as raw captures
    let again = enrich(samples(&names)?, &workbook(sheet)?)?;
    assert_eq!(again, once);
    Ok(())
}

#[test]
fn test_pruned_rows_have_every_key() -> Result<()> {
    let raw: Vec<RawSample> = serde_json::from_value(json!([
        { "dut": "D", "pba": "P", "rework": "0", "serial_number": "S", "runid": "1", "scope_channel": "CH1", "testpoint": "T" },
        { "dut": "D", "pba": "P", "rework": "0", "serial_number": "S", "runid": "", "scope_channel": "CH1", "testpoint": "T" },
        { "dut": "D", "pba": "P", "rework": null, "serial_number": "S", "runid": "1", "scope_channel": "CH1", "testpoint": "T" },
        { "pba": "P", "rework": "0", "serial_number": "S", "runid": "1", "scope_channel": "CH1", "testpoint": "T" }
    ]))?;

    let (table, summary) = enrich_with_summary(raw, &Workbook::new())?;
    assert_eq!(table.len(), 1);
    assert_eq!(summary.rows_dropped, 3);
    assert!(table[0].key.levels().iter().all(|level| !level.is_empty()));
    Ok(())
}

#[test]
fn test_absent_sheets_leave_rows_untouched() -> Result<()> {
    let table = enrich(samples(&["V1", "V2"])?, &workbook(json!({ "BER": [{ "Lane": 0 }] }))?)?;
    assert!(table.iter().all(|r| r.rail == Default::default()));
    Ok(())
}

#[test]
fn test_malformed_valid_voltage_fails_even_when_unmatched() -> Result<()> {
    let raw = samples(&["A"])?;
    let workbook = workbook(json!({
        "Sequencing": [
            { "Trace": "A", "Expected Time": 1, "Valid Voltage": "" },
            { "Trace": "GHOST", "Expected Time": 2, "Valid Voltage": "average" }
        ]
    }))?;

    let err = enrich(raw, &workbook).unwrap_err();
    assert_eq!(
        err,
        EnrichError::InvalidValidVoltage { testpoint: "GHOST".to_string(), value: "average".to_string() }
    );
    Ok(())
}

#[test]
fn test_enriched_export_reuploaded_as_raw_survives_storage() -> Result<()> {
    let mut rows = serde_json::to_value(samples(&["V1"])?)?;
    // columns an earlier enriched export would carry
    rows[0]["spec_max"] = json!(5.0);
    rows[0]["trace_order"] = json!(7);
    rows[0]["_id"] = json!("00000000-0000-0000-0000-000000000000");
    let raw: Vec<RawSample> = serde_json::from_value(rows)?;
    let workbook = workbook(json!({
        "On-Board Rails": [{ "Rail": "V1", "Nominal": 1.0, "Spec Min": 0.9, "Spec Max": 1.1 }]
    }))?;

    let table = enrich(raw, &workbook)?;
    let dir = tempdir()?;
    let store = ArtifactStore::open(dir.path())?;
    let artifact = store.write_table("sequencing_clean", &table)?;
    let back: Vec<EnrichedRecord> = store.read_table(&artifact)?;

    assert_eq!(back, table);
    assert_eq!(back[0].rail.spec_max, Some(1.1));
    assert_eq!(back[0].rail.trace_order, None);
    assert_eq!(back[0].extra.get("raw_spec_max"), Some(&json!(5.0)));
    assert_eq!(back[0].extra.get("raw_trace_order"), Some(&json!(7)));
    assert!(back[0].extra.contains_key("raw__id"));
    Ok(())
}
