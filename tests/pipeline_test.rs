use anyhow::Result;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use rail_postproc::analysis::AnalysisReport;
use rail_postproc::app::ports::TaskQueue;
use rail_postproc::common::error::{EnrichError, PipelineError};
use rail_postproc::infra::{InMemoryRepository, JsonTableSource, LocalWorkerQueue};
use rail_postproc::pipeline::dispatch::{DispatchMode, TaskContext};
use rail_postproc::pipeline::steps::StageRunner;
use rail_postproc::pipeline::storage::ArtifactStore;
use rail_postproc::pipeline::{PipelineOrchestrator, PipelineState, ProfileRegistry};

struct Harness {
    _dir: TempDir,
    uploads: std::path::PathBuf,
    store: ArtifactStore,
    runner: Arc<StageRunner>,
}

impl Harness {
    fn new() -> Result<Self> {
        let dir = tempdir()?;
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads)?;
        let store = ArtifactStore::open(dir.path().join("artifacts"))?;
        let runner = Arc::new(StageRunner::new(
            Arc::new(ProfileRegistry::builtin()),
            store.clone(),
            Arc::new(JsonTableSource::new()),
            Arc::new(InMemoryRepository::new()),
        ));
        Ok(Self { _dir: dir, uploads, store, runner })
    }

    fn orchestrator(&self) -> PipelineOrchestrator {
        PipelineOrchestrator::new(self.runner.clone(), self.store.clone())
    }

    fn queue(&self) -> Arc<LocalWorkerQueue> {
        LocalWorkerQueue::start(self.runner.clone(), 2, Duration::from_secs(2))
    }

    fn write_inputs(&self, workbook: &Value) -> Result<Value> {
        let rows = [
            capture("0P1V_AVDDH", Some("3"), 1.05, 1.12),
            capture("12V_EXT", Some("3"), 11.9, 12.1),
            capture("12V_EXT_Current", Some("3"), 2.0, 4.2),
            capture("V5P0", Some("3"), 4.8, 5.1),
            capture("V5P0", None, 4.8, 5.1),
        ];
        let ndjson: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        std::fs::write(self.uploads.join("captures.ndjson"), ndjson.join("\n"))?;
        std::fs::write(self.uploads.join("rails.json"), workbook.to_string())?;
        Ok(self.payload("Sequencing"))
    }

    fn payload(&self, test_name: &str) -> Value {
        json!({
            "test_name": test_name,
            "data_filename": "captures.ndjson",
            "data_file_path": self.uploads.display().to_string(),
            "user_input_filename": "rails.json",
            "user_input_file_path": self.uploads.display().to_string(),
            "filter_by": "default"
        })
    }

    fn artifact_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.store.root())? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

fn capture(testpoint: &str, runid: Option<&str>, min: f64, max: f64) -> Value {
    json!({
        "dut": "DUT01", "pba": "PBA-7731", "rework": 0, "serial_number": "SN0042",
        "runid": runid, "scope_channel": "CH2", "testpoint": testpoint,
        "min": min, "mean": (min + max) / 2.0, "max": max,
        "waveform_location": format!("/captures/{}.wfm", testpoint)
    })
}

fn sequencing_workbook(valid_voltage: &str) -> Value {
    json!({
        "Rails to Rename": [{ "Wrong Name": "0P1V_AVDDH", "Right Name": "1P1V_AVDDH" }],
        "Edge Channels": [{
            "Voltage": "12V_EXT", "Current": "12V_EXT_Current",
            "Nominal": 12.0, "Max Current": 5.0, "Max Power": 60.0
        }],
        "On-Board Rails": [
            { "Rail": "V5P0", "Nominal": 5.0, "Spec Min": 4.75, "Spec Max": 5.25 },
            { "Rail": "1P1V_AVDDH", "Nominal": 1.1, "Spec Min": 1.0, "Spec Max": 1.2 }
        ],
        "Sequencing": [
            { "Trace": "1P1V_AVDDH", "Expected Time": 20, "Valid Voltage": 1.0 },
            { "Trace": "V5P0", "Expected Time": 10, "Valid Voltage": valid_voltage },
            { "Trace": "12V_EXT_Current", "Expected Time": 5, "Valid Voltage": "" }
        ]
    })
}

fn load_report(path: &str) -> Result<AnalysisReport> {
    Ok(serde_json::from_str(&std::fs::read_to_string(Path::new(path))?)?)
}

/// Report rows with the repository-assigned ids removed.
fn comparable(report: &AnalysisReport) -> Vec<Value> {
    report
        .sheets
        .values()
        .flat_map(|sheet| sheet.rows.iter())
        .map(|row| {
            let mut row = row.clone();
            row.remove("_id");
            Value::Object(row)
        })
        .collect()
}

#[tokio::test]
async fn test_unreachable_queue_falls_back_to_inline() -> Result<()> {
    let harness = Harness::new()?;
    let payload = harness.write_inputs(&sequencing_workbook("spec_min"))?;

    let queue = harness.queue();
    queue.shutdown().await;
    let orchestrator = harness.orchestrator().with_queue(queue.clone() as Arc<dyn TaskQueue>);

    let (dispatcher, _ctx) = orchestrator.prepare_run().await;
    assert_eq!(dispatcher.mode(), DispatchMode::Inline);
    assert!(dispatcher.progress_sink().is_none());

    let response = orchestrator.submit(&payload).await?;
    assert_eq!(response.current, 100);
    assert_eq!(response.total, 100);
    assert_eq!(response.status, "Sequencing completed!");
    assert!(response.filename.starts_with("Sequencing_"));

    let report = load_report(&response.result)?;
    let sheet = report.sheet("Sequencing").expect("single default sheet");
    // Row missing runid is pruned
    assert_eq!(sheet.len(), 4);

    let order: Vec<(&str, &Value)> = sheet
        .rows
        .iter()
        .map(|r| (r["testpoint"].as_str().unwrap_or_default(), &r["trace_order"]))
        .collect();
    assert_eq!(order[0], ("V5P0", &json!(1)));
    assert_eq!(order[1], ("1P1V_AVDDH", &json!(2)));
    assert_eq!(order[2].1, &Value::Null);
    assert_eq!(order[3].1, &Value::Null);
    assert_eq!(sheet.rows[0]["result"], "PASS");
    Ok(())
}

#[tokio::test]
async fn test_queued_and_inline_runs_agree() -> Result<()> {
    let harness = Harness::new()?;
    let payload = harness.write_inputs(&sequencing_workbook("spec_min"))?;

    let inline = harness.orchestrator().submit(&payload).await?;

    let queue = harness.queue();
    let orchestrator = harness.orchestrator().with_queue(queue.clone() as Arc<dyn TaskQueue>);
    let (dispatcher, _ctx) = orchestrator.prepare_run().await;
    assert_eq!(dispatcher.mode(), DispatchMode::Queued);
    let queued = orchestrator.submit(&payload).await?;
    queue.shutdown().await;

    assert_eq!(inline.status, queued.status);
    assert_ne!(inline.result, queued.result);
    assert_eq!(
        comparable(&load_report(&inline.result)?),
        comparable(&load_report(&queued.result)?)
    );

    // Only the two reports remain; intermediate tables were removed
    let names = harness.artifact_names()?;
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| n.starts_with("sequencing_report_") && n.ends_with(".json")));
    Ok(())
}

#[tokio::test]
async fn test_queued_run_publishes_progress() -> Result<()> {
    let harness = Harness::new()?;
    let payload = harness.write_inputs(&sequencing_workbook("spec_min"))?;
    let queue = harness.queue();
    let orchestrator = harness.orchestrator().with_queue(queue.clone() as Arc<dyn TaskQueue>);

    let (dispatcher, ctx) = orchestrator.prepare_run().await;
    assert!(ctx.reports_progress());
    orchestrator
        .run_with(&ctx, dispatcher.as_ref(), || {
            rail_postproc::pipeline::extract_request_paths(&payload)
        })
        .await?;

    let state = queue.state(ctx.task_id()).await.expect("progress was published");
    assert_eq!(state.state, "COMPLETE");
    assert_eq!((state.current, state.total), (100, 100));
    assert_eq!(state.subtasks.len(), 3);
    assert_eq!(ctx.snapshot().subtask_ids, state.subtasks);
    queue.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_reuploaded_export_columns_do_not_break_the_run() -> Result<()> {
    let harness = Harness::new()?;
    let payload = harness.write_inputs(&sequencing_workbook("spec_min"))?;

    // Captures carrying columns from an earlier enriched export
    let mut row = capture("V5P0", Some("3"), 4.8, 5.1);
    row["spec_max"] = json!(9.9);
    row["trace_order"] = json!(42);
    row["_id"] = json!("6f1c2a52-3b7e-4d55-9a0e-2f4f0c1d8e77");
    std::fs::write(harness.uploads.join("captures.ndjson"), row.to_string())?;

    let response = harness.orchestrator().submit(&payload).await?;
    let report = load_report(&response.result)?;
    let sheet = report.sheet("Sequencing").expect("single default sheet");
    assert_eq!(sheet.len(), 1);
    assert_eq!(sheet.rows[0]["spec_max"], json!(5.25));
    assert_eq!(sheet.rows[0]["trace_order"], json!(1));
    assert_ne!(sheet.rows[0]["_id"], json!("6f1c2a52-3b7e-4d55-9a0e-2f4f0c1d8e77"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_valid_voltage_fails_inline() -> Result<()> {
    let harness = Harness::new()?;
    let payload = harness.write_inputs(&sequencing_workbook("average"))?;
    let orchestrator = harness.orchestrator();

    let (dispatcher, ctx) = orchestrator.prepare_run().await;
    let err = orchestrator
        .run_with(&ctx, dispatcher.as_ref(), || {
            rail_postproc::pipeline::extract_request_paths(&payload)
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Enrich(EnrichError::InvalidValidVoltage { ref value, .. }) if value == "average"
    ));
    assert_eq!(ctx.stage(), PipelineState::Failed);
    assert!(harness.artifact_names()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_invalid_valid_voltage_fails_queued_job() -> Result<()> {
    let harness = Harness::new()?;
    let payload = harness.write_inputs(&sequencing_workbook("average"))?;
    let queue = harness.queue();
    let orchestrator = harness.orchestrator().with_queue(queue.clone() as Arc<dyn TaskQueue>);

    let (dispatcher, ctx) = orchestrator.prepare_run().await;
    let err = orchestrator
        .run_with(&ctx, dispatcher.as_ref(), || {
            rail_postproc::pipeline::extract_request_paths(&payload)
        })
        .await
        .unwrap_err();

    // Same error kind as the inline run
    assert!(matches!(
        err,
        PipelineError::Enrich(EnrichError::InvalidValidVoltage { ref value, .. }) if value == "average"
    ));
    let state = queue.state(ctx.task_id()).await.expect("failure was published");
    assert_eq!(state.state, "FAILED");
    queue.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_ber_run_skips_rail_enrichment() -> Result<()> {
    let harness = Harness::new()?;
    harness.write_inputs(&sequencing_workbook("spec_min"))?;
    let mut payload = harness.payload("BER");
    payload["filter_by"] = json!("testpoint");

    let response = harness.orchestrator().submit(&payload).await?;
    assert_eq!(response.status, "BER completed!");

    let report = load_report(&response.result)?;
    // One sheet per testpoint, renamed but otherwise unenriched
    assert_eq!(report.sheets.len(), 4);
    assert!(comparable(&report)
        .iter()
        .all(|row| row["trace_order"].is_null() && row["result"] == "NO SPEC"));
    assert!(comparable(&report).iter().any(|row| row["testpoint"] == "1P1V_AVDDH"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_test_and_missing_files_fail_before_cleaning() -> Result<()> {
    let harness = Harness::new()?;
    harness.write_inputs(&sequencing_workbook("spec_min"))?;
    let orchestrator = harness.orchestrator();

    let err = orchestrator.submit(&harness.payload("Thermal Soak")).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedTest(_)));

    let mut payload = harness.payload("Inrush");
    payload["data_filename"] = json!("missing.ndjson");
    let err = orchestrator.submit(&payload).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_run_stops_between_stages() -> Result<()> {
    let harness = Harness::new()?;
    let payload = harness.write_inputs(&sequencing_workbook("spec_min"))?;
    let orchestrator = harness.orchestrator();

    let (dispatcher, ctx) = orchestrator.prepare_run().await;
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    let ctx = TaskContext::new(ctx.task_id().to_string(), None).with_cancellation(token);

    let err = orchestrator
        .run_with(&ctx, dispatcher.as_ref(), || {
            rail_postproc::pipeline::extract_request_paths(&payload)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(ctx.stage(), PipelineState::Failed);
    Ok(())
}
