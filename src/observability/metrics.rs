//! Stage and enrichment metrics recorded through the `metrics` facade.
//!
//! Nothing is exported unless `init()` installs the Prometheus recorder;
//! until then every call below is a no-op.

use std::sync::OnceLock;
use tracing::info;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Metric names, kept in one place so dashboards and code agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    StageStarted,
    StageCompleted,
    StageFailed,
    StageDuration,
    EnrichRowsIn,
    EnrichRowsOut,
    EnrichRowsDropped,
    EnrichSequencingSkipped,
    EnrichSequencingUnmatched,
    DispatchMode,
    RunsCompleted,
    RunsFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::StageStarted => "rail_postproc_stage_started_total",
            MetricName::StageCompleted => "rail_postproc_stage_completed_total",
            MetricName::StageFailed => "rail_postproc_stage_failed_total",
            MetricName::StageDuration => "rail_postproc_stage_duration_seconds",
            MetricName::EnrichRowsIn => "rail_postproc_enrich_rows_in_total",
            MetricName::EnrichRowsOut => "rail_postproc_enrich_rows_out_total",
            MetricName::EnrichRowsDropped => "rail_postproc_enrich_rows_dropped_total",
            MetricName::EnrichSequencingSkipped => "rail_postproc_enrich_sequencing_skipped_total",
            MetricName::EnrichSequencingUnmatched => "rail_postproc_enrich_sequencing_unmatched_total",
            MetricName::DispatchMode => "rail_postproc_dispatch_mode_total",
            MetricName::RunsCompleted => "rail_postproc_runs_completed_total",
            MetricName::RunsFailed => "rail_postproc_runs_failed_total",
        }
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text snapshot, if the recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub mod stage {
    use super::MetricName;

    pub fn started(stage: &'static str) {
        ::metrics::counter!(MetricName::StageStarted.as_str(), "stage" => stage).increment(1);
    }

    pub fn completed(stage: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::StageCompleted.as_str(), "stage" => stage).increment(1);
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }

    pub fn failed(stage: &'static str) {
        ::metrics::counter!(MetricName::StageFailed.as_str(), "stage" => stage).increment(1);
    }
}

pub mod enrich {
    use super::MetricName;
    use crate::pipeline::processing::EnrichmentSummary;

    pub fn record_summary(summary: &EnrichmentSummary) {
        ::metrics::counter!(MetricName::EnrichRowsIn.as_str()).increment(summary.rows_in as u64);
        ::metrics::counter!(MetricName::EnrichRowsOut.as_str()).increment(summary.rows_out as u64);
        ::metrics::counter!(MetricName::EnrichRowsDropped.as_str()).increment(summary.rows_dropped as u64);
        ::metrics::counter!(MetricName::EnrichSequencingSkipped.as_str())
            .increment(summary.skipped_current_rails as u64);
        ::metrics::counter!(MetricName::EnrichSequencingUnmatched.as_str())
            .increment(summary.unmatched_sequencing.len() as u64);
    }
}

pub mod dispatch {
    use super::MetricName;

    pub fn mode(mode: &'static str) {
        ::metrics::counter!(MetricName::DispatchMode.as_str(), "mode" => mode).increment(1);
    }
}

pub mod run {
    use super::MetricName;

    pub fn completed(test: &str) {
        ::metrics::counter!(MetricName::RunsCompleted.as_str(), "test" => test.to_string()).increment(1);
    }

    pub fn failed(stage: &'static str) {
        ::metrics::counter!(MetricName::RunsFailed.as_str(), "stage" => stage).increment(1);
    }
}
