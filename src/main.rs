use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use rail_postproc::analysis::AnalysisReport;
use rail_postproc::app::ports::{TableSource, TaskQueue};
use rail_postproc::config::Settings;
use rail_postproc::domain::FilterBy;
use rail_postproc::infra::{InMemoryRepository, JsonTableSource, LocalWorkerQueue};
use rail_postproc::observability::{init_logging, metrics};
use rail_postproc::pipeline::processing::enrich_with_summary;
use rail_postproc::pipeline::steps::StageRunner;
use rail_postproc::pipeline::storage::{ArtifactRef, ArtifactStore};
use rail_postproc::pipeline::{PipelineOrchestrator, PipelineRequest, ProfileRegistry};

#[derive(Parser)]
#[command(name = "rail-postproc")]
#[command(about = "Post-process power-rail validation captures")]
#[command(version = "0.1.0")]
struct Cli {
    /// Settings file (defaults to rail-postproc.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline submission end to end
    Run {
        /// Submission payload JSON file
        #[arg(long, conflicts_with_all = ["test", "data", "workbook"])]
        payload: Option<PathBuf>,
        /// Test name, e.g. "Sequencing" or "Load Profile"
        #[arg(long, requires_all = ["data", "workbook"])]
        test: Option<String>,
        /// Raw capture table (JSON array or NDJSON)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Configuration workbook (JSON object of sheets)
        #[arg(long)]
        workbook: Option<PathBuf>,
        /// Report grouping: dut, pba, rework, sample, runid, capture, testpoint, default
        #[arg(long, default_value = "default")]
        filter_by: String,
        /// Skip the task queue and run every stage in-process
        #[arg(long)]
        inline: bool,
        /// Number of queue workers
        #[arg(long)]
        workers: Option<usize>,
        /// Print the Prometheus metrics snapshot after the run
        #[arg(long)]
        print_metrics: bool,
    },
    /// Run only the enrichment engine and write the result as NDJSON
    Enrich {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print row counts of a stored artifact
    Inspect {
        artifact: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(cli.settings.as_deref()).context("Failed to load settings")?;
    let _log_guard = init_logging(&settings.logging).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Run {
            payload,
            test,
            data,
            workbook,
            filter_by,
            inline,
            workers,
            print_metrics,
        } => {
            if settings.metrics.enabled || print_metrics {
                metrics::init().map_err(|e| anyhow!(e))?;
            }

            let submission = match (payload, test, data, workbook) {
                (Some(path), _, _, _) => Submission::Payload(read_json(&path)?),
                (None, Some(test), Some(data), Some(workbook)) => {
                    let filter_by = filter_by
                        .parse::<FilterBy>()
                        .map_err(|bad| anyhow!("unknown filter_by '{}'", bad))?;
                    Submission::Request(build_request(test, data, workbook, filter_by)?)
                }
                _ => bail!("either --payload or --test with --data and --workbook is required"),
            };

            run_pipeline(&settings, submission, inline, workers).await?;

            if print_metrics {
                match metrics::render() {
                    Some(text) => println!("{}", text),
                    None => warn!("Metrics recorder is not installed"),
                }
            }
        }
        Commands::Enrich { data, config, out } => {
            let source = JsonTableSource::new();
            let raw = source.load_samples(&data).await?;
            let workbook = source.load_workbook(&config).await?;
            let (table, summary) = enrich_with_summary(raw, &workbook)?;

            let mut lines = String::new();
            for row in &table {
                lines.push_str(&serde_json::to_string(row)?);
                lines.push('\n');
            }
            std::fs::write(&out, lines).with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {} enriched rows to {}", table.len(), out.display());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Inspect { artifact } => {
            let store = ArtifactStore::open(settings.artifact_dir())?;
            let artifact = ArtifactRef::new(&artifact);
            if artifact.name().ends_with(".json") {
                let report: AnalysisReport = store.read_document(&artifact)?;
                println!("{}: {} sheets, {} rows", artifact, report.sheets.len(), report.row_count());
                for (name, sheet) in &report.sheets {
                    println!("  {}: {} rows", name, sheet.len());
                }
            } else {
                let rows: Vec<Value> = store.read_table(&artifact)?;
                println!("{}: {} rows", artifact, rows.len());
            }
        }
    }

    Ok(())
}

enum Submission {
    Payload(Value),
    Request(PipelineRequest),
}

async fn run_pipeline(
    settings: &Settings,
    submission: Submission,
    inline: bool,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let store = ArtifactStore::open(settings.artifact_dir())?;
    let registry = Arc::new(ProfileRegistry::builtin());
    let runner = Arc::new(StageRunner::new(
        registry,
        store.clone(),
        Arc::new(JsonTableSource::new()),
        Arc::new(InMemoryRepository::new()),
    ));

    let mut orchestrator = PipelineOrchestrator::new(runner.clone(), store);
    let queue = if settings.queue.enabled && !inline {
        let queue = LocalWorkerQueue::start(
            runner,
            workers.unwrap_or(settings.queue.workers),
            Duration::from_millis(settings.queue.ping_timeout_ms),
        );
        orchestrator = orchestrator.with_queue(queue.clone() as Arc<dyn TaskQueue>);
        Some(queue)
    } else {
        None
    };

    let result = match submission {
        Submission::Payload(payload) => orchestrator.submit(&payload).await,
        Submission::Request(request) => orchestrator.run(request).await,
    };
    if let Some(queue) = queue {
        queue.shutdown().await;
    }

    let response = result?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn build_request(test: String, data: PathBuf, workbook: PathBuf, filter_by: FilterBy) -> anyhow::Result<PipelineRequest> {
    let file_name = |path: &Path| -> anyhow::Result<String> {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("{} is not a file path", path.display()))
    };
    Ok(PipelineRequest {
        test_name: test,
        data_filename: file_name(&data)?,
        data_file_path: data,
        config_filename: file_name(&workbook)?,
        config_file_path: workbook,
        filter_by,
    })
}
