use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reconciling a configuration workbook onto a raw table.
/// Serializable so a queue worker can hand one back to the submitter.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnrichError {
    #[error("Sheet '{sheet}' is missing required column '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Invalid valid-voltage '{value}' for testpoint '{testpoint}': expected a number, an empty cell or 'spec_min'")]
    InvalidValidVoltage { testpoint: String, value: String },

    #[error("Rails to Rename forms a cycle through '{0}'")]
    RenameCycle(String),
}

/// Errors loading raw tables and workbooks from disk.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed table '{path}': {message}")]
    Malformed { path: String, message: String },
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed for artifact '{name}': {source}")]
    Serialization {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact prefix: {0}")]
    InvalidPrefix(String),
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{test} analysis failed: {message}")]
    Failed { test: String, message: String },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Task queue is closed")]
    Closed,

    #[error("Unknown job id: {0}")]
    UnknownJob(String),

    #[error("Worker dropped job {0} before completing it")]
    WorkerLost(String),

    #[error("Job payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Failure of a pipeline run. A run that returns this never produced a
/// completion response.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No pipeline registered for test '{0}'")]
    UnsupportedTest(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Stage '{stage}' failed on worker: {message}")]
    JobFailed { stage: String, message: String },

    #[error("Illegal pipeline transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Pipeline run was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
