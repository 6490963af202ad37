use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::common::constants::{STAGE_ANALYZE, STAGE_CLEAN, STAGE_PERSIST};
use crate::domain::{FilterBy, TestType};
use crate::pipeline::storage::ArtifactRef;

/// Handle for a job submitted to a task queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stage-specific arguments. Only artifact names and paths cross the
/// dispatch boundary, never tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageTask {
    Clean {
        data_file_path: PathBuf,
        config_file_path: PathBuf,
    },
    Persist {
        artifact: ArtifactRef,
    },
    Analyze {
        artifact: ArtifactRef,
        filter_by: FilterBy,
    },
}

/// A named unit of work, serializable so it can travel through a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageJob {
    pub test_type: TestType,
    #[serde(flatten)]
    pub task: StageTask,
}

impl StageJob {
    pub fn clean(test_type: TestType, data_file_path: impl Into<PathBuf>, config_file_path: impl Into<PathBuf>) -> Self {
        Self {
            test_type,
            task: StageTask::Clean {
                data_file_path: data_file_path.into(),
                config_file_path: config_file_path.into(),
            },
        }
    }

    pub fn persist(test_type: TestType, artifact: ArtifactRef) -> Self {
        Self { test_type, task: StageTask::Persist { artifact } }
    }

    pub fn analyze(test_type: TestType, artifact: ArtifactRef, filter_by: FilterBy) -> Self {
        Self { test_type, task: StageTask::Analyze { artifact, filter_by } }
    }

    pub fn stage_name(&self) -> &'static str {
        match self.task {
            StageTask::Clean { .. } => STAGE_CLEAN,
            StageTask::Persist { .. } => STAGE_PERSIST,
            StageTask::Analyze { .. } => STAGE_ANALYZE,
        }
    }
}

/// What every stage hands back: the artifact it wrote and how many rows
/// (or report sheets) it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    pub artifact: ArtifactRef,
    pub rows: usize,
}
