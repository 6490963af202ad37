//! The three dispatchable stages and the runner that executes them.

use async_trait::async_trait;

use crate::common::error::Result;
use crate::pipeline::profile::TestProfile;

/// Common trait for all pipeline stages
#[async_trait]
pub trait PipelineStep: Send + Sync {
    type Input: Send + 'static;

    /// Execute this stage for the given test profile
    async fn execute(&self, profile: &TestProfile, input: Self::Input) -> Result<StageOutput>;

    /// Get the name of this stage
    fn step_name(&self) -> &'static str;
}

pub mod analyze;
pub mod clean;
pub mod job;
pub mod persist;
pub mod runner;

pub use analyze::AnalyzeStep;
pub use clean::{CleanInput, CleanStep};
pub use job::{JobId, StageJob, StageOutput, StageTask};
pub use persist::PersistStep;
pub use runner::StageRunner;
