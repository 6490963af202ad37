use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::analysis::SpecComplianceAnalysis;
use crate::app::ports::AnalysisPlugin;
use crate::common::error::PipelineError;
use crate::domain::TestType;
use crate::pipeline::processing::{CaptureCleanup, CleanupStrategy, WaveformCleanup};

/// Everything test-specific about a pipeline run.
#[derive(Clone)]
pub struct TestProfile {
    pub test_type: TestType,
    pub cleanup: Arc<dyn CleanupStrategy>,
    pub analysis: Arc<dyn AnalysisPlugin>,
    pub file_prefix: String,
}

impl TestProfile {
    pub fn new(
        test_type: TestType,
        cleanup: Arc<dyn CleanupStrategy>,
        analysis: Arc<dyn AnalysisPlugin>,
    ) -> Self {
        Self {
            test_type,
            cleanup,
            analysis,
            file_prefix: test_type.file_prefix().to_string(),
        }
    }

    /// Artifact prefix for a stage's output, e.g. `inrush_clean`.
    pub fn artifact_prefix(&self, stage: &str) -> String {
        format!("{}_{}", self.file_prefix, stage)
    }
}

impl fmt::Debug for TestProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestProfile")
            .field("test_type", &self.test_type)
            .field("cleanup", &self.cleanup.name())
            .field("analysis", &self.analysis.name())
            .field("file_prefix", &self.file_prefix)
            .finish()
    }
}

/// Test type to profile lookup shared by the orchestrator and queue workers.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<TestType, TestProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profiles for every known test type. BER captures carry no rail specs,
    /// so they skip the rail enrichment steps.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for test_type in TestType::ALL {
            let cleanup: Arc<dyn CleanupStrategy> = match test_type {
                TestType::Ber => Arc::new(CaptureCleanup),
                _ => Arc::new(WaveformCleanup),
            };
            let analysis = Arc::new(SpecComplianceAnalysis::new(test_type.display_name()));
            registry.register(TestProfile::new(test_type, cleanup, analysis));
        }
        registry
    }

    /// Replaces any profile already registered for the same test type.
    pub fn register(&mut self, profile: TestProfile) {
        self.profiles.insert(profile.test_type, profile);
    }

    pub fn get(&self, test_type: TestType) -> Result<&TestProfile, PipelineError> {
        self.profiles
            .get(&test_type)
            .ok_or_else(|| PipelineError::UnsupportedTest(test_type.to_string()))
    }

    /// Look up by the free-form test name from a submission.
    pub fn resolve(&self, test_name: &str) -> Result<&TestProfile, PipelineError> {
        let test_type = test_name
            .parse::<TestType>()
            .map_err(PipelineError::UnsupportedTest)?;
        self.get(test_type)
    }
}
