// Post-processing pipeline: enrichment, stage dispatch and orchestration

pub mod dispatch;
pub mod orchestrator;
pub mod processing;
pub mod profile;
pub mod request;
pub mod response;
pub mod state;
pub mod steps;
pub mod storage;

pub use orchestrator::PipelineOrchestrator;
pub use profile::{ProfileRegistry, TestProfile};
pub use request::{extract_request_paths, PipelineRequest};
pub use response::{format_response, CompletionResponse};
pub use state::{PipelineState, ProgressState, TaskState};
