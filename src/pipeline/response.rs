use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::common::constants::{PROGRESS_COMPLETE, RESPONSE_TIMESTAMP_FORMAT};

/// Success-shaped result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub current: u32,
    pub total: u32,
    pub status: String,
    pub result: String,
    pub filename: String,
}

pub fn format_response(test_name: &str, artifact_location: &str) -> CompletionResponse {
    format_response_at(test_name, artifact_location, Local::now())
}

/// `filename` is only as unique as the timestamp's one-second resolution.
pub fn format_response_at(test_name: &str, artifact_location: &str, at: DateTime<Local>) -> CompletionResponse {
    CompletionResponse {
        current: PROGRESS_COMPLETE,
        total: PROGRESS_COMPLETE,
        status: format!("{} completed!", test_name),
        result: artifact_location.to_string(),
        filename: format!("{}_{}", test_name, at.format(RESPONSE_TIMESTAMP_FORMAT)),
    }
}
