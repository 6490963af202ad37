use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::common::error::PipelineError;
use crate::domain::FilterBy;

/// Raw submission payload as posted by the upload front end.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionPayload {
    #[serde(default)]
    pub test_name: String,
    #[serde(default)]
    pub data_filename: String,
    #[serde(default)]
    pub data_file_path: String,
    #[serde(default)]
    pub user_input_filename: String,
    #[serde(default)]
    pub user_input_file_path: String,
    #[serde(default)]
    pub filter_by: Option<String>,
}

/// Immutable input to one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub test_name: String,
    pub data_file_path: PathBuf,
    pub data_filename: String,
    pub config_file_path: PathBuf,
    pub config_filename: String,
    pub filter_by: FilterBy,
}

/// Pull the file locations and options out of a submission payload.
///
/// `*_file_path` may be the file itself or the directory holding
/// `*_filename`.
pub fn extract_request_paths(payload: &serde_json::Value) -> Result<PipelineRequest, PipelineError> {
    let payload: SubmissionPayload = serde_json::from_value(payload.clone())
        .map_err(|e| PipelineError::InvalidRequest(format!("malformed payload: {}", e)))?;

    let test_name = required("test_name", &payload.test_name)?;
    let data_filename = required("data_filename", &payload.data_filename)?;
    let data_dir = required("data_file_path", &payload.data_file_path)?;
    let config_filename = required("user_input_filename", &payload.user_input_filename)?;
    let config_dir = required("user_input_file_path", &payload.user_input_file_path)?;

    let filter_by = match payload.filter_by.as_deref() {
        None => FilterBy::Default,
        Some(raw) => raw
            .parse::<FilterBy>()
            .map_err(|bad| PipelineError::InvalidRequest(format!("unknown filter_by '{}'", bad)))?,
    };

    Ok(PipelineRequest {
        test_name,
        data_file_path: resolve(&data_dir, &data_filename),
        data_filename,
        config_file_path: resolve(&config_dir, &config_filename),
        config_filename,
        filter_by,
    })
}

fn required(field: &str, value: &str) -> Result<String, PipelineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidRequest(format!("missing {}", field)));
    }
    Ok(trimmed.to_string())
}

fn resolve(path: &str, filename: &str) -> PathBuf {
    let path = Path::new(path);
    if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
        path.to_path_buf()
    } else {
        path.join(filename)
    }
}
