use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, warn};

use crate::app::ports::TableSource;
use crate::common::error::SourceError;
use crate::domain::{RawSample, Workbook};

/// Reads capture tables as a JSON array or NDJSON, and workbooks as a JSON
/// object of sheet name to row objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTableSource;

impl JsonTableSource {
    pub fn new() -> Self {
        Self
    }

    async fn read(path: &Path) -> Result<String, SourceError> {
        tokio::fs::read_to_string(path).await.map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn parse_rows<T: DeserializeOwned>(path: &Path, content: &str) -> Result<Vec<T>, SourceError> {
        let malformed = |line: Option<usize>, e: serde_json::Error| SourceError::Malformed {
            path: path.display().to_string(),
            message: match line {
                Some(n) => format!("line {}: {}", n, e),
                None => e.to_string(),
            },
        };

        if content.trim_start().starts_with('[') {
            return serde_json::from_str(content).map_err(|e| malformed(None, e));
        }
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| serde_json::from_str(line).map_err(|e| malformed(Some(i + 1), e)))
            .collect()
    }
}

#[async_trait]
impl TableSource for JsonTableSource {
    async fn load_samples(&self, path: &Path) -> Result<Vec<RawSample>, SourceError> {
        let content = Self::read(path).await?;
        let samples: Vec<RawSample> = Self::parse_rows(path, &content)?;
        debug!(path = %path.display(), rows = samples.len(), "Loaded capture table");
        Ok(samples)
    }

    async fn load_workbook(&self, path: &Path) -> Result<Workbook, SourceError> {
        let content = Self::read(path).await?;
        let workbook: Workbook = serde_json::from_str(&content).map_err(|e| SourceError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let sheets: Vec<&str> = workbook.sheet_names().collect();
        debug!(path = %path.display(), sheets = ?sheets, "Loaded configuration workbook");
        let unrecognized = workbook.unrecognized_sheets();
        if !unrecognized.is_empty() {
            warn!(path = %path.display(), sheets = ?unrecognized, "Ignoring unrecognized workbook sheets");
        }
        Ok(workbook)
    }
}
