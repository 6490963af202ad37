use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::common::constants::{ARTIFACT_RANDOM_LEN, REPORT_EXTENSION, TABLE_EXTENSION};
use crate::common::error::ArtifactError;

/// Name of a stored artifact, relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Accepts a bare file name or a path; only the file name is kept.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        Self(file_name)
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared directory for intermediate tables handed between stages.
///
/// Every write allocates a fresh `<prefix>_<20 random alphanumerics>.<ext>`
/// file with `create_new`, so concurrent runs never share a name.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, artifact: &ArtifactRef) -> PathBuf {
        self.root.join(artifact.name())
    }

    pub fn exists(&self, artifact: &ArtifactRef) -> bool {
        self.path_of(artifact).is_file()
    }

    /// Write rows as NDJSON.
    pub fn write_table<T: Serialize>(&self, prefix: &str, rows: &[T]) -> Result<ArtifactRef, ArtifactError> {
        let (artifact, file) = self.allocate(prefix, TABLE_EXTENSION)?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row).map_err(|source| ArtifactError::Serialization {
                name: artifact.name().to_string(),
                source,
            })?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        debug!(artifact = %artifact, rows = rows.len(), "Wrote table artifact");
        Ok(artifact)
    }

    pub fn read_table<T: DeserializeOwned>(&self, artifact: &ArtifactRef) -> Result<Vec<T>, ArtifactError> {
        let reader = BufReader::new(self.open_existing(artifact)?);
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row = serde_json::from_str(&line).map_err(|source| ArtifactError::Serialization {
                name: artifact.name().to_string(),
                source,
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Write a single JSON document (analysis reports).
    pub fn write_document<T: Serialize>(&self, prefix: &str, document: &T) -> Result<ArtifactRef, ArtifactError> {
        let (artifact, file) = self.allocate(prefix, REPORT_EXTENSION)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document).map_err(|source| {
            ArtifactError::Serialization { name: artifact.name().to_string(), source }
        })?;
        writer.flush()?;
        debug!(artifact = %artifact, "Wrote document artifact");
        Ok(artifact)
    }

    pub fn read_document<T: DeserializeOwned>(&self, artifact: &ArtifactRef) -> Result<T, ArtifactError> {
        let reader = BufReader::new(self.open_existing(artifact)?);
        serde_json::from_reader(reader).map_err(|source| ArtifactError::Serialization {
            name: artifact.name().to_string(),
            source,
        })
    }

    pub fn remove(&self, artifact: &ArtifactRef) -> Result<(), ArtifactError> {
        match fs::remove_file(self.path_of(artifact)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ArtifactError::NotFound(artifact.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn open_existing(&self, artifact: &ArtifactRef) -> Result<File, ArtifactError> {
        File::open(self.path_of(artifact)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ArtifactError::NotFound(artifact.to_string()),
            _ => ArtifactError::Io(e),
        })
    }

    fn allocate(&self, prefix: &str, extension: &str) -> Result<(ArtifactRef, File), ArtifactError> {
        if prefix.is_empty()
            || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ArtifactError::InvalidPrefix(prefix.to_string()));
        }
        loop {
            let artifact = ArtifactRef(format!("{}_{}.{}", prefix, random_suffix(), extension));
            match OpenOptions::new().write(true).create_new(true).open(self.path_of(&artifact)) {
                Ok(file) => return Ok((artifact, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ARTIFACT_RANDOM_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaptureStats, EnrichedRecord, RailTags, SampleKey, ValidVoltage};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn record(testpoint: &str, mean: f64) -> EnrichedRecord {
        EnrichedRecord {
            key: SampleKey {
                dut: "DUT1".into(),
                pba: "PBA".into(),
                rework: "0".into(),
                serial_number: "SN1".into(),
                runid: "3".into(),
                scope_channel: "CH4".into(),
                testpoint: testpoint.into(),
            },
            capture: CaptureStats {
                mean: Some(mean),
                max: Some(mean + 0.1),
                waveform_location: Some("s3://captures/run3/ch4.bin".into()),
                ..Default::default()
            },
            rail: RailTags {
                trace_order: Some(2),
                valid_voltage: Some(ValidVoltage::SpecMin),
                spec_min: Some(0.1 + 0.2),
                ..Default::default()
            },
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_table_round_trip() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let rows = vec![record("V1P8", 1.8012345678901234), record("V3P3", 3.3)];

        let artifact = store.write_table("sequencing_clean", &rows).unwrap();
        let back: Vec<EnrichedRecord> = store.read_table(&artifact).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_generated_names() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let a = store.write_table::<EnrichedRecord>("inrush_clean", &[]).unwrap();
        let b = store.write_table::<EnrichedRecord>("inrush_clean", &[]).unwrap();
        assert_ne!(a, b);

        let name = a.name();
        assert!(name.starts_with("inrush_clean_"));
        assert!(name.ends_with(".ndjson"));
        let random = &name["inrush_clean_".len()..name.len() - ".ndjson".len()];
        assert_eq!(random.len(), 20);
        assert!(random.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_missing_and_invalid() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let missing = ArtifactRef::new("nope_00000000000000000000.ndjson");
        assert!(matches!(
            store.read_table::<EnrichedRecord>(&missing),
            Err(ArtifactError::NotFound(_))
        ));
        assert!(matches!(
            store.write_document("../escape", &serde_json::json!({})),
            Err(ArtifactError::InvalidPrefix(_))
        ));
    }
}
