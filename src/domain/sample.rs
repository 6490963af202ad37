use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The seven identifying columns of a capture row. Every persisted row has
/// all of them; rows missing any are pruned during cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    pub dut: String,
    pub pba: String,
    pub rework: String,
    pub serial_number: String,
    pub runid: String,
    pub scope_channel: String,
    pub testpoint: String,
}

impl SampleKey {
    /// Key parts from coarsest to finest grouping level.
    pub fn levels(&self) -> [&str; 7] {
        [
            &self.dut,
            &self.pba,
            &self.rework,
            &self.serial_number,
            &self.runid,
            &self.scope_channel,
            &self.testpoint,
        ]
    }
}

/// Numeric capture statistics and the waveform location, if any.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptureStats {
    #[serde(default, deserialize_with = "lenient_number")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub mean: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub pk2pk: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub waveform_location: Option<String>,
}

/// One telemetry observation as it arrives from the capture files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(default, deserialize_with = "lenient_text")]
    pub dut: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pba: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rework: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub runid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub scope_channel: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub testpoint: Option<String>,
    #[serde(flatten)]
    pub capture: CaptureStats,
    /// Columns this crate does not interpret, carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RawSample {
    /// Full identifying key, or `None` when any key column is missing.
    pub fn key(&self) -> Option<SampleKey> {
        Some(SampleKey {
            dut: self.dut.clone()?,
            pba: self.pba.clone()?,
            rework: self.rework.clone()?,
            serial_number: self.serial_number.clone()?,
            runid: self.runid.clone()?,
            scope_channel: self.scope_channel.clone()?,
            testpoint: self.testpoint.clone()?,
        })
    }
}

/// Accepts strings, numbers and booleans; blank strings and null become `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a scalar key value, found {}",
            other
        ))),
    }
}

/// Accepts numbers and numeric strings; blank strings and null become `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, found '{}'", s))),
        Some(other) => Err(de::Error::custom(format!(
            "expected a number, found {}",
            other
        ))),
    }
}
