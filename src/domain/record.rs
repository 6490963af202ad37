use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::sample::{CaptureStats, SampleKey};
use crate::common::constants::SPEC_MIN_TOKEN;

/// Voltage threshold policy used when validating a rail's power-on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidVoltage {
    /// Use the rail's own `spec_min` as the threshold
    SpecMin,
    Volts(f64),
}

impl Serialize for ValidVoltage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValidVoltage::SpecMin => serializer.serialize_str(SPEC_MIN_TOKEN),
            ValidVoltage::Volts(v) => serializer.serialize_f64(*v),
        }
    }
}

impl<'de> Deserialize<'de> for ValidVoltage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_f64()
                .map(ValidVoltage::Volts)
                .ok_or_else(|| de::Error::custom("valid_voltage is not a finite number")),
            Value::String(s) if s.trim().eq_ignore_ascii_case(SPEC_MIN_TOKEN) => {
                Ok(ValidVoltage::SpecMin)
            }
            other => Err(de::Error::custom(format!(
                "valid_voltage must be a number or '{}', found {}",
                SPEC_MIN_TOKEN, other
            ))),
        }
    }
}

/// Fields attached to a row by the enrichment engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RailTags {
    #[serde(default)]
    pub edge_rail: bool,
    #[serde(default)]
    pub associated_rail: Option<String>,
    #[serde(default)]
    pub spec_max: Option<f64>,
    #[serde(default)]
    pub spec_min: Option<f64>,
    #[serde(default)]
    pub expected_nominal: Option<f64>,
    #[serde(default)]
    pub current_rail: bool,
    #[serde(default)]
    pub max_power: Option<f64>,
    #[serde(default)]
    pub trace_order: Option<u32>,
    #[serde(default)]
    pub power_on_time_spec: Option<f64>,
    #[serde(default)]
    pub valid_voltage: Option<ValidVoltage>,
    #[serde(default)]
    pub to_rail: Option<String>,
    #[serde(default)]
    pub to_rail_timing_spec: Option<f64>,
}

/// A fully keyed, enriched capture row. Only the cleanup stage builds these,
/// so an enriched table can never be fed back through enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub key: SampleKey,
    #[serde(flatten)]
    pub capture: CaptureStats,
    #[serde(flatten)]
    pub rail: RailTags,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Columns a persisted record writes itself. A raw column with one of these
/// names would serialize twice, so it is kept under a `raw_` prefix instead.
const OWNED_COLUMNS: &[&str] = &[
    "_id",
    "dut",
    "pba",
    "rework",
    "serial_number",
    "runid",
    "scope_channel",
    "testpoint",
    "min",
    "mean",
    "max",
    "pk2pk",
    "waveform_location",
    "edge_rail",
    "associated_rail",
    "spec_max",
    "spec_min",
    "expected_nominal",
    "current_rail",
    "max_power",
    "trace_order",
    "power_on_time_spec",
    "valid_voltage",
    "to_rail",
    "to_rail_timing_spec",
];

impl EnrichedRecord {
    /// Build a record, moving uninterpreted columns that collide with owned
    /// ones out of the way.
    pub fn seal(
        key: SampleKey,
        capture: CaptureStats,
        rail: RailTags,
        extra: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            key,
            capture,
            rail,
            extra: shelter_owned_columns(extra),
        }
    }

    pub fn testpoint(&self) -> &str {
        &self.key.testpoint
    }
}

fn shelter_owned_columns(extra: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let (owned, mut kept): (BTreeMap<_, _>, BTreeMap<_, _>) = extra
        .into_iter()
        .partition(|(name, _)| OWNED_COLUMNS.contains(&name.as_str()));

    for (name, value) in owned {
        let mut renamed = format!("raw_{}", name);
        while kept.contains_key(&renamed) {
            renamed = format!("raw_{}", renamed);
        }
        kept.insert(renamed, value);
    }
    kept
}

pub type EnrichedTable = Vec<EnrichedRecord>;

/// An enriched record after the repository assigned it an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub record: EnrichedRecord,
}
