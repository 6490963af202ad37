use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::common::constants::RECOGNIZED_SHEETS;

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Cell as a name. Integral numbers print without a fractional part.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
        }
    }

    /// Cell as a number. Numeric text counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.trim().to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Cell::Empty
        } else {
            Cell::Number(value)
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Number(n) => serializer.serialize_f64(*n),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Cell::Empty,
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            Value::String(s) => Cell::from(s.as_str()),
            Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        })
    }
}

/// One worksheet row, keyed by column header.
pub type SheetRow = BTreeMap<String, Cell>;

/// One worksheet. Headers are whatever keys the rows carry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sheet {
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    pub fn new(rows: Vec<SheetRow>) -> Self {
        Self { rows }
    }

    /// Union of headers across all rows, in first-seen order.
    pub fn headers(&self) -> Vec<&str> {
        let mut headers: Vec<&str> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !headers.contains(&key.as_str()) {
                    headers.push(key);
                }
            }
        }
        headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Multi-sheet configuration workbook.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workbook {
    sheets: BTreeMap<String, Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: impl Into<String>, sheet: Sheet) -> Self {
        self.sheets.insert(name.into(), sheet);
        self
    }

    /// Look a sheet up by name, ignoring case and surrounding whitespace.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name).or_else(|| {
            self.sheets
                .iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    /// Sheets no enrichment step or profile reads.
    pub fn unrecognized_sheets(&self) -> Vec<&str> {
        self.sheet_names()
            .filter(|name| {
                !RECOGNIZED_SHEETS
                    .iter()
                    .any(|known| name.trim().eq_ignore_ascii_case(known))
            })
            .collect()
    }
}
