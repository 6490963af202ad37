use crate::common::error::EnrichError;
use crate::domain::{Cell, Sheet, SheetRow};

static EMPTY: Cell = Cell::Empty;

/// Headers compare case-insensitively, ignoring spaces, underscores,
/// hyphens and parentheses ("Max Timing (ms)" == "max_timing_ms").
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Find the sheet header matching any of `aliases`.
pub fn find_column(sheet: &Sheet, aliases: &[&str]) -> Option<String> {
    let wanted: Vec<String> = aliases.iter().map(|a| normalize_header(a)).collect();
    sheet
        .headers()
        .into_iter()
        .find(|h| wanted.contains(&normalize_header(h)))
        .map(str::to_string)
}

pub fn require_column(sheet: &Sheet, sheet_name: &str, aliases: &[&str]) -> Result<String, EnrichError> {
    find_column(sheet, aliases).ok_or_else(|| EnrichError::MissingColumn {
        sheet: sheet_name.to_string(),
        column: aliases[0].to_string(),
    })
}

/// Cell under `column`, or an empty cell when the row or column lacks it.
pub fn cell<'a>(row: &'a SheetRow, column: Option<&str>) -> &'a Cell {
    column.and_then(|c| row.get(c)).unwrap_or(&EMPTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_aliases() {
        let mut row = SheetRow::new();
        row.insert("Max Timing (ms)".to_string(), Cell::Number(5.0));
        let sheet = Sheet::new(vec![row]);

        assert_eq!(
            find_column(&sheet, &["max timing", "max_timing_ms"]).as_deref(),
            Some("Max Timing (ms)")
        );
        let err = require_column(&sheet, "Timing", &["from rail"]).unwrap_err();
        assert_eq!(
            err,
            EnrichError::MissingColumn { sheet: "Timing".into(), column: "from rail".into() }
        );
    }
}
