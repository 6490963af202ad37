use std::collections::{BTreeMap, HashSet};

use crate::common::constants::MAX_SHEET_NAME_LEN;
use crate::domain::{FilterBy, PersistedRecord};

/// Rows sharing the leading `filter_by.depth()` key levels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup<'a> {
    pub key: Vec<String>,
    pub rows: Vec<&'a PersistedRecord>,
}

/// Group persisted rows by filter granularity. Groups come back ordered by
/// key; `FilterBy::Default` yields a single group with an empty key.
pub fn group_rows(table: &[PersistedRecord], filter_by: FilterBy) -> Vec<RowGroup<'_>> {
    let depth = filter_by.depth();
    let mut groups: BTreeMap<Vec<String>, Vec<&PersistedRecord>> = BTreeMap::new();
    for row in table {
        let key = row.record.key.levels()[..depth]
            .iter()
            .map(|level| level.to_string())
            .collect();
        groups.entry(key).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(key, rows)| RowGroup { key, rows })
        .collect()
}

/// Sheet names for each group key, in input order. Empty keys use `fallback`.
/// Names are stripped of characters spreadsheet tools reject, truncated and
/// made unique with a `~N` suffix.
pub fn sheet_names(keys: &[Vec<String>], fallback: &str) -> Vec<String> {
    let mut taken = HashSet::new();
    keys.iter()
        .map(|key| {
            let joined = if key.is_empty() { fallback.to_string() } else { key.join("_") };
            let mut base = sanitize(&joined);
            if base.is_empty() {
                base = sanitize(fallback);
            }
            let mut name = truncate(&base, MAX_SHEET_NAME_LEN);
            let mut n = 2;
            while !taken.insert(name.to_lowercase()) {
                let suffix = format!("~{}", n);
                name = format!("{}{}", truncate(&base, MAX_SHEET_NAME_LEN - suffix.len()), suffix);
                n += 1;
            }
            name
        })
        .collect()
}

fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect::<String>()
        .trim_matches('\'')
        .trim()
        .to_string()
}

fn truncate(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnrichedRecord, SampleKey};
    use uuid::Uuid;

    fn row(dut: &str, runid: &str, testpoint: &str) -> PersistedRecord {
        PersistedRecord {
            id: Uuid::new_v4(),
            record: EnrichedRecord {
                key: SampleKey {
                    dut: dut.into(),
                    pba: "PBA-100".into(),
                    rework: "0".into(),
                    serial_number: "SN1".into(),
                    runid: runid.into(),
                    scope_channel: "CH1".into(),
                    testpoint: testpoint.into(),
                },
                capture: Default::default(),
                rail: Default::default(),
                extra: Default::default(),
            },
        }
    }

    #[test]
    fn test_grouping_granularity() {
        let table = vec![row("A", "1", "V1"), row("A", "2", "V1"), row("B", "1", "V2")];

        assert_eq!(group_rows(&table, FilterBy::Default).len(), 1);
        let by_dut = group_rows(&table, FilterBy::Dut);
        assert_eq!(by_dut.len(), 2);
        assert_eq!(by_dut[0].key, vec!["A".to_string()]);
        assert_eq!(by_dut[0].rows.len(), 2);
        assert_eq!(group_rows(&table, FilterBy::Runid).len(), 3);
    }

    #[test]
    fn test_sheet_names_are_clean_short_and_unique() {
        let long = "X".repeat(40);
        let keys = vec![
            vec![],
            vec!["DUT/1".into(), "PBA:2".into()],
            vec![long.clone()],
            vec![long],
        ];
        let names = sheet_names(&keys, "Sequencing");

        assert_eq!(names[0], "Sequencing");
        assert_eq!(names[1], "DUT1_PBA2");
        assert_eq!(names[2].len(), 31);
        assert_eq!(names[3].len(), 31);
        assert!(names[3].ends_with("~2"));
    }
}
