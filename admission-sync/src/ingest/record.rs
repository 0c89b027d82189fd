//! Typed admission records and the identifier -> value mapping fed to the
//! planner

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::columns::logical;
use super::table::{Cell, Table};
use crate::api::sql::SqlValue;
use crate::errors::{SyncError, SyncResult};

/// One admission-offer row after shaping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionRecord {
    pub id: i64,
    pub source_region: String,
    pub college_name: String,
    pub major_name: String,
    pub min_score: Option<f64>,
    pub year: Option<i64>,
    pub study_years: Option<String>,
    pub batch: Option<String>,
}

impl AdmissionRecord {
    /// Build records from a projected, coerced table whose headers are
    /// logical names. Returns the records and the number of rows skipped for
    /// lacking an identifier.
    pub fn from_table(table: &Table) -> SyncResult<(Vec<AdmissionRecord>, usize)> {
        let required = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| SyncError::MissingColumn(name.to_string()))
        };
        let id_idx = required(logical::ID)?;
        let region_idx = required(logical::SOURCE_REGION)?;
        let college_idx = table.column_index(logical::COLLEGE_NAME);
        let major_idx = table.column_index(logical::MAJOR_NAME);
        let score_idx = table.column_index(logical::MIN_SCORE);
        let year_idx = table.column_index(logical::YEAR);
        let study_idx = table.column_index(logical::STUDY_YEARS);
        let batch_idx = table.column_index(logical::BATCH);

        let text_at = |row: &[Cell], idx: Option<usize>| idx.and_then(|i| row[i].as_text());

        let mut records = Vec::with_capacity(table.len());
        let mut skipped = 0;

        for row in table.rows() {
            let Some(id) = row[id_idx].as_i64() else {
                skipped += 1;
                continue;
            };

            records.push(AdmissionRecord {
                id,
                source_region: row[region_idx].as_text().unwrap_or_default(),
                college_name: text_at(row, college_idx).unwrap_or_default(),
                major_name: text_at(row, major_idx).unwrap_or_default(),
                min_score: score_idx.and_then(|i| row[i].as_f64()),
                year: year_idx.and_then(|i| row[i].as_i64()),
                study_years: text_at(row, study_idx),
                batch: text_at(row, batch_idx),
            });
        }

        if skipped > 0 {
            log::warn!("Skipped {} rows without an identifier", skipped);
        }

        Ok((records, skipped))
    }
}

/// Which record attribute is being reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueField {
    /// Major minimum score, written as an integer
    MinScore,
    /// Length of study, written as text
    StudyYears,
}

impl ValueField {
    /// Logical source column holding this attribute
    pub fn logical_column(&self) -> &'static str {
        match self {
            ValueField::MinScore => logical::MIN_SCORE,
            ValueField::StudyYears => logical::STUDY_YEARS,
        }
    }

    pub fn extract(&self, record: &AdmissionRecord) -> Option<SqlValue> {
        match self {
            // The target column is an integer score; fractional spreadsheet
            // values are truncated
            ValueField::MinScore => record.min_score.map(|s| SqlValue::Int(s.trunc() as i64)),
            ValueField::StudyYears => record
                .study_years
                .as_ref()
                .map(|s| SqlValue::Text(s.trim().to_string())),
        }
    }
}

impl std::str::FromStr for ValueField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min_score" | "min-score" => Ok(ValueField::MinScore),
            "study_years" | "study-years" => Ok(ValueField::StudyYears),
            _ => Err(format!("unknown value field '{}'", s)),
        }
    }
}

/// What to do when one identifier carries different values in the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail the run
    Reject,
    /// Last value wins, each conflict logged and reported
    #[default]
    Warn,
    /// Last value wins quietly; conflicts are still reported
    LastWins,
}

/// An identifier seen more than once with differing values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueConflict {
    pub id: i64,
    pub kept: SqlValue,
    pub discarded: Vec<SqlValue>,
}

/// Ordered identifier -> value mapping, unique identifiers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    entries: Vec<(i64, SqlValue)>,
    pub conflicts: Vec<ValueConflict>,
}

impl ValueMap {
    pub fn from_entries(entries: Vec<(i64, SqlValue)>) -> Self {
        let mut map = Self::default();
        let mut positions = HashMap::new();
        for (id, value) in entries {
            map.insert(&mut positions, id, value);
        }
        map
    }

    /// Last write wins, position of first occurrence kept
    fn insert(&mut self, positions: &mut HashMap<i64, usize>, id: i64, value: SqlValue) {
        match positions.get(&id) {
            Some(&pos) => {
                let previous = std::mem::replace(&mut self.entries[pos].1, value.clone());
                if previous != value {
                    match self.conflicts.iter_mut().find(|c| c.id == id) {
                        Some(conflict) => {
                            conflict.discarded.push(previous);
                            conflict.kept = value;
                        }
                        None => self.conflicts.push(ValueConflict {
                            id,
                            kept: value,
                            discarded: vec![previous],
                        }),
                    }
                }
            }
            None => {
                positions.insert(id, self.entries.len());
                self.entries.push((id, value));
            }
        }
    }

    pub fn entries(&self) -> &[(i64, SqlValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> BTreeSet<i64> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// First `n` identifiers in source order
    pub fn sample_ids(&self, n: usize) -> BTreeSet<i64> {
        self.entries.iter().take(n).map(|(id, _)| *id).collect()
    }
}

/// Collapse records into an identifier -> value mapping under `policy`
pub fn build_value_map(
    records: &[AdmissionRecord],
    field: ValueField,
    policy: DuplicatePolicy,
) -> SyncResult<ValueMap> {
    let entries: Vec<(i64, SqlValue)> = records
        .iter()
        .filter_map(|r| field.extract(r).map(|v| (r.id, v)))
        .collect();
    let map = ValueMap::from_entries(entries);

    if !map.conflicts.is_empty() {
        match policy {
            DuplicatePolicy::Reject => {
                return Err(SyncError::DuplicateSourceIdentifier {
                    ids: map.conflicts.iter().map(|c| c.id).collect(),
                });
            }
            DuplicatePolicy::Warn => {
                for conflict in &map.conflicts {
                    log::warn!(
                        "Identifier {} has conflicting values; keeping {} (discarded {:?})",
                        conflict.id,
                        conflict.kept,
                        conflict.discarded.iter().map(|v| v.as_plain()).collect::<Vec<_>>()
                    );
                }
            }
            DuplicatePolicy::LastWins => {
                log::debug!("{} conflicting identifiers collapsed", map.conflicts.len());
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, score: Option<f64>) -> AdmissionRecord {
        AdmissionRecord {
            id,
            source_region: "湖北".to_string(),
            college_name: "武汉大学".to_string(),
            major_name: "计算机科学与技术".to_string(),
            min_score: score,
            year: Some(2024),
            study_years: Some("四年".to_string()),
            batch: None,
        }
    }

    #[test]
    fn test_from_table_skips_missing_ids() {
        let table = Table::new(
            vec!["id".into(), "source_region".into(), "min_score".into()],
            vec![
                vec![Cell::Int(1), Cell::Text("湖北".into()), Cell::Float(600.0)],
                vec![Cell::Empty, Cell::Text("湖北".into()), Cell::Float(590.0)],
            ],
        );
        let (records, skipped) = AdmissionRecord::from_table(&table).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].min_score, Some(600.0));
        assert_eq!(records[0].college_name, "");
        assert_eq!(records[0].study_years, None);
    }

    #[test]
    fn test_min_score_truncates_to_int() {
        let value = ValueField::MinScore.extract(&record(1, Some(612.9)));
        assert_eq!(value, Some(SqlValue::Int(612)));
        assert_eq!(ValueField::MinScore.extract(&record(1, None)), None);
    }

    #[test]
    fn test_value_map_skips_empty_values() {
        let records = vec![record(1, Some(600.0)), record(2, None), record(3, Some(580.0))];
        let map = build_value_map(&records, ValueField::MinScore, DuplicatePolicy::Warn).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.ids().into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_duplicate_last_wins_keeps_first_position() {
        let records = vec![
            record(7, Some(600.0)),
            record(8, Some(590.0)),
            record(7, Some(605.0)),
        ];
        let map =
            build_value_map(&records, ValueField::MinScore, DuplicatePolicy::LastWins).unwrap();

        assert_eq!(
            map.entries(),
            &[(7, SqlValue::Int(605)), (8, SqlValue::Int(590))]
        );
        assert_eq!(map.conflicts.len(), 1);
        assert_eq!(map.conflicts[0].discarded, vec![SqlValue::Int(600)]);
    }

    #[test]
    fn test_duplicate_reject_policy() {
        let records = vec![record(7, Some(600.0)), record(7, Some(605.0))];
        let err =
            build_value_map(&records, ValueField::MinScore, DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateSourceIdentifier { ids } if ids == vec![7]));
    }

    #[test]
    fn test_identical_repeat_is_not_a_conflict() {
        let records = vec![record(7, Some(600.0)), record(7, Some(600.0))];
        let map =
            build_value_map(&records, ValueField::MinScore, DuplicatePolicy::Reject).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.conflicts.is_empty());
    }

    #[test]
    fn test_sample_ids_in_source_order() {
        let map = ValueMap::from_entries(vec![
            (30, SqlValue::Int(1)),
            (10, SqlValue::Int(2)),
            (20, SqlValue::Int(3)),
        ]);
        assert_eq!(map.sample_ids(2).into_iter().collect::<Vec<_>>(), vec![10, 30]);
    }

    #[test]
    fn test_value_field_from_str() {
        assert_eq!("study-years".parse::<ValueField>(), Ok(ValueField::StudyYears));
        assert!("rank".parse::<ValueField>().is_err());
    }
}
