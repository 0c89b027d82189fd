// Source ingestion: reading, column resolution and shaping
//
// Turns a provincial admission workbook (or a cleaned CSV) into typed
// records. Everything after this module works on `AdmissionRecord` and
// never sees a raw header again.

pub mod columns;
pub mod reader;
pub mod record;
pub mod shape;
pub mod table;

pub use columns::ColumnSpec;
pub use reader::{DetectedTable, SourceOptions, load_source};
pub use record::{AdmissionRecord, DuplicatePolicy, ValueField, ValueMap, build_value_map};
pub use shape::CoercionReport;

use crate::errors::{SyncError, SyncResult};
use columns::logical;
use shape::{ColumnType, Predicate};

/// Row selection applied before projection
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Keep only rows from this source region (e.g. "湖北")
    pub region: Option<String>,
    /// Attribute whose value must be present
    pub value_field: Option<ValueField>,
}

/// Typed output of the shape stage
#[derive(Debug, Clone)]
pub struct ShapedSource {
    pub header_offset: usize,
    pub raw_rows: usize,
    pub filtered_rows: usize,
    pub records: Vec<AdmissionRecord>,
    pub coercion: CoercionReport,
    pub skipped_without_id: usize,
}

/// Filter, project to logical names, coerce, and build typed records
pub fn shape_records(detected: &DetectedTable, record_filter: &RecordFilter) -> SyncResult<ShapedSource> {
    let columns = &detected.columns;
    let header = |name: &str| columns.get(name).map(|h| h.to_string());

    let mut predicates = Vec::new();
    if let Some(region) = &record_filter.region {
        if let Some(col) = header(logical::SOURCE_REGION) {
            predicates.push(Predicate::equals(col, region.clone()));
        }
    }
    if let Some(col) = header(logical::ID) {
        predicates.push(Predicate::not_null(col));
    }
    if let Some(field) = record_filter.value_field {
        match header(field.logical_column()) {
            Some(col) => predicates.push(Predicate::not_null(col)),
            None => {
                return Err(SyncError::MissingColumn(
                    field.logical_column().to_string(),
                ));
            }
        }
    }

    let filtered = shape::filter(&detected.table, &predicates)?;
    if filtered.is_empty() {
        log::warn!(
            "No rows pass the source filter (region {:?})",
            record_filter.region
        );
    } else {
        log::info!(
            "{} of {} rows pass the source filter",
            filtered.len(),
            detected.table.len()
        );
    }

    let column_map: Vec<(String, String)> = columns
        .iter()
        .map(|(logical_name, actual)| (actual.to_string(), logical_name.to_string()))
        .collect();
    let projected = shape::project(&filtered, &column_map)?;

    let column_types: Vec<(String, ColumnType)> = columns
        .iter()
        .map(|(logical_name, _)| (logical_name.to_string(), declared_type(logical_name)))
        .collect();
    let (coerced, coercion) = shape::coerce(&projected, &column_types)?;

    let (records, skipped_without_id) = AdmissionRecord::from_table(&coerced)?;

    Ok(ShapedSource {
        header_offset: detected.header_offset,
        raw_rows: detected.table.len(),
        filtered_rows: filtered.len(),
        records,
        coercion,
        skipped_without_id,
    })
}

fn declared_type(logical_name: &str) -> ColumnType {
    match logical_name {
        logical::ID | logical::YEAR => ColumnType::Integer,
        logical::MIN_SCORE => ColumnType::Float,
        _ => ColumnType::Text,
    }
}
