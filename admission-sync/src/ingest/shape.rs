//! Filter & shape stage: row selection, column projection, type coercion

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::table::{Cell, Table};
use crate::errors::{SyncError, SyncResult};

/// One conjunct of a row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Trimmed textual equality
    Equals { column: String, value: String },
    /// Cell is present and not blank
    NotNull { column: String },
}

impl Predicate {
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::NotNull {
            column: column.into(),
        }
    }

    fn column(&self) -> &str {
        match self {
            Predicate::Equals { column, .. } | Predicate::NotNull { column } => column,
        }
    }

    fn test(&self, cell: &Cell) -> bool {
        match self {
            Predicate::Equals { value, .. } => {
                cell.as_text().as_deref() == Some(value.trim())
            }
            Predicate::NotNull { .. } => !cell.is_null(),
        }
    }
}

/// Keep rows satisfying every predicate
pub fn filter(table: &Table, predicates: &[Predicate]) -> SyncResult<Table> {
    let bound: Vec<(usize, &Predicate)> = predicates
        .iter()
        .map(|p| {
            table
                .column_index(p.column())
                .map(|idx| (idx, p))
                .ok_or_else(|| SyncError::MissingColumn(p.column().to_string()))
        })
        .collect::<SyncResult<_>>()?;

    let rows: Vec<Vec<Cell>> = table
        .rows()
        .iter()
        .filter(|row| bound.iter().all(|(idx, p)| p.test(&row[*idx])))
        .cloned()
        .collect();

    log::debug!("Filter kept {} of {} rows", rows.len(), table.len());
    Ok(Table::new(table.headers().to_vec(), rows))
}

/// Rename and narrow to exactly the listed `(old, new)` columns, in order
pub fn project(table: &Table, column_map: &[(String, String)]) -> SyncResult<Table> {
    let indices: Vec<usize> = column_map
        .iter()
        .map(|(old, _)| {
            table
                .column_index(old)
                .ok_or_else(|| SyncError::MissingColumn(old.clone()))
        })
        .collect::<SyncResult<_>>()?;

    let headers = column_map.iter().map(|(_, new)| new.clone()).collect();
    let rows = table
        .rows()
        .iter()
        .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
        .collect();

    Ok(Table::new(headers, rows))
}

/// Declared column type for coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

/// Rows excluded during coercion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoercionReport {
    pub input_rows: usize,
    pub dropped_rows: usize,
    /// Column -> rows dropped because of it (first failing column per row)
    pub dropped_by_column: BTreeMap<String, usize>,
}

/// Cast declared columns; rows whose numeric column fails to parse are
/// dropped and counted rather than failing the run
pub fn coerce(
    table: &Table,
    column_types: &[(String, ColumnType)],
) -> SyncResult<(Table, CoercionReport)> {
    let bound: Vec<(usize, &str, ColumnType)> = column_types
        .iter()
        .map(|(name, ty)| {
            table
                .column_index(name)
                .map(|idx| (idx, name.as_str(), *ty))
                .ok_or_else(|| SyncError::MissingColumn(name.clone()))
        })
        .collect::<SyncResult<_>>()?;

    let mut report = CoercionReport {
        input_rows: table.len(),
        ..Default::default()
    };
    let mut rows = Vec::with_capacity(table.len());

    'rows: for row in table.rows() {
        let mut out = row.clone();
        for &(idx, name, ty) in &bound {
            match coerce_cell(&row[idx], ty) {
                Some(cell) => out[idx] = cell,
                None => {
                    report.dropped_rows += 1;
                    *report.dropped_by_column.entry(name.to_string()).or_insert(0) += 1;
                    continue 'rows;
                }
            }
        }
        rows.push(out);
    }

    if report.dropped_rows > 0 {
        log::warn!(
            "Dropped {} of {} rows that failed type coercion: {:?}",
            report.dropped_rows,
            report.input_rows,
            report.dropped_by_column
        );
    }

    Ok((Table::new(table.headers().to_vec(), rows), report))
}

/// `None` means the value is present but not representable as `ty`
fn coerce_cell(cell: &Cell, ty: ColumnType) -> Option<Cell> {
    if cell.is_null() {
        return Some(Cell::Empty);
    }

    match ty {
        ColumnType::Text => cell.as_text().map(Cell::Text),
        ColumnType::Float => match cell {
            Cell::Int(i) => Some(Cell::Float(*i as f64)),
            Cell::Float(f) => Some(Cell::Float(*f)),
            Cell::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Cell::Float),
            _ => None,
        },
        ColumnType::Integer => match cell {
            Cell::Int(i) => Some(Cell::Int(*i)),
            Cell::Float(f) => whole_float(*f).map(Cell::Int),
            Cell::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_float))
                    .map(Cell::Int)
            }
            _ => None,
        },
    }
}

fn whole_float(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
