//! Read admission workbooks (xlsx/xls/ods) and CSV exports into a [`Table`]
//!
//! The file is read into memory in one pass and the handle dropped before
//! any shaping happens. Header detection then works on the in-memory grid,
//! so trying several offsets never reopens the source.

use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};

use super::columns::{ColumnSpec, ResolvedColumns};
use super::table::{Cell, Table};
use crate::errors::{SyncError, SyncResult};

/// Header offsets tried when none is pinned
pub const DEFAULT_HEADER_CANDIDATES: [usize; 4] = [0, 1, 2, 3];

/// Where to read from and how
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub path: PathBuf,
    /// Worksheet name; first sheet when absent
    pub sheet: Option<String>,
    /// Pinned header offset; auto-detected over 0..=3 when absent
    pub header_offset: Option<usize>,
}

impl SourceOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
            header_offset: None,
        }
    }

    fn candidates(&self) -> Vec<usize> {
        match self.header_offset {
            Some(offset) => vec![offset],
            None => DEFAULT_HEADER_CANDIDATES.to_vec(),
        }
    }
}

/// A table together with the header offset and column bindings that worked
#[derive(Debug, Clone)]
pub struct DetectedTable {
    pub header_offset: usize,
    pub table: Table,
    pub columns: ResolvedColumns,
}

/// Read the source once and pick the first header offset under which every
/// required column resolves
pub fn load_source(options: &SourceOptions, spec: &ColumnSpec) -> SyncResult<DetectedTable> {
    let grid = read_grid(&options.path, options.sheet.as_deref())?;
    log::info!(
        "Read {} raw rows from {}",
        grid.len(),
        options.path.display()
    );
    detect_header(&grid, spec, &options.candidates())
}

/// Try each candidate offset in order; first full resolution wins
pub fn detect_header(
    grid: &[Vec<Cell>],
    spec: &ColumnSpec,
    candidates: &[usize],
) -> SyncResult<DetectedTable> {
    let mut tried = Vec::new();
    let mut last_missing = spec.required_names();

    for &offset in candidates {
        tried.push(offset);

        let Some(table) = Table::from_grid(grid, offset) else {
            log::debug!("Header offset {} is beyond the sheet", offset);
            continue;
        };

        match spec.resolve(table.headers()) {
            Ok(columns) => {
                log::info!(
                    "Using header row {} ({} columns resolved, {} data rows)",
                    offset,
                    columns.len(),
                    table.len()
                );
                return Ok(DetectedTable {
                    header_offset: offset,
                    table,
                    columns,
                });
            }
            Err(missing) => {
                log::debug!("Header offset {} is missing {:?}", offset, missing);
                last_missing = missing;
            }
        }
    }

    Err(SyncError::SchemaAmbiguous {
        tried,
        missing: last_missing,
    })
}

/// Load every row of the source as typed cells
pub fn read_grid(path: &Path, sheet: Option<&str>) -> SyncResult<Vec<Vec<Cell>>> {
    if !path.exists() {
        return Err(SyncError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => read_delimited(path, b','),
        "tsv" => read_delimited(path, b'\t'),
        _ => read_workbook(path, sheet),
    }
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> SyncResult<Vec<Vec<Cell>>> {
    let unavailable = |reason: String| SyncError::SourceUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let mut workbook =
        open_workbook_auto(path).map_err(|e| unavailable(format!("failed to open workbook: {}", e)))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| unavailable("workbook has no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| unavailable(format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    // calamine ranges begin at the first used cell; pad back to A1 so header
    // offsets line up with what a spreadsheet user sees
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid: Vec<Vec<Cell>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col];
        cells.extend(row.iter().map(data_to_cell));
        grid.push(cells);
    }

    Ok(grid)
}

fn read_delimited(path: &Path, delimiter: u8) -> SyncResult<Vec<Vec<Cell>>> {
    let unavailable = |reason: String| SyncError::SourceUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| unavailable(format!("failed to open file: {}", e)))?;

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| unavailable(format!("malformed row: {}", e)))?;
        grid.push(record.iter().map(text_to_cell).collect());
    }

    Ok(grid)
}

/// Convert a calamine cell to a [`Cell`]
fn data_to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Text(format!("{}", dt)),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

/// CSV fields carry no type; infer integer, then float, else text
fn text_to_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Cell::Float(f);
        }
    }
    Cell::Text(field.to_string())
}
