//! In-memory rectangular table produced by the reader and consumed by the
//! shape stage

use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Empty cells and whitespace-only text count as null
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual rendering used for equality predicates and text columns
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(format_float(*f)),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(f) => Some(*f),
            Cell::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{}", text),
            None => Ok(()),
        }
    }
}

/// Whole floats render without a fractional part ("612", not "612.0")
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Rows of cells under a header row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table from headers and rows. Short rows are padded with empty
    /// cells and long rows truncated so the table stays rectangular.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Slice a raw grid at `header_offset`: that row becomes the header, the
    /// rows after it become data. Fully empty trailing rows are dropped.
    pub fn from_grid(grid: &[Vec<Cell>], header_offset: usize) -> Option<Self> {
        let header_row = grid.get(header_offset)?;
        let headers = dedupe_headers(header_row);

        let mut rows: Vec<Vec<Cell>> = grid[header_offset + 1..].to_vec();
        while rows
            .last()
            .is_some_and(|row| row.iter().all(Cell::is_null))
        {
            rows.pop();
        }

        Some(Self::new(headers, rows))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Header text for a cell; blanks become "Unnamed: <idx>" and repeats get a
/// ".1", ".2" suffix, bumped past any name already taken
fn dedupe_headers(header_row: &[Cell]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut suffixes: HashMap<String, usize> = HashMap::new();

    header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell
                .as_text()
                .unwrap_or_else(|| format!("Unnamed: {}", idx));

            let mut name = base.clone();
            if taken.contains(&name) {
                let suffix = suffixes.entry(base.clone()).or_insert(0);
                while taken.contains(&name) {
                    *suffix += 1;
                    name = format!("{}.{}", base, suffix);
                }
            }

            taken.insert(name.clone());
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_dedupe_headers() {
        let row = vec![text("id"), text("最低分"), Cell::Empty, text("最低分"), text("最低分")];
        assert_eq!(
            dedupe_headers(&row),
            vec!["id", "最低分", "Unnamed: 2", "最低分.1", "最低分.2"]
        );
    }

    #[test]
    fn test_dedupe_skips_names_already_present() {
        let row = vec![text("最低分"), text("最低分.1"), text("最低分"), text("最低分")];
        let headers = dedupe_headers(&row);
        assert_eq!(headers, vec!["最低分", "最低分.1", "最低分.2", "最低分.3"]);

        let unique: HashSet<&String> = headers.iter().collect();
        assert_eq!(unique.len(), headers.len());
    }

    #[test]
    fn test_from_grid_uses_offset() {
        let grid = vec![
            vec![text("2024年计划数据"), Cell::Empty],
            vec![text("id"), text("生源地")],
            vec![Cell::Int(1), text("湖北")],
            vec![Cell::Int(2), text("湖南")],
            vec![Cell::Empty, Cell::Empty],
        ];

        let table = Table::from_grid(&grid, 1).unwrap();
        assert_eq!(table.headers(), &["id".to_string(), "生源地".to_string()]);
        assert_eq!(table.len(), 2);
        assert!(Table::from_grid(&grid, 10).is_none());
    }

    #[test]
    fn test_rows_are_padded() {
        let table = Table::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![Cell::Int(1)]],
        );
        assert_eq!(table.rows()[0], vec![Cell::Int(1), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn test_cell_text_rendering() {
        assert_eq!(Cell::Float(612.0).as_text(), Some("612".to_string()));
        assert_eq!(Cell::Float(612.5).as_text(), Some("612.5".to_string()));
        assert_eq!(text("  湖北 ").as_text(), Some("湖北".to_string()));
        assert!(text("   ").is_null());
        assert!(!Cell::Int(0).is_null());
    }
}
