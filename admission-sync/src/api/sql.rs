//! SQL literal and identifier rendering for ClickHouse statements

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value assigned by an update statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Render as a ClickHouse literal
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) if f.is_finite() => {
                let s = f.to_string();
                if s.contains('.') || s.contains('e') {
                    s
                } else {
                    format!("{}.0", s)
                }
            }
            SqlValue::Float(_) => "NULL".to_string(),
            SqlValue::Text(s) => quote_string(s),
        }
    }

    /// Plain rendering for CSV artifacts and previews
    pub fn as_plain(&self) -> String {
        match self {
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_plain())
    }
}

/// Single-quoted string literal with backslash and quote escaped
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Backtick-quoted identifier
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

/// `db`.`table`, or just `table` when the database is empty
pub fn qualified_table(database: &str, table: &str) -> String {
    if database.is_empty() {
        quote_identifier(table)
    } else {
        format!("{}.{}", quote_identifier(database), quote_identifier(table))
    }
}

/// Comma-separated identifier list for an `IN (...)` filter
pub fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_string_escapes() {
        assert_eq!(quote_string("四年"), "'四年'");
        assert_eq!(quote_string("it's"), "'it\\'s'");
        assert_eq!(quote_string("a\\b"), "'a\\\\b'");
        assert_eq!(quote_string("x\ty"), "'x\\ty'");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("id"), "`id`");
        assert_eq!(quote_identifier("we`ird"), "`we\\`ird`");
        assert_eq!(
            qualified_table("gaokao", "admission_data"),
            "`gaokao`.`admission_data`"
        );
        assert_eq!(qualified_table("", "t"), "`t`");
    }

    #[test]
    fn test_literals() {
        assert_eq!(SqlValue::Int(612).to_literal(), "612");
        assert_eq!(SqlValue::Float(612.5).to_literal(), "612.5");
        assert_eq!(SqlValue::Float(600.0).to_literal(), "600.0");
        assert_eq!(SqlValue::Float(f64::NAN).to_literal(), "NULL");
        assert_eq!(SqlValue::Text("5".into()).to_literal(), "'5'");
    }

    #[test]
    fn test_id_list() {
        assert_eq!(id_list(&[1, 2, 3]), "1, 2, 3");
        assert_eq!(id_list(&[]), "");
    }
}
