//! Target table reference and the bulk conditional update statement

use serde::{Deserialize, Serialize};

use super::sql::{SqlValue, id_list, qualified_table, quote_identifier};

/// The single table a run reconciles against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub database: String,
    pub table: String,
    /// Integer identifier column shared with the spreadsheet
    pub id_column: String,
}

impl TableRef {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        id_column: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            id_column: id_column.into(),
        }
    }

    pub fn qualified(&self) -> String {
        qualified_table(&self.database, &self.table)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.database.is_empty() {
            write!(f, "{}", self.table)
        } else {
            write!(f, "{}.{}", self.database, self.table)
        }
    }
}

/// One batch rendered as a single mutation: every listed row gets its value,
/// every other row keeps its current one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateStatement {
    pub table: TableRef,
    pub column: String,
    pub assignments: Vec<(i64, SqlValue)>,
}

impl UpdateStatement {
    pub fn ids(&self) -> Vec<i64> {
        self.assignments.iter().map(|(id, _)| *id).collect()
    }

    /// ClickHouse `ALTER TABLE ... UPDATE` text
    pub fn to_sql(&self) -> String {
        let id_col = quote_identifier(&self.table.id_column);
        let col = quote_identifier(&self.column);

        let cases = self
            .assignments
            .iter()
            .map(|(id, value)| format!("WHEN {} THEN {}", id, value.to_literal()))
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "ALTER TABLE {} UPDATE {} = CASE {} {} ELSE {} END WHERE {} IN ({})",
            self.table.qualified(),
            col,
            id_col,
            cases,
            col,
            id_col,
            id_list(&self.ids())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sql_shape() {
        let stmt = UpdateStatement {
            table: TableRef::new("default", "admission_hubei_wide_2024", "id"),
            column: "major_min_score_2024".to_string(),
            assignments: vec![(101, SqlValue::Int(612)), (102, SqlValue::Int(598))],
        };

        assert_eq!(
            stmt.to_sql(),
            "ALTER TABLE `default`.`admission_hubei_wide_2024` UPDATE `major_min_score_2024` = \
             CASE `id` WHEN 101 THEN 612 WHEN 102 THEN 598 ELSE `major_min_score_2024` END \
             WHERE `id` IN (101, 102)"
        );
    }

    #[test]
    fn test_text_values_are_quoted() {
        let stmt = UpdateStatement {
            table: TableRef::new("gaokao", "admission_data", "id"),
            column: "study_years".to_string(),
            assignments: vec![(1, SqlValue::Text("四年".to_string()))],
        };
        assert!(stmt.to_sql().contains("WHEN 1 THEN '四年' ELSE `study_years` END"));
    }

    #[test]
    fn test_table_ref_display() {
        assert_eq!(TableRef::new("gaokao", "t", "id").to_string(), "gaokao.t");
        assert_eq!(TableRef::new("", "t", "id").to_string(), "t");
    }
}
