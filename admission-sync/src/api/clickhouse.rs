//! ClickHouse over its HTTP interface

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::channel::{ColumnInfo, ColumnStats, TargetChannel, TargetRow};
use super::sql::{id_list, quote_identifier, quote_string};
use super::statement::{TableRef, UpdateStatement};
use crate::config::TargetConfig;
use crate::errors::{SyncError, SyncResult};

/// Owned HTTP channel to one ClickHouse table
pub struct ClickHouseChannel {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    table: TableRef,
    /// Columns fetched alongside the identifier by `query_rows`
    select_columns: Vec<String>,
    mutations_sync: Option<u8>,
}

impl ClickHouseChannel {
    /// Build the client and check the server answers `SELECT 1`
    pub async fn connect(config: &TargetConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| SyncError::TargetUnavailable(e.to_string()))?;

        let channel = Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            table: config.table_ref(),
            select_columns: Vec::new(),
            mutations_sync: config.mutations_sync,
        };

        let pong = channel.execute_sql("SELECT 1").await?;
        if pong.trim() != "1" {
            return Err(SyncError::TargetUnavailable(format!(
                "unexpected ping response from {}: {}",
                channel.base_url,
                pong.trim()
            )));
        }

        log::info!("Connected to ClickHouse at {} ({})", channel.base_url, channel.table);
        Ok(channel)
    }

    /// Columns returned with each row by `query_rows`
    pub fn with_select_columns(mut self, columns: Vec<String>) -> Self {
        self.select_columns = columns;
        self
    }

    async fn execute_sql(&self, sql: &str) -> SyncResult<String> {
        self.post(sql, &[]).await
    }

    async fn post(&self, sql: &str, settings: &[(&str, String)]) -> SyncResult<String> {
        log::debug!("ClickHouse <- {}", truncate_for_log(sql));

        let mut request = self
            .http
            .post(&self.base_url)
            .header("X-ClickHouse-User", &self.username)
            .header("X-ClickHouse-Key", &self.password)
            .body(sql.to_string());

        if !self.table.database.is_empty() {
            request = request.query(&[("database", self.table.database.as_str())]);
        }
        for (key, value) in settings {
            request = request.query(&[(*key, value.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::TargetUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::TargetUnavailable(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_failure(status, &body))
        }
    }
}

#[async_trait]
impl TargetChannel for ClickHouseChannel {
    fn table(&self) -> &TableRef {
        &self.table
    }

    async fn query_rows(&self, ids: &[i64]) -> SyncResult<Vec<TargetRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_column = &self.table.id_column;
        let mut selected = vec![quote_identifier(id_column)];
        selected.extend(
            self.select_columns
                .iter()
                .filter(|c| *c != id_column)
                .map(|c| quote_identifier(c)),
        );

        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({}) FORMAT TabSeparatedWithNames",
            selected.join(", "),
            self.table.qualified(),
            quote_identifier(id_column),
            id_list(ids)
        );

        let body = self.execute_sql(&sql).await?;
        let (headers, rows) = parse_tsv_with_names(&body);
        rows_from_tsv(&headers, rows, id_column)
    }

    async fn apply(&self, statement: &UpdateStatement) -> SyncResult<()> {
        let settings: Vec<(&str, String)> = self
            .mutations_sync
            .map(|level| vec![("mutations_sync", level.to_string())])
            .unwrap_or_default();

        self.post(&statement.to_sql(), &settings).await?;
        Ok(())
    }

    async fn row_count(&self) -> SyncResult<u64> {
        let sql = format!(
            "SELECT count() FROM {} FORMAT TabSeparated",
            self.table.qualified()
        );
        let body = self.execute_sql(&sql).await?;
        body.trim().parse().map_err(|_| {
            SyncError::TargetRejected(format!("unexpected count response: {}", body.trim()))
        })
    }

    async fn columns(&self) -> SyncResult<Vec<ColumnInfo>> {
        let database = if self.table.database.is_empty() {
            "currentDatabase()".to_string()
        } else {
            quote_string(&self.table.database)
        };
        let sql = format!(
            "SELECT name, type FROM system.columns WHERE database = {} AND table = {} \
             ORDER BY position FORMAT TabSeparated",
            database,
            quote_string(&self.table.table)
        );

        let body = self.execute_sql(&sql).await?;
        Ok(parse_tsv(&body)
            .into_iter()
            .filter_map(|row| {
                let mut fields = row.into_iter();
                let name = fields.next().flatten()?;
                let type_name = fields.next().flatten().unwrap_or_default();
                Some(ColumnInfo { name, type_name })
            })
            .collect())
    }

    async fn column_stats(&self, column: &str, top: usize) -> SyncResult<ColumnStats> {
        let col = quote_identifier(column);
        let numeric = format!("toFloat64OrNull(toString({}))", col);
        let table = self.table.qualified();

        let sql = format!(
            "SELECT count(), count({col}), min({num}), max({num}), avg({num}) FROM {table} \
             FORMAT TabSeparated",
            col = col,
            num = numeric,
            table = table
        );
        let mut stats = stats_from_tsv(column, &self.execute_sql(&sql).await?)?;

        if top > 0 {
            let sql = format!(
                "SELECT toString({col}) AS value, count() AS n FROM {table} \
                 WHERE {col} IS NOT NULL GROUP BY value ORDER BY n DESC, value LIMIT {top} \
                 FORMAT TabSeparated",
                col = col,
                table = table,
                top = top
            );
            stats.top_values = top_values_from_tsv(&self.execute_sql(&sql).await?);
        }

        log::info!(
            "{}.{}: {} of {} rows hold a value",
            self.table,
            column,
            stats.non_null,
            stats.total_rows
        );
        Ok(stats)
    }
}

/// Parse the single aggregate row of the column-stats query
fn stats_from_tsv(column: &str, body: &str) -> SyncResult<ColumnStats> {
    let malformed = || SyncError::TargetRejected(format!("unexpected stats response: {}", body.trim()));

    let row = parse_tsv(body).into_iter().next().ok_or_else(malformed)?;
    let number = |idx: usize| -> Option<f64> {
        row.get(idx)
            .and_then(|v| v.as_deref())
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };
    let count = |idx: usize| number(idx).map(|v| v as u64).ok_or_else(malformed);

    Ok(ColumnStats {
        column: column.to_string(),
        total_rows: count(0)?,
        non_null: count(1)?,
        min: number(2),
        max: number(3),
        avg: number(4),
        top_values: Vec::new(),
    })
}

fn top_values_from_tsv(body: &str) -> Vec<(String, u64)> {
    parse_tsv(body)
        .into_iter()
        .filter_map(|row| {
            let mut fields = row.into_iter();
            let value = fields.next().flatten()?;
            let count = fields.next().flatten()?.parse().ok()?;
            Some((value, count))
        })
        .collect()
}

/// Server exceptions are rejections; a 5xx without one means the server
/// (or a proxy in front of it) is unavailable
fn classify_failure(status: StatusCode, body: &str) -> SyncError {
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    let is_exception = body.contains("DB::Exception") || body.trim_start().starts_with("Code:");

    if status.is_server_error() && !is_exception {
        SyncError::TargetUnavailable(message)
    } else {
        SyncError::TargetRejected(message)
    }
}

fn rows_from_tsv(
    headers: &[String],
    rows: Vec<Vec<Option<String>>>,
    id_column: &str,
) -> SyncResult<Vec<TargetRow>> {
    let id_idx = headers
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| SyncError::TargetRejected(format!("response lacks column {}", id_column)))?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(id) = row
            .get(id_idx)
            .and_then(|v| v.as_deref())
            .and_then(|v| v.parse::<i64>().ok())
        else {
            log::warn!("Skipping target row with unreadable identifier: {:?}", row.get(id_idx));
            continue;
        };

        let target_row = headers
            .iter()
            .zip(&row)
            .enumerate()
            .filter(|(i, _)| *i != id_idx)
            .fold(TargetRow::new(id), |acc, (_, (h, v))| {
                acc.with_field(h, v.as_deref())
            });

        out.push(target_row);
    }
    Ok(out)
}

/// Split a `TabSeparatedWithNames` body into header names and rows
pub fn parse_tsv_with_names(body: &str) -> (Vec<String>, Vec<Vec<Option<String>>>) {
    let mut lines = parse_tsv(body).into_iter();
    let headers = lines
        .next()
        .map(|h| h.into_iter().map(|c| c.unwrap_or_default()).collect())
        .unwrap_or_default();
    (headers, lines.collect())
}

/// Decode `TabSeparated` lines; `\N` is NULL
pub fn parse_tsv(body: &str) -> Vec<Vec<Option<String>>> {
    body.lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split('\t').map(unescape_field).collect())
        .collect()
}

fn unescape_field(raw: &str) -> Option<String> {
    if raw == "\\N" {
        return None;
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}

fn truncate_for_log(sql: &str) -> String {
    const LIMIT: usize = 200;
    if sql.chars().count() <= LIMIT {
        sql.to_string()
    } else {
        let head: String = sql.chars().take(LIMIT).collect();
        format!("{}... ({} chars)", head, sql.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv_with_names() {
        let body = "id\tschool_name\tmajor_min_score_2024\n101\t武汉大学\t612\n102\t华中科技大学\t\\N\n";
        let (headers, rows) = parse_tsv_with_names(body);

        assert_eq!(headers, vec!["id", "school_name", "major_min_score_2024"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1].as_deref(), Some("武汉大学"));
        assert_eq!(rows[1][2], None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_field("a\\tb"), Some("a\tb".to_string()));
        assert_eq!(unescape_field("it\\'s"), Some("it's".to_string()));
        assert_eq!(unescape_field("c:\\\\x"), Some("c:\\x".to_string()));
        assert_eq!(unescape_field(""), Some(String::new()));
        assert_eq!(unescape_field("\\N"), None);
    }

    #[test]
    fn test_rows_from_tsv_keeps_duplicates() {
        let (headers, rows) = parse_tsv_with_names("id\tschool_name\n42\tA\n42\tB\nx\tC\n");
        let rows = rows_from_tsv(&headers, rows, "id").unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.id == 42));
        assert_eq!(rows[1].fields["school_name"].as_deref(), Some("B"));
        assert!(!rows[0].fields.contains_key("id"));
    }

    #[test]
    fn test_rows_without_id_column() {
        let err = rows_from_tsv(&["name".to_string()], vec![], "id").unwrap_err();
        assert!(matches!(err, SyncError::TargetRejected(_)));
    }

    #[test]
    fn test_classify_failure() {
        let rejected = classify_failure(
            StatusCode::NOT_FOUND,
            "Code: 60. DB::Exception: Table gaokao.nope does not exist",
        );
        assert!(matches!(rejected, SyncError::TargetRejected(_)));

        let exception_500 = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Code: 62. DB::Exception: Syntax error",
        );
        assert!(matches!(exception_500, SyncError::TargetRejected(_)));

        let gateway = classify_failure(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(gateway.is_unavailable());
    }

    #[test]
    fn test_stats_from_tsv() {
        let stats = stats_from_tsv("major_min_score_2024", "6512\t4820\t401\t689\t553.25\n").unwrap();
        assert_eq!(stats.total_rows, 6512);
        assert_eq!(stats.non_null, 4820);
        assert_eq!(stats.min, Some(401.0));
        assert_eq!(stats.max, Some(689.0));
        assert_eq!(stats.avg, Some(553.25));

        let text_column = stats_from_tsv("study_years", "10\t3\t\\N\t\\N\tnan\n").unwrap();
        assert_eq!(text_column.non_null, 3);
        assert_eq!(text_column.min, None);
        assert_eq!(text_column.avg, None);

        assert!(stats_from_tsv("c", "").is_err());
    }

    #[test]
    fn test_top_values_from_tsv() {
        let top = top_values_from_tsv("四年\t120\n五年\t8\n\\N\t1\n");
        assert_eq!(top, vec![("四年".to_string(), 120), ("五年".to_string(), 8)]);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("SELECT 1"), "SELECT 1");
        let long = "x".repeat(500);
        assert!(truncate_for_log(&long).ends_with("(500 chars)"));
    }
}
