//! Error taxonomy for the reconciliation pipeline
//!
//! Fatal conditions are variants of [`SyncError`]. Non-fatal conditions
//! (coercion drops, duplicate target rows, failed batches) are never raised;
//! they are counted and surface in the run report instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source '{}' is unavailable: {reason}", .path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error(
        "could not locate required columns {missing:?} under any header offset (tried {tried:?})"
    )]
    SchemaAmbiguous {
        tried: Vec<usize>,
        missing: Vec<String>,
    },

    #[error("column '{0}' not found in table")]
    MissingColumn(String),

    #[error("target is unavailable: {0}")]
    TargetUnavailable(String),

    #[error("target rejected statement: {0}")]
    TargetRejected(String),

    #[error("{} source identifier(s) map to conflicting values (first: {})", .ids.len(), .ids.first().copied().unwrap_or_default())]
    DuplicateSourceIdentifier { ids: Vec<i64> },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Whether the error means the channel itself is gone, as opposed to one
    /// statement being refused
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SyncError::TargetUnavailable(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_ambiguous_lists_offsets() {
        let err = SyncError::SchemaAmbiguous {
            tried: vec![0, 1, 2, 3],
            missing: vec!["min_score".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("[0, 1, 2, 3]"));
        assert!(text.contains("min_score"));
    }

    #[test]
    fn test_duplicate_source_identifier_message() {
        let err = SyncError::DuplicateSourceIdentifier { ids: vec![42, 7] };
        assert_eq!(
            err.to_string(),
            "2 source identifier(s) map to conflicting values (first: 42)"
        );
    }

    #[test]
    fn test_is_unavailable() {
        assert!(SyncError::TargetUnavailable("refused".into()).is_unavailable());
        assert!(!SyncError::TargetRejected("syntax".into()).is_unavailable());
    }
}
