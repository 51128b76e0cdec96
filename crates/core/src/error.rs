//! Error types for certificate generation.

use std::fmt;
use thiserror::Error;

/// A single problem found while validating a participant list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// 1-based position of the offending participant in the input list.
    /// `None` for list-level problems (e.g. an empty list).
    pub row: Option<usize>,
    /// Participant id as given, if any.
    pub participant_id: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue attached to a specific row.
    pub fn row(row: usize, participant_id: impl Into<String>, message: impl Into<String>) -> Self {
        let participant_id = participant_id.into();
        Self {
            row: Some(row),
            participant_id: (!participant_id.is_empty()).then_some(participant_id),
            message: message.into(),
        }
    }

    /// Create an issue about the input as a whole.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            row: None,
            participant_id: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.row, &self.participant_id) {
            (Some(row), Some(id)) => write!(f, "row {} (id '{}'): {}", row, id, self.message),
            (Some(row), None) => write!(f, "row {}: {}", row, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Main error type for the certgen library.
#[derive(Error, Debug)]
pub enum CertificateError {
    /// Bad input shape. Lists every violation, not just the first.
    #[error("Validation failed with {} issue(s): {}", .issues.len(), join_issues(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    /// The run was stopped by the caller.
    #[error("Generation cancelled after {completed} of {total} certificates")]
    Cancelled { completed: usize, total: usize },

    /// Composing a single certificate failed.
    #[error("Rendering failed for participant '{participant_id}': {message}")]
    Render {
        participant_id: String,
        message: String,
    },

    /// Building the output archive failed. There is no fallback for this.
    #[error("Packaging failed: {0}")]
    Packaging(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A run is already in progress on this orchestrator.
    #[error("A generation run is already in progress")]
    AlreadyRunning,

    /// The roster could not be read at all.
    #[error("Roster error: {0}")]
    Roster(String),
}

impl CertificateError {
    /// Shorthand for a validation error with a single general issue.
    pub fn validation(message: impl Into<String>) -> Self {
        CertificateError::Validation {
            issues: vec![ValidationIssue::general(message)],
        }
    }

    /// True when the error represents a deliberate stop rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CertificateError::Cancelled { .. })
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, CertificateError>;

impl From<zip::result::ZipError> for CertificateError {
    fn from(e: zip::result::ZipError) -> Self {
        CertificateError::Packaging(e.to_string())
    }
}

impl From<csv::Error> for CertificateError {
    fn from(e: csv::Error) -> Self {
        CertificateError::Roster(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation_lists_all_issues() {
        let err = CertificateError::Validation {
            issues: vec![
                ValidationIssue::row(1, "u1", "name is empty"),
                ValidationIssue::row(3, "", "id is empty"),
            ],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("row 1 (id 'u1'): name is empty"));
        assert!(msg.contains("row 3: id is empty"));
    }

    #[test]
    fn test_error_display_cancelled() {
        let err = CertificateError::Cancelled {
            completed: 10,
            total: 30,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("10 of 30"));
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_error_display_render() {
        let err = CertificateError::Render {
            participant_id: "u7".to_string(),
            message: "page size is zero".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("u7"));
        assert!(msg.contains("page size is zero"));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn test_error_display_packaging() {
        let err = CertificateError::Packaging("disk full".to_string());
        assert!(format!("{}", err).contains("disk full"));
    }

    #[test]
    fn test_validation_shorthand() {
        let err = CertificateError::validation("participant list is empty");
        match err {
            CertificateError::Validation { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].row, None);
                assert_eq!(issues[0].to_string(), "participant list is empty");
            }
            _ => panic!("Expected Validation"),
        }
    }

    #[test]
    fn test_issue_without_id_omits_it() {
        let issue = ValidationIssue::row(2, "", "id is empty");
        assert!(issue.participant_id.is_none());
    }

    #[test]
    fn test_error_from_zip_error() {
        let zip_err = zip::result::ZipError::FileNotFound;
        let err: CertificateError = zip_err.into();
        match err {
            CertificateError::Packaging(_) => (),
            _ => panic!("Expected Packaging"),
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(CertificateError::AlreadyRunning)
        }
        assert!(returns_error().is_err());
    }
}
