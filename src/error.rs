// ABOUTME: Error taxonomy for connection resolution, job submission and result retrieval
// ABOUTME: Each variant carries the dialect, job id or field needed to act on it

use std::fmt;
use std::time::Duration;

/// Which side of a comparison failed to resolve from upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
    Both,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
            Side::Both => write!(f, "source and target"),
        }
    }
}

#[derive(Debug)]
pub enum DiffError {
    MalformedConnection(String),
    UnsupportedDialect(String),
    MissingConnectionField { dialect: String, field: String },
    MissingTable(String),
    UnresolvedUpstream { side: Side },
    UnknownJob(String),
    ComparisonTimeout { job_id: String, waited: Duration },
    ComparisonFailed { job_id: String, message: String },
    /// A retryable failure that persisted through every allowed attempt.
    Transient { attempts: u32, message: String },
    Permanent { status: Option<u16>, message: String },
    InvalidPayload(String),
    InvalidOptions(String),
}

impl DiffError {
    pub fn missing_field(dialect: impl Into<String>, field: impl Into<String>) -> Self {
        DiffError::MissingConnectionField {
            dialect: dialect.into(),
            field: field.into(),
        }
    }

    /// HTTP status of a permanent backend failure, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DiffError::Permanent { status, .. } => *status,
            _ => None,
        }
    }
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiffError::MalformedConnection(msg) => write!(f, "Malformed connection: {}", msg),
            DiffError::UnsupportedDialect(dialect) => {
                write!(f, "Unsupported dialect: '{}'", dialect)
            }
            DiffError::MissingConnectionField { dialect, field } => write!(
                f,
                "Connection error: {} connection is missing required field '{}'",
                dialect, field
            ),
            DiffError::MissingTable(msg) => write!(f, "Missing table: {}", msg),
            DiffError::UnresolvedUpstream { side } => write!(
                f,
                "Upstream error: could not resolve a connection for the {} side. Check the upstream node output",
                side
            ),
            DiffError::UnknownJob(id) => {
                write!(f, "Unknown job: backend has no comparison with id '{}'", id)
            }
            DiffError::ComparisonTimeout { job_id, waited } => write!(
                f,
                "Timeout error: comparison '{}' did not finish within {}s",
                job_id,
                waited.as_secs()
            ),
            DiffError::ComparisonFailed { job_id, message } => {
                write!(f, "Comparison error: job '{}' failed: {}", job_id, message)
            }
            DiffError::Transient { attempts, message } => write!(
                f,
                "Backend error: still failing after {} attempts: {}",
                attempts, message
            ),
            DiffError::Permanent {
                status: Some(status),
                message,
            } => write!(f, "Backend error: request rejected with status {}: {}", status, message),
            DiffError::Permanent {
                status: None,
                message,
            } => write!(f, "Backend error: {}", message),
            DiffError::InvalidPayload(msg) => write!(f, "Payload error: {}", msg),
            DiffError::InvalidOptions(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for DiffError {}

pub type Result<T> = std::result::Result<T, DiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_dialect_and_field() {
        let err = DiffError::missing_field("clickzetta", "vcluster");
        let text = err.to_string();
        assert!(text.contains("clickzetta"));
        assert!(text.contains("vcluster"));
    }

    #[test]
    fn test_timeout_and_failure_are_distinct() {
        let timeout = DiffError::ComparisonTimeout {
            job_id: "j1".into(),
            waited: Duration::from_secs(30),
        };
        let failed = DiffError::ComparisonFailed {
            job_id: "j1".into(),
            message: "boom".into(),
        };
        assert!(timeout.to_string().starts_with("Timeout error"));
        assert!(failed.to_string().contains("boom"));
    }

    #[test]
    fn test_unresolved_upstream_reports_side() {
        let err = DiffError::UnresolvedUpstream { side: Side::Both };
        assert!(err.to_string().contains("source and target"));
    }
}
