//! Error taxonomy shared by the grammar, registry, resolver, scheduler and store.
//!
//! Each boundary gets its own enum so callers can decide what to retry and what
//! to surface. Only transport failures are ever retried (inside the store
//! client); everything else propagates to the caller unchanged.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Identifier field names, used to say which part of a key failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    Formula,
    Variable,
    Scenario,
    Model,
    Year,
    Dataset,
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyField::Formula => "Formula",
            KeyField::Variable => "Variable",
            KeyField::Scenario => "Scenario",
            KeyField::Model => "Model",
            KeyField::Year => "Year",
            KeyField::Dataset => "Dataset",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid key {key}; {reason}")]
    Malformed { key: String, reason: String },

    #[error("Invalid key {key}; {field} {value} must be one of {allowed}")]
    Invalid {
        key: String,
        field: KeyField,
        value: String,
        allowed: String,
    },
}

impl KeyError {
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        KeyError::Malformed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// The offending field, if this is a validation (not a parse) failure
    pub fn field(&self) -> Option<KeyField> {
        match self {
            KeyError::Invalid { field, .. } => Some(*field),
            KeyError::Malformed { .. } => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("Formula {0} already defined")]
    Duplicate(String),

    #[error("Formula {0} not defined")]
    Unknown(String),

    #[error("Formula {formula} requires a year range of format \"<start>-<end>\", got \"{year}\"")]
    YearRangeRequired { formula: String, year: String },

    #[error("Dataset {0} has no source template")]
    NoSourceTemplate(String),

    #[error("Dataset {0} has no model roster")]
    UnknownDataset(String),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("Required formulae not defined: {}", .0.join(", "))]
    UndefinedFormula(Vec<String>),

    #[error("Existence check failed for {key}: {source}")]
    Existence {
        key: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Tasks cannot be unblocked: {}", .blocked.join(", "))]
    Deadlock { blocked: Vec<String> },

    #[error("Tasks timed out after {waited_secs}s: {}", .in_process.join(", "))]
    Timeout {
        waited_secs: u64,
        in_process: Vec<String>,
    },

    #[error("Task {task} failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: BoxError,
        pending: Vec<String>,
    },

    #[error("Required tasks not defined: {}", .0.join(", "))]
    UndefinedTasks(Vec<String>),

    #[error("Build cancelled with {} tasks pending", .pending.len())]
    Cancelled { pending: Vec<String> },

    #[error("Worker pool failed: {0}")]
    Pool(String),
}

impl SchedulerError {
    /// Task ids that had not completed when the run stopped
    pub fn pending(&self) -> &[String] {
        match self {
            SchedulerError::Deadlock { blocked } => blocked,
            SchedulerError::Timeout { in_process, .. } => in_process,
            SchedulerError::TaskFailed { pending, .. } => pending,
            SchedulerError::UndefinedTasks(ids) => ids,
            SchedulerError::Cancelled { pending } => pending,
            SchedulerError::Pool(_) => &[],
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No transport registered for scheme {0}")]
    UnsupportedScheme(String),

    #[error("Invalid source URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("FTP transfer failed: {0}")]
    Ftp(String),

    #[error("Object {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Transfer cancelled")]
    Cancelled,
}

impl TransportError {
    /// Missing objects and cancellations are not worth another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::NotFound(_)
                | TransportError::Cancelled
                | TransportError::UnsupportedScheme(_)
                | TransportError::InvalidUri { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to fetch {key} after {attempts} attempts: {source}")]
    Fetch {
        key: String,
        attempts: usize,
        #[source]
        source: TransportError,
    },

    #[error("Failed to publish {key}: {source}")]
    Publish {
        key: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to list remote objects under {prefix}: {source}")]
    Listing {
        prefix: String,
        #[source]
        source: TransportError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation on {0} cancelled")]
    Cancelled(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error reading raster {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid raster {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Raster shapes do not match: {0}")]
    Shape(String),
}

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Function {0} not defined")]
    UnknownFunction(String),

    #[error("Function {function} needs {needed} bands, got {got}")]
    NotEnoughBands {
        function: String,
        needed: usize,
        got: usize,
    },
}

/// Failure of one task's fetch, compute and publish cycle
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error("Task {0} has no inputs")]
    NoInputs(String),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field_and_allowed_set() {
        let err = KeyError::Invalid {
            key: "annual_xx_rcp85_CCSM4_2050_nexgddp.tif".to_string(),
            field: KeyField::Variable,
            value: "xx".to_string(),
            allowed: "pr,tasmax,tasmin".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Variable xx"));
        assert!(message.contains("pr,tasmax,tasmin"));
        assert_eq!(err.field(), Some(KeyField::Variable));
    }

    #[test]
    fn test_scheduler_error_reports_pending() {
        let err = SchedulerError::Timeout {
            waited_secs: 5,
            in_process: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.pending().len(), 2);
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_transport_retryable() {
        assert!(TransportError::Http("502".to_string()).is_retryable());
        assert!(!TransportError::NotFound("x".to_string()).is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }
}
