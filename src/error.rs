//! Error types for the acquisition loop
//!
//! Library operations return [`Result`]; the binary wraps these in `anyhow`.

use thiserror::Error;

/// Errors raised while building datasets, fitting models, or running rounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleGateError {
    #[error("Feature '{0}' is an oracle label field and cannot be used as a feature")]
    OracleFieldAsFeature(String),

    #[error("Duplicate oracle name: {0}")]
    DuplicateOracle(String),

    #[error("Duplicate item id: {0}")]
    DuplicateItem(String),

    #[error("Item '{item}' is missing field '{field}'")]
    MissingField { item: String, field: String },

    #[error("Item '{item}' has non-finite value in field '{field}'")]
    NonFiniteValue { item: String, field: String },

    #[error("Unknown item id: {0}")]
    UnknownItem(String),

    #[error("Unknown oracle: {0}")]
    UnknownOracle(String),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Insufficient labels: need at least {required} per class, got {positives} positive / {negatives} negative")]
    InsufficientLabels {
        required: usize,
        positives: usize,
        negatives: usize,
    },

    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("Singular system in ridge solve")]
    SingularSystem,

    #[error("Budget exceeded for oracle '{oracle}': requested {requested}, remaining {remaining}")]
    BudgetExceeded {
        oracle: String,
        requested: usize,
        remaining: usize,
    },

    #[error("Item '{item}' already labeled by oracle '{oracle}'")]
    AlreadyLabeled { item: String, oracle: String },

    #[error("Gate audit failed: {0}")]
    GateAudit(#[from] crate::gate::GateAuditError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result alias for library operations
pub type Result<T> = std::result::Result<T, OracleGateError>;
