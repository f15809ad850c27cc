//! Error types.
//!
//! Library modules return typed errors (`TableError`, `FetchError`, ...). The
//! binary folds them into `AppError`, which carries the process exit code:
//!
//! - `2`: configuration / usage errors
//! - `3`: table construction errors
//! - `4`: fetch errors

use crate::domain::{ColumnSlug, DimensionProperty, VariableId};

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<TableError> for AppError {
    fn from(err: TableError) -> Self {
        AppError::new(3, err.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::new(4, err.to_string())
    }
}

/// Errors raised while joining variables into a table.
///
/// These are configuration errors: the dimension list and the loaded data
/// disagree. They are returned to the caller, never recovered from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("dimension `{property}` references variable {variable_id}, which was not loaded")]
    UnknownVariable {
        variable_id: VariableId,
        property: DimensionProperty,
    },

    #[error("metadata for variable {variable_id} is missing required field `{field}`")]
    MissingMetadataField {
        variable_id: VariableId,
        field: &'static str,
    },

    #[error("metadata id {found} does not match requested variable {variable_id}")]
    MetadataIdMismatch {
        variable_id: VariableId,
        found: VariableId,
    },

    #[error(
        "data for variable {variable_id} is malformed: {years} years, {entities} entities, {values} values"
    )]
    MalformedData {
        variable_id: VariableId,
        years: usize,
        entities: usize,
        values: usize,
    },

    #[error("column slug `{slug}` is bound to both variable {first} and variable {second}")]
    SlugConflict {
        slug: ColumnSlug,
        first: VariableId,
        second: VariableId,
    },
}

/// Errors raised by the variable fetch layer.
///
/// `Clone` because a coalesced load hands the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("invalid variable id {0} (ids are positive integers)")]
    InvalidVariableId(VariableId),

    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("failed to read {path}: {message}")]
    Io {
        path: String,
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl FetchError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network { .. } => true,
            FetchError::Io { kind, .. } => !matches!(
                kind,
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::InvalidInput
            ),
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::InvalidVariableId(_) | FetchError::Parse { .. } => false,
        }
    }
}

/// Errors raised while assembling `ChartsConfig`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no data API configured: set CHARTS_DATA_API_URL (or pass --base-url / --data-dir)")]
    MissingDataApi,

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Errors raised while drawing a chart from a built table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("column `{0}` is not in the table")]
    MissingColumn(ColumnSlug),

    #[error("{0}")]
    Other(String),
}
