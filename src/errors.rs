//! # Error Types
//!
//! Error handling for the refactor store and its collaborators.
//! Errors are cloneable so they can be fanned out on the store's error stream.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Error types that can occur while driving a refactor session.
///
/// Provider failures never reach the caller of `dispatch`; they are
/// published on the store's error stream and the session is closed.
#[derive(Debug, Clone)]
pub enum RefactorError {
    /// A provider rejected (or panicked in) `refactorings_at_point`
    ProviderEnumerationFailure { provider: String, message: String },
    /// A provider rejected (or panicked in) `refactor`
    ProviderExecutionFailure { provider: String, message: String },
    /// Edits returned by a provider could not be applied to a file
    EditApplicationFailure { path: PathBuf, message: String },
    /// An edit does not fit the buffer it was applied to
    InvalidEdit(String),
    /// I/O error reading/writing files
    Io(Arc<std::io::Error>),
    /// Error loading configuration
    Config(String),
}

impl RefactorError {
    /// Short, stable name of the failure class, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RefactorError::ProviderEnumerationFailure { .. } => "provider_enumeration_failure",
            RefactorError::ProviderExecutionFailure { .. } => "provider_execution_failure",
            RefactorError::EditApplicationFailure { .. } => "edit_application_failure",
            RefactorError::InvalidEdit(_) => "invalid_edit",
            RefactorError::Io(_) => "io",
            RefactorError::Config(_) => "config",
        }
    }
}

impl fmt::Display for RefactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefactorError::ProviderEnumerationFailure { provider, message } => {
                write!(f, "Provider '{provider}' failed to list refactorings: {message}")
            }
            RefactorError::ProviderExecutionFailure { provider, message } => {
                write!(f, "Provider '{provider}' failed to refactor: {message}")
            }
            RefactorError::EditApplicationFailure { path, message } => {
                write!(f, "Could not apply edits to {}: {message}", path.display())
            }
            RefactorError::InvalidEdit(msg) => write!(f, "Invalid edit: {msg}"),
            RefactorError::Io(err) => write!(f, "IO error: {err}"),
            RefactorError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for RefactorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RefactorError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RefactorError {
    fn from(err: std::io::Error) -> Self {
        RefactorError::Io(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for RefactorError {
    fn from(err: serde_yaml::Error) -> Self {
        RefactorError::Config(format!("YAML parsing error: {err}"))
    }
}
