//! Error handling for the Nebula action log
//!
//! One error enum covers the store, the exporters and the ambient
//! configuration layer. Callers decide which variants reach the user:
//! storage failures abort startup, export failures are always reported,
//! append failures are only counted and logged.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Nebula action log
#[derive(Error, Debug)]
pub enum NebulaError {
    #[error("Event store unavailable at {location}: {source}")]
    StorageUnavailable {
        location: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Event write failed: {operation} - {message}")]
    WriteFailure { operation: String, message: String },

    #[error("Export to {destination} failed: {source}")]
    ExportIo {
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Export capability unavailable: {capability} support was not compiled in")]
    CapabilityUnavailable { capability: String },

    #[error("No data available: {reason}")]
    NoData { reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Command {command} failed: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for Result with NebulaError
pub type NebulaResult<T> = Result<T, NebulaError>;

impl NebulaError {
    /// Create a storage-unavailable error
    pub fn storage_unavailable(
        location: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StorageUnavailable {
            location: location.into(),
            source: Box::new(source),
        }
    }

    /// Create a write failure
    pub fn write_failure(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an export I/O error
    pub fn export_io(destination: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ExportIo {
            destination: destination.into(),
            source,
        }
    }

    pub fn capability_unavailable(capability: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            capability: capability.into(),
        }
    }

    pub fn no_data(reason: impl Into<String>) -> Self {
        Self::NoData {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn command(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Command {
            command: command.into(),
            source,
        }
    }

    /// True for failures that must stop the process before normal operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NebulaError::StorageUnavailable { .. })
    }
}

impl From<figment::Error> for NebulaError {
    fn from(err: figment::Error) -> Self {
        NebulaError::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_fatal() {
        let fatal = NebulaError::storage_unavailable(
            "/nowhere",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(fatal.is_fatal());
        assert!(!NebulaError::write_failure("append", "disk full").is_fatal());
        assert!(!NebulaError::capability_unavailable("document").is_fatal());
    }

    #[test]
    fn messages_name_the_failing_piece() {
        let err = NebulaError::capability_unavailable("spreadsheet");
        assert_eq!(
            err.to_string(),
            "Export capability unavailable: spreadsheet support was not compiled in"
        );

        let err = NebulaError::export_io(
            "/ro/report.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/ro/report.pdf"));
    }
}
