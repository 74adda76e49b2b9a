//! Error type definitions for kaede

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Job Store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Recording errors
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// External service errors
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Job Store specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Constraint violations (unique, foreign key, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },
}

/// External tool errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// The executable could not be started
    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The executable ran but reported failure
    #[error("{tool} exited with {status}")]
    ExitStatus { tool: String, status: String },

    /// The executable's output could not be understood
    #[error("Unexpected output from {tool}: {message}")]
    Output { tool: String, message: String },

    /// I/O while talking to the process
    #[error("I/O error with {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Recording pipeline errors
#[derive(Error, Debug)]
pub enum RecordError {
    /// The program for the job could not be loaded
    #[error("Failed to load program {pid}: {source}")]
    Program {
        pid: i64,
        #[source]
        source: StoreError,
    },

    /// An external tool failed
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Filesystem operation failed
    #[error("Filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The downstream work queue rejected the artifact
    #[error("Failed to enqueue {fname}: {message}")]
    Enqueue { fname: String, message: String },

    /// The fan-out pump failed
    #[error("Pipe fan-out failed: {0}")]
    Pump(#[source] std::io::Error),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an external service error
    pub fn external_service<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Create a not-found error for a table lookup
    pub fn not_found<T: Into<String>, F: Into<String>, V: ToString>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }
}

impl ToolError {
    pub fn spawn<S: Into<String>>(tool: S, source: std::io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    pub fn io<S: Into<String>>(tool: S, source: std::io::Error) -> Self {
        Self::Io {
            tool: tool.into(),
            source,
        }
    }

    pub fn output<S: Into<String>, M: Into<String>>(tool: S, message: M) -> Self {
        Self::Output {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Build an error from a failed exit status
    pub fn exit_status<S: Into<String>>(tool: S, status: std::process::ExitStatus) -> Self {
        Self::ExitStatus {
            tool: tool.into(),
            status: status.to_string(),
        }
    }
}

impl RecordError {
    pub fn filesystem<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
