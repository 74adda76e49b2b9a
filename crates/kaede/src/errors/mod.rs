//! Centralized error handling for kaede
//!
//! Each layer has its own error enum so callers can tell a storage failure
//! from a tool failure without string matching:
//!
//! - **Store errors**: job/program storage (SeaORM or any other backend)
//! - **Tool errors**: external executables (spawn, exit status, output parsing)
//! - **Record errors**: one recording run, wrapping the two above
//!
//! # Usage
//!
//! ```rust
//! use kaede::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Job Store Results
pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience type alias for Recorder Results
pub type RecordResult<T> = Result<T, RecordError>;

/// Convenience type alias for external tool Results
pub type ToolResult<T> = Result<T, ToolError>;
