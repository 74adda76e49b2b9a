//! kaede: unattended broadcast recording.
//!
//! The crate is organised around two subsystems:
//!
//! - [`job_scheduling`]: a deadline-driven event loop that arms one timer per
//!   pending job, reacts to reload/stop signals and dispatches recordings.
//! - [`recorder`]: runs one capture job end to end (capture, fan-out to the
//!   decoder and caption dumper, verification, repair and finalisation).
//!
//! Storage, notification, the downstream work queue and the calendar sync are
//! collaborators behind narrow traits so they can be swapped in tests.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod job_scheduling;
pub mod models;
pub mod recorder;
pub mod services;
pub mod utils;
