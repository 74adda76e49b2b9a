//! Job scheduling subsystem for kaede
//!
//! The scheduler loads due jobs from a [`JobStore`], arms one deadline per job
//! in a [`DeadlineMux`] and dispatches a recording whenever one fires. Reload
//! and stop requests arrive as counting [`Signal`]s through a
//! [`SchedulerHandle`], which transports (process signals, RPC, ...) share.

pub mod api;
pub mod deadline;
pub mod scheduler;
pub mod store;
pub mod types;

pub use api::SchedulerHandle;
pub use deadline::{DeadlineHandle, DeadlineMux, Signal, SignalHandle};
pub use scheduler::Scheduler;
pub use store::JobStore;
pub use types::*;
