//! Adapters the recorder and scheduler talk to
//!
//! - [`notifier`]: lifecycle events for operators
//! - [`work_queue`]: hand-off of finished artifacts to downstream consumers
//! - [`updater`]: the calendar sync collaborator behind `TriggerUpdate`
//! - [`signals`]: Unix process signals as a control-plane transport

pub mod notifier;
pub mod signals;
pub mod updater;
pub mod work_queue;

pub use notifier::{CaptureStats, LogNotifier, Notifier};
pub use updater::{CommandUpdater, Updater};
pub use work_queue::{FileWorkQueue, WorkQueue};
