//! Recording pipeline
//!
//! [`Recorder`] implements [`RecordJob`](crate::job_scheduling::RecordJob):
//! it captures a program to a raw file, tails that file into the decoder and
//! caption dumper, checks the decoded length against [`DurationPolicy`],
//! redoes the decode once on a mismatch and files the result in the cabinet.

pub mod duration;
pub mod fan_out;
pub mod follow;
pub mod paths;
pub mod pipeline;
pub mod tools;

pub use duration::{DurationPolicy, DurationRule};
pub use fan_out::{CHUNK_SIZE, fan_out};
pub use follow::follow_file;
pub use paths::RecordingPaths;
pub use pipeline::Recorder;
pub use tools::ExternalTools;
