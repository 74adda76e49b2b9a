//! SeaORM entity definitions for the job store tables.

pub mod prelude;

pub mod channels;
pub mod jobs;
pub mod programs;
pub mod tracking_titles;
