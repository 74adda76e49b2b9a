//! SeaORM repository implementations

pub mod job_store;

pub use job_store::{ProgramRecord, SeaOrmJobStore};
