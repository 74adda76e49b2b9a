//! Small shared helpers

pub mod human_format;
