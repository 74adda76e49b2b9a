//! Size conversions for operator-facing messages

pub const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Size in gibibytes with the fractional part kept
pub fn gib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GIB as f64
}

/// Whole gibibytes, truncated
pub fn whole_gib(bytes: u64) -> u64 {
    bytes / BYTES_PER_GIB
}
