//! File locations of one recording

use std::path::PathBuf;

use crate::config::StorageConfig;
use crate::models::Program;

/// Paths keyed by program identity, so concurrent recordings never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPaths {
    /// Raw stream as written by the capture tool
    pub raw: PathBuf,
    /// Decoded intermediate stream
    pub cache: PathBuf,
    /// Caption dump
    pub cache_ass: PathBuf,
    cache_dir: PathBuf,
    cabinet_dir: PathBuf,
}

impl RecordingPaths {
    pub fn new(storage: &StorageConfig, program: &Program) -> Self {
        let stem = format!("{}_{}", program.tid, program.pid);
        Self {
            raw: storage.record_dir.join(format!("{stem}.ts")),
            cache: storage.cache_dir.join(format!("{stem}.cache.ts")),
            cache_ass: storage.cache_dir.join(format!("{stem}.raw.ass")),
            cache_dir: storage.cache_dir.clone(),
            cabinet_dir: storage.cabinet_dir.clone(),
        }
    }

    /// Intermediate stream renamed to the human-readable name, ready for repair
    pub fn cache_named(&self, fname: &str) -> PathBuf {
        self.cache_dir.join(format!("{fname}.cache.ts"))
    }

    pub fn cabinet(&self, fname: &str) -> PathBuf {
        self.cabinet_dir.join(format!("{fname}.ts"))
    }

    pub fn cabinet_ass(&self, fname: &str) -> PathBuf {
        self.cabinet_dir.join(format!("{fname}.raw.ass"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::program::tests::sample_program;

    #[test]
    fn test_paths_follow_layout() {
        let storage = StorageConfig {
            record_dir: PathBuf::from("/r"),
            cache_dir: PathBuf::from("/c"),
            cabinet_dir: PathBuf::from("/k"),
            work_queue_path: PathBuf::from("/q"),
        };
        let program = sample_program();
        let paths = RecordingPaths::new(&storage, &program);
        let fname = program.formatted_fname();

        assert_eq!(paths.raw, PathBuf::from("/r/5678_1234.ts"));
        assert_eq!(paths.cache, PathBuf::from("/c/5678_1234.cache.ts"));
        assert_eq!(paths.cache_ass, PathBuf::from("/c/5678_1234.raw.ass"));
        assert_eq!(
            paths.cache_named(&fname),
            PathBuf::from("/c/5678_1234 title #6 sub (comment) at MX.cache.ts")
        );
        assert_eq!(
            paths.cabinet(&fname),
            PathBuf::from("/k/5678_1234 title #6 sub (comment) at MX.ts")
        );
        assert_eq!(
            paths.cabinet_ass(&fname),
            PathBuf::from("/k/5678_1234 title #6 sub (comment) at MX.raw.ass")
        );
    }
}
