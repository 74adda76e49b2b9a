//! Downstream queue of finalized artifacts

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{RecordError, RecordResult};

/// Receives the cabinet filename (without extension) of each finished recording.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, fname: &str) -> RecordResult<()>;
}

/// Appends one filename per line to a plain text file.
pub struct FileWorkQueue {
    path: PathBuf,
    // Serializes appends from concurrent recordings
    lock: Mutex<()>,
}

impl FileWorkQueue {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WorkQueue for FileWorkQueue {
    async fn enqueue(&self, fname: &str) -> RecordResult<()> {
        if fname.contains('\n') {
            return Err(RecordError::Enqueue {
                fname: fname.to_string(),
                message: "filename contains a newline".to_string(),
            });
        }

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| RecordError::filesystem(&self.path, e))?;
        file.write_all(format!("{fname}\n").as_bytes())
            .await
            .map_err(|e| RecordError::filesystem(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| RecordError::filesystem(&self.path, e))?;

        debug!(path = %self.path.display(), fname, "Enqueued artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_one_line_per_artifact() {
        let dir = TempDir::new().unwrap();
        let queue = FileWorkQueue::new(dir.path().join("queue.txt"));

        queue.enqueue("5678_1234 title #6 sub at MX").await.unwrap();
        queue.enqueue("5678_1235 title #7 sub at MX").await.unwrap();

        let contents = std::fs::read_to_string(queue.path()).unwrap();
        assert_eq!(
            contents,
            "5678_1234 title #6 sub at MX\n5678_1235 title #7 sub at MX\n"
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(FileWorkQueue::new(dir.path().join("queue.txt")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue.enqueue(&format!("artifact-{i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let contents = std::fs::read_to_string(queue.path()).unwrap();
        let mut lines: Vec<_> = contents.lines().collect();
        lines.sort();
        assert_eq!(lines.len(), 16);
        assert!(lines.iter().all(|line| line.starts_with("artifact-")));
    }

    #[tokio::test]
    async fn test_rejects_newlines() {
        let dir = TempDir::new().unwrap();
        let queue = FileWorkQueue::new(dir.path().join("queue.txt"));

        let result = queue.enqueue("bad\nname").await;
        assert!(matches!(result, Err(RecordError::Enqueue { .. })));
    }
}
