//! Reading a file while another process is still appending to it

use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::fan_out::CHUNK_SIZE;

/// Stream `path` into `sink` as it grows, like `tail -f` from the start.
///
/// At EOF the file is polled every `poll_interval`. Once `done` is cancelled
/// the writer is known to have exited, so the remaining bytes are drained and
/// `sink` is shut down.
pub async fn follow_file<W>(
    path: &Path,
    poll_interval: Duration,
    done: CancellationToken,
    mut sink: W,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; CHUNK_SIZE * 4];
    let mut total = 0u64;
    let mut draining = false;

    loop {
        let n = file.read(&mut buf).await?;
        if n > 0 {
            sink.write_all(&buf[..n]).await?;
            total += n as u64;
            continue;
        }
        // EOF after the writer exited: nothing more can arrive
        if draining {
            break;
        }
        if done.is_cancelled() {
            draining = true;
            continue;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = done.cancelled() => {}
        }
    }

    sink.shutdown().await?;
    Ok(total)
}
