//! Duplicating one byte stream into two consumers

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const TS_PACKET_SIZE: usize = 188;
/// Pump chunk size, aligned to transport stream packets
pub const CHUNK_SIZE: usize = TS_PACKET_SIZE * 16;

/// Copy `source` into both sinks until EOF and return the byte count.
///
/// Each chunk is written to `first` and then to `second` before the next
/// read, so a slow sink stalls the pump instead of buffering without bound.
/// Both sinks are shut down and dropped once the source is exhausted, which
/// is what gives a child process on the other end its EOF.
pub async fn fan_out<R, A, B>(mut source: R, mut first: A, mut second: B) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    A: AsyncWrite + Unpin,
    B: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = read_chunk(&mut source, &mut buf).await?;
        if n == 0 {
            break;
        }
        first.write_all(&buf[..n]).await?;
        second.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    first.shutdown().await?;
    second.shutdown().await?;
    Ok(total)
}

/// Fill `buf` completely unless EOF comes first.
async fn read_chunk<R: AsyncRead + Unpin>(
    source: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
