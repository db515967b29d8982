//! Fixed-size reads and counted writes over a gateway stream.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Writes `buf` until done or the stream fails, returning the bytes
/// accepted by the stream. A failed flush returns 0, since buffered bytes
/// may never have reached the peer.
pub(crate) async fn write_counted<S>(stream: &mut S, buf: &[u8]) -> usize
where
    S: AsyncWrite + Unpin,
{
    let mut sent = 0;
    while sent < buf.len() {
        match stream.write(&buf[sent..]).await {
            Ok(0) => break,
            Ok(n) => sent += n,
            Err(e) => {
                debug!("Write failed after {} bytes: {}", sent, e);
                break;
            }
        }
    }
    if sent == buf.len() {
        if let Err(e) = stream.flush().await {
            debug!("Flush failed after {} bytes: {}", sent, e);
            return 0;
        }
    }
    sent
}

/// Reads until `buf` is full or the stream ends. A return value short of
/// `buf.len()` means end of stream.
pub(crate) async fn read_full<S>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
