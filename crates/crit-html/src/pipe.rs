//! Async adapter over `smol::io`

use std::io;

use smol::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{CriticalStyleStream, StreamStats, StyleSource};

/// Drive `stream` from `reader` into `writer` until end of input.
///
/// A chunk is read only after the previous output was fully written, so a
/// slow writer stalls reading. A read error still closes an open region
/// (best effort) before it is returned, so markup written after the pipe is
/// not swallowed as CSS. Dropping the future cancels the transfer and
/// releases everything the stream held.
pub async fn pipe<R, W, S>(
    mut reader: R,
    mut writer: W,
    mut stream: CriticalStyleStream<S>,
) -> io::Result<StreamStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: StyleSource,
{
    let mut chunk = vec![0u8; stream.config().read_buffer.max(1)];
    let mut out = Vec::with_capacity(chunk.len());

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("Read failed mid-stream: {}", e);
                out.clear();
                let stats = stream.finish(&mut out);
                if writer.write_all(&out).await.is_ok() {
                    let _ = writer.flush().await;
                }
                tracing::debug!("Flushed {} regions before read error", stats.regions);
                return Err(e);
            }
        };

        out.clear();
        stream.push(&chunk[..read], &mut out);
        if !out.is_empty() {
            writer.write_all(&out).await?;
        }
    }

    out.clear();
    let stats = stream.finish(&mut out);
    writer.write_all(&out).await?;
    writer.flush().await?;

    tracing::debug!(
        "Stream piped: {} bytes in, {} bytes out, {} regions",
        stats.bytes_in,
        stats.bytes_out,
        stats.regions
    );
    Ok(stats)
}
