//! Streaming fragment reader.

use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Lazy chunk stream over cached bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Bytes> + Send + 'static>>;

/// Chunk size for cache reads.
const READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Stream a byte range of a fragment file: seek to `offset`, yield chunks
/// until `limit` bytes were produced (when given) or EOF. Open and read
/// errors are logged and end the stream cleanly.
pub(crate) fn read_range(path: PathBuf, offset: u64, limit: Option<u64>) -> ByteStream {
    Box::pin(async_stream::stream! {
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(path = %path.display(), "failed to open cache fragment: {e}");
                return;
            }
        };
        if let Err(e) = file.seek(SeekFrom::Start(offset)).await {
            tracing::error!(path = %path.display(), "failed to seek cache fragment: {e}");
            return;
        }

        let mut remaining = limit;
        loop {
            let want = match remaining {
                Some(0) => break,
                Some(n) => (n.min(READ_CHUNK_SIZE as u64)) as usize,
                None => READ_CHUNK_SIZE,
            };
            let mut buf = vec![0u8; want];
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    if let Some(left) = remaining.as_mut() {
                        *left -= n as u64;
                    }
                    yield Bytes::from(buf);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), "cache read failed: {e}");
                    break;
                }
            }
        }
    })
}
