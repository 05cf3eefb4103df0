//! Queued fragment writer.
//!
//! A writer streams into `fragment_<s>_<e>.part` and renames to the final
//! name only after its appender task has consumed the close sentinel and the
//! byte count matches the fragment length. Chunks flow through a bounded
//! channel to a single appender, so `push` never blocks on the disk beyond
//! channel backpressure and write order follows push order.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::fragment::FragmentRange;
use crate::error::{Error, Result};

/// Queue depth before `push` applies backpressure to the producer.
const QUEUE_DEPTH: usize = 32;

pub struct FragmentWriter {
    target: FragmentRange,
    part_path: PathBuf,
    final_path: PathBuf,
    tx: mpsc::Sender<Bytes>,
    appender: JoinHandle<std::io::Result<u64>>,
}

impl FragmentWriter {
    /// Start the appender task over an already-created sink file. Callers go
    /// through `CacheStore::writer`, which performs the pre-check and creates
    /// the sink under the fingerprint lock.
    pub(crate) fn spawn(
        target: FragmentRange,
        part_path: PathBuf,
        final_path: PathBuf,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Bytes>(QUEUE_DEPTH);
        let sink = part_path.clone();
        let appender = tokio::spawn(async move {
            let mut file = OpenOptions::new().append(true).open(&sink).await?;
            let mut written: u64 = 0;
            while let Some(chunk) = rx.recv().await {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(written)
        });
        Self {
            target,
            part_path,
            final_path,
            tx,
            appender,
        }
    }

    #[must_use]
    pub fn target(&self) -> FragmentRange {
        self.target
    }

    /// Queue a chunk for appending. A dead appender (disk error) makes this a
    /// no-op; the failure surfaces at `close`.
    pub async fn push(&self, chunk: Bytes) {
        if self.tx.send(chunk).await.is_err() {
            tracing::debug!(path = %self.part_path.display(), "appender gone, dropping chunk");
        }
    }

    /// Drain the queue, finalize the sink and publish the fragment. Fails
    /// when the appender hit an I/O error or the byte count does not match
    /// the fragment length; the sink is unlinked in both cases.
    pub async fn close(self) -> Result<()> {
        let Self {
            target,
            part_path,
            final_path,
            tx,
            appender,
        } = self;
        drop(tx);

        let written = match appender.await {
            Ok(Ok(written)) => written,
            Ok(Err(e)) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(Error::CacheIo(format!(
                    "appender failed for {}: {e}",
                    part_path.display()
                )));
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(Error::CacheIo(format!("appender panicked: {e}")));
            }
        };

        if written != target.byte_len() {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(Error::CacheIo(format!(
                "fragment {} closed with {written} of {} bytes",
                final_path.display(),
                target.byte_len()
            )));
        }

        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|e| Error::CacheIo(format!("publishing {}: {e}", final_path.display())))?;
        tracing::debug!(path = %final_path.display(), "fragment written");
        Ok(())
    }

    /// Stop writing and unlink the sink.
    pub async fn abort(self) {
        let Self {
            part_path,
            tx,
            appender,
            ..
        } = self;
        drop(tx);
        let _ = appender.await;
        let _ = tokio::fs::remove_file(&part_path).await;
        tracing::debug!(path = %part_path.display(), "fragment write aborted");
    }
}
