//! On-disk range cache.
//!
//! Layout under a configured root:
//!
//! ```text
//! <root>/.version
//! <root>/<hh>/<digest>/fragment_<start>_<end>
//! ```
//!
//! `<digest>` is the MD5 of `"{name}:{size}:{container}"`; `<hh>` its first
//! two hex characters. Fragments hold the head window or a tail of the file
//! (the shape rule in [`fragment`]); anything else found on disk is stale and
//! removed on discovery.

pub mod fragment;
mod locks;
mod reader;
mod writer;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::FileDescriptor;

pub use fragment::{classify, head_fragment, tail_fragment, Classification, FragmentRange};
pub use reader::ByteStream;
pub use writer::FragmentWriter;

use locks::LockTable;

/// Store layout version; a mismatch on disk requires an operator wipe.
pub const STORE_VERSION: &str = "1";

const VERSION_FILE: &str = ".version";

/// A `.part` sink whose mtime is older than this belongs to a dead writer.
const STALE_PART_AGE: Duration = Duration::from_secs(60);

struct DirEntryInfo {
    range: FragmentRange,
    part: bool,
    path: PathBuf,
}

#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    locks: LockTable,
}

impl CacheStore {
    /// Open (or initialize) the store under `root`. A version mismatch is a
    /// fatal error: the operator must wipe the directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let version_path = root.join(VERSION_FILE);
        match tokio::fs::read_to_string(&version_path).await {
            Ok(found) if found.trim() == STORE_VERSION => {}
            Ok(found) => {
                return Err(Error::CacheIo(format!(
                    "cache store at {} has version {} (expected {}); wipe the directory",
                    root.display(),
                    found.trim(),
                    STORE_VERSION
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut entries = tokio::fs::read_dir(&root).await?;
                if entries.next_entry().await?.is_some() {
                    return Err(Error::CacheIo(format!(
                        "cache store at {} has content but no version tag; wipe the directory",
                        root.display()
                    )));
                }
                tokio::fs::write(&version_path, STORE_VERSION).await?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(root = %root.display(), "cache store ready");
        Ok(Self {
            root,
            locks: LockTable::default(),
        })
    }

    /// Shard directory and digest for a file. Keyed on name, size and
    /// container: a rename or re-encode lands in a fresh directory.
    fn fingerprint(desc: &FileDescriptor) -> (String, String) {
        let key = format!("{}:{}:{}", desc.name, desc.size, desc.container);
        let digest = format!("{:x}", md5::compute(key.as_bytes()));
        (digest[..2].to_string(), digest)
    }

    fn fragment_dir(&self, desc: &FileDescriptor) -> PathBuf {
        let (shard, digest) = Self::fingerprint(desc);
        self.root.join(shard).join(digest)
    }

    /// List the directory, removing whatever fails validation on the way:
    /// misshapen or short completed fragments and `.part` sinks of dead
    /// writers.
    async fn scan(&self, dir: &Path, desc: &FileDescriptor) -> Vec<DirEntryInfo> {
        let mut entries = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(_) => return entries,
        };

        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((range, part)) = FragmentRange::parse(name) else { continue };
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };

            if part {
                let stale = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.elapsed().ok())
                    .is_some_and(|age| age > STALE_PART_AGE);
                if stale {
                    tracing::warn!(path = %path.display(), "removing abandoned cache sink");
                    let _ = tokio::fs::remove_file(&path).await;
                    continue;
                }
            } else if !range.is_valid_shape(desc) || metadata.len() != range.byte_len() {
                tracing::warn!(path = %path.display(), "removing stale cache fragment");
                let _ = tokio::fs::remove_file(&path).await;
                continue;
            }

            entries.push(DirEntryInfo { range, part, path });
        }
        entries
    }

    /// Is some valid fragment covering `start` present?
    pub async fn present(&self, desc: &FileDescriptor, start: u64) -> bool {
        let dir = self.fragment_dir(desc);
        self.scan(&dir, desc)
            .await
            .iter()
            .any(|e| !e.part && e.range.contains(start))
    }

    /// Stream cached bytes beginning at file offset `start`, at most `limit`
    /// bytes. `None` when no valid fragment covers `start`.
    pub async fn read(
        &self,
        desc: &FileDescriptor,
        start: u64,
        limit: Option<u64>,
    ) -> Option<ByteStream> {
        let dir = self.fragment_dir(desc);
        let entry = self
            .scan(&dir, desc)
            .await
            .into_iter()
            .find(|e| !e.part && e.range.contains(start))?;
        tracing::debug!(path = %entry.path.display(), start, "reading cache fragment");
        Some(reader::read_range(entry.path, start - entry.range.start, limit))
    }

    /// Allocate the exclusive writer for `target`. `Ok(None)` means another
    /// fragment or writer already covers it: an equal-or-superset fragment
    /// exists, or a live sink is present in the directory. Strict-subset
    /// fragments are unlinked before the sink is created. Pre-check and sink
    /// creation happen under the fingerprint lock.
    pub async fn writer(
        &self,
        desc: &FileDescriptor,
        target: FragmentRange,
    ) -> Result<Option<FragmentWriter>> {
        let dir = self.fragment_dir(desc);
        tokio::fs::create_dir_all(&dir).await?;

        let (shard, digest) = Self::fingerprint(desc);
        let lock = self.locks.lock_for(&format!("{shard}/{digest}"));
        let _guard = lock.lock().await;

        let entries = self.scan(&dir, desc).await;
        for entry in &entries {
            if entry.part {
                tracing::debug!(path = %entry.path.display(), "writer already active, aborting");
                return Ok(None);
            }
            if entry.range.contains_range(&target) {
                tracing::debug!(path = %entry.path.display(), "range already cached, aborting");
                return Ok(None);
            }
        }
        for entry in &entries {
            if target.contains_range(&entry.range) {
                tracing::debug!(path = %entry.path.display(), "superseded by new fragment, unlinking");
                let _ = tokio::fs::remove_file(&entry.path).await;
            }
        }

        let part_path = dir.join(target.part_file_name());
        let final_path = dir.join(target.file_name());
        tokio::fs::File::create(&part_path).await?;
        Ok(Some(FragmentWriter::spawn(target, part_path, final_path)))
    }
}
