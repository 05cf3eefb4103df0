//! Fragment naming, shape validity and request classification.

use crate::models::{CacheRangeStatus, FileDescriptor, RangeRequest, TAIL_WINDOW};

/// On-disk fragment file name prefix: `fragment_<start>_<end>`.
pub const FRAGMENT_PREFIX: &str = "fragment_";

/// Suffix of fragments still being written; renamed away on a clean close.
pub const PART_SUFFIX: &str = ".part";

/// An inclusive byte range stored as one fragment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentRange {
    pub start: u64,
    pub end: u64,
}

impl FragmentRange {
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        self.end - self.start + 1
    }

    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset <= self.end
    }

    #[must_use]
    pub fn contains_range(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}{}_{}", FRAGMENT_PREFIX, self.start, self.end)
    }

    #[must_use]
    pub fn part_file_name(&self) -> String {
        format!("{}{}", self.file_name(), PART_SUFFIX)
    }

    /// Parse a directory entry name. Returns the range and whether the entry
    /// is an in-progress `.part` sink.
    #[must_use]
    pub fn parse(name: &str) -> Option<(Self, bool)> {
        let (body, part) = match name.strip_suffix(PART_SUFFIX) {
            Some(body) => (body, true),
            None => (name, false),
        };
        let spec = body.strip_prefix(FRAGMENT_PREFIX)?;
        let (start, end) = spec.split_once('_')?;
        let start: u64 = start.parse().ok()?;
        let end: u64 = end.parse().ok()?;
        if end < start {
            return None;
        }
        Some((Self { start, end }, part))
    }

    /// The shape rule: a fragment is valid iff it is the head window
    /// `(0, head_window - 1)` or a tail `(start, size - 1)`, within bounds.
    /// Head windows larger than the file clip to `(0, size - 1)` and pass as
    /// tails.
    #[must_use]
    pub fn is_valid_shape(&self, desc: &FileDescriptor) -> bool {
        if desc.size == 0 || self.end >= desc.size {
            return false;
        }
        if self.end == desc.size - 1 {
            return true;
        }
        self.start == 0 && self.end + 1 == desc.head_window()
    }
}

/// The head fragment of a file, clipped to EOF.
#[must_use]
pub fn head_fragment(desc: &FileDescriptor) -> FragmentRange {
    FragmentRange {
        start: 0,
        end: desc.head_window().min(desc.size) - 1,
    }
}

/// A tail fragment beginning at `start`.
#[must_use]
pub fn tail_fragment(desc: &FileDescriptor, start: u64) -> FragmentRange {
    FragmentRange {
        start,
        end: desc.size - 1,
    }
}

/// What the dispatcher decided about a range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: CacheRangeStatus,
    /// The fragment this request reads from or populates; `None` when the
    /// cache is not involved.
    pub target: Option<FragmentRange>,
}

/// Classify a range request against the file's cache windows. Pure function
/// of `start`, `end`, `size` and the head window; callers must have rejected
/// `start >= size` already.
#[must_use]
pub fn classify(desc: &FileDescriptor, range: &RangeRequest) -> Classification {
    debug_assert!(range.start < desc.size);

    let head = head_fragment(desc);
    if range.start <= head.end {
        let status = if range.effective_end(desc.size) <= head.end {
            CacheRangeStatus::FullyCachedHead
        } else {
            CacheRangeStatus::PartiallyCachedHead
        };
        return Classification {
            status,
            target: Some(head),
        };
    }

    if desc.size - range.start < TAIL_WINDOW {
        return Classification {
            status: CacheRangeStatus::FullyCachedTail,
            target: Some(tail_fragment(desc, range.start)),
        };
    }

    Classification {
        status: CacheRangeStatus::NotCached,
        target: None,
    }
}
