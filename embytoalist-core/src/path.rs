//! Mount-path to link-path translation.

/// Translates mount-local file paths into link-server paths and decides
/// which paths bypass the shim entirely. Pure string work, no I/O.
#[derive(Debug, Clone, Default)]
pub struct PathMapper {
    prefix_remove: String,
    prefix_add: String,
    ignore_prefixes: Vec<String>,
}

impl PathMapper {
    #[must_use]
    pub fn new(
        prefix_remove: impl Into<String>,
        prefix_add: impl Into<String>,
        ignore_prefixes: Vec<String>,
    ) -> Self {
        Self {
            prefix_remove: trim_trailing_slash(prefix_remove.into()),
            prefix_add: trim_trailing_slash(prefix_add.into()),
            ignore_prefixes,
        }
    }

    /// Translate a mount path into the link server's path space: strip the
    /// configured prefix when present, then prepend the configured prefix.
    #[must_use]
    pub fn map(&self, local_path: &str) -> String {
        let stripped = if !self.prefix_remove.is_empty() {
            local_path.strip_prefix(&self.prefix_remove).unwrap_or(local_path)
        } else {
            local_path
        };

        if self.prefix_add.is_empty() {
            stripped.to_string()
        } else {
            format!("{}{}", self.prefix_add, stripped)
        }
    }

    /// True when the path should never be redirected through the link server.
    #[must_use]
    pub fn bypass(&self, local_path: &str) -> bool {
        self.ignore_prefixes
            .iter()
            .any(|prefix| local_path.starts_with(prefix.as_str()))
    }
}

fn trim_trailing_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_strips_and_prepends() {
        let mapper = PathMapper::new("/mnt/media", "/onedrive", Vec::new());
        assert_eq!(mapper.map("/mnt/media/Movies/a.mkv"), "/onedrive/Movies/a.mkv");
    }

    #[test]
    fn test_map_trailing_slashes_normalized() {
        let mapper = PathMapper::new("/mnt/media/", "/onedrive/", Vec::new());
        assert_eq!(mapper.map("/mnt/media/Movies/a.mkv"), "/onedrive/Movies/a.mkv");
    }

    #[test]
    fn test_map_prefix_absent_leaves_path() {
        let mapper = PathMapper::new("/mnt/other", "", Vec::new());
        assert_eq!(mapper.map("/mnt/media/Movies/a.mkv"), "/mnt/media/Movies/a.mkv");
    }

    #[test]
    fn test_map_empty_config_is_identity() {
        let mapper = PathMapper::default();
        assert_eq!(mapper.map("/mnt/media/a.mkv"), "/mnt/media/a.mkv");
    }

    #[test]
    fn test_bypass_matches_prefixes() {
        let mapper = PathMapper::new("", "", vec!["/mnt/local/".to_string()]);
        assert!(mapper.bypass("/mnt/local/a.mkv"));
        assert!(!mapper.bypass("/mnt/media/a.mkv"));
    }

    #[test]
    fn test_bypass_without_config() {
        let mapper = PathMapper::default();
        assert!(!mapper.bypass("/mnt/local/a.mkv"));
    }
}
