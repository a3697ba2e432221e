//! File filtering logic for the scanner.

use super::{MediaKind, SIDECAR_EXTENSION, SKIP_DIRS};
use std::collections::HashSet;
use std::path::Path;

/// What the scanner should do with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Media(MediaKind),
    Sidecar,
    Other,
}

/// Decides which files and directories the walk keeps
pub struct MediaFilter {
    /// Directory names that are pruned
    skip_dirs: HashSet<String>,
    /// Whether to include hidden files and directories
    include_hidden: bool,
}

impl MediaFilter {
    /// Create a filter with the default junk-directory list
    pub fn new() -> Self {
        Self {
            skip_dirs: SKIP_DIRS.iter().map(|d| d.to_string()).collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files and directories (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Prune additional directory names
    pub fn with_skip_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_dirs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether a directory with this name should be descended into
    pub fn should_descend(&self, name: &str) -> bool {
        if self.skip_dirs.contains(name) {
            return false;
        }
        self.include_hidden || !name.starts_with('.')
    }

    /// Classify a file, or `None` if it should be ignored entirely
    pub fn classify(&self, path: &Path) -> Option<FileClass> {
        let name = path.file_name().and_then(|n| n.to_str())?;
        if !self.include_hidden && name.starts_with('.') {
            return None;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext.eq_ignore_ascii_case(SIDECAR_EXTENSION) {
            return Some(FileClass::Sidecar);
        }

        Some(match MediaKind::from_extension(ext) {
            Some(kind) => FileClass::Media(kind),
            None => FileClass::Other,
        })
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new()
    }
}
