//! Directory walking implementation using walkdir.

use super::filter::{FileClass, MediaFilter};
use super::{LooseFile, MediaFile, MediaScanner, ScanResult};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent, ScanProgress};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Collect non-media files as well
    pub include_other: bool,
    /// Trees that are never returned (the destination root of a previous run)
    pub exclude: Vec<PathBuf>,
}

impl ScanConfig {
    /// Add a tree to exclude from the walk
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: MediaFilter,
    excluded: Vec<PathBuf>,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let filter = MediaFilter::new().with_hidden(config.include_hidden);
        let excluded = config.exclude.iter().map(|p| canonical_or_self(p)).collect();

        Self {
            config,
            filter,
            excluded,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|ex| path.starts_with(ex))
    }

    /// Scan a single root, appending to `result`
    fn scan_directory(
        &self,
        root: &Path,
        result: &mut ScanResult,
        events: &EventSender,
    ) -> Result<(), ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        // Walk the canonical root so the destination prefix check is exact
        let root = canonical_or_self(root);
        info!("Scanning: {}", root.display());
        result.roots.push(root.clone());

        let mut directories_scanned = 0usize;
        let mut walker = WalkDir::new(&root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let walker = walker.into_iter().filter_entry(|entry| {
            if self.is_excluded(entry.path()) {
                debug!("Skipping destination tree {}", entry.path().display());
                return false;
            }
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .map(|name| self.filter.should_descend(name))
                .unwrap_or(true)
        });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let error = if e.io_error().map(|io| io.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path: path.clone() }
                    } else {
                        ScanError::ReadDirectory {
                            path: path.clone(),
                            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                        }
                    };
                    warn!("{}", error);
                    events.send(Event::Scan(ScanEvent::Error {
                        path,
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                    continue;
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                directories_scanned += 1;
                events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                    directories_scanned,
                    files_found: result.media.len(),
                    current_path: path.to_path_buf(),
                })));
                continue;
            }

            let class = match self.filter.classify(path) {
                Some(FileClass::Other) if !self.config.include_other => continue,
                Some(class) => class,
                None => continue,
            };

            let metadata = match fs::metadata(path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    let error = ScanError::ReadDirectory {
                        path: path.to_path_buf(),
                        source: e,
                    };
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.to_path_buf(),
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                    continue;
                }
            };

            match class {
                FileClass::Media(kind) => result.media.push(MediaFile {
                    path: path.to_path_buf(),
                    size: metadata.len(),
                    modified: metadata
                        .modified()
                        .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                    kind,
                }),
                FileClass::Sidecar => result.sidecars.push(LooseFile {
                    path: path.to_path_buf(),
                    root: root.clone(),
                    size: metadata.len(),
                }),
                FileClass::Other => result.other.push(LooseFile {
                    path: path.to_path_buf(),
                    root: root.clone(),
                    size: metadata.len(),
                }),
            }
        }

        Ok(())
    }
}

impl MediaScanner for WalkDirScanner {
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError> {
        self.scan_with_events(paths, &crate::events::null_sender())
    }

    fn scan_with_events(
        &self,
        paths: &[PathBuf],
        events: &EventSender,
    ) -> Result<ScanResult, ScanError> {
        events.send(Event::Scan(ScanEvent::Started {
            paths: paths.to_vec(),
        }));

        let mut result = ScanResult::default();

        for path in paths {
            if let Err(e) = self.scan_directory(path, &mut result, events) {
                warn!("{}", e);
                events.send(Event::Scan(ScanEvent::Error {
                    path: path.clone(),
                    message: e.to_string(),
                }));
                result.errors.push(e);
            }
        }

        if !paths.is_empty() && result.roots.is_empty() {
            return Err(ScanError::NoSources);
        }

        // Deterministic scan order, whatever the directory iteration order was
        result.media.sort_by(|a, b| a.path.cmp(&b.path));
        result.media.dedup_by(|a, b| a.path == b.path);
        result.sidecars.sort_by(|a, b| a.path.cmp(&b.path));
        result.other.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            "Found {} media files, {} sidecars, {} other files",
            result.media.len(),
            result.sidecars.len(),
            result.other.len()
        );
        events.send(Event::Scan(ScanEvent::Completed {
            media_files: result.media.len(),
            other_files: result.other.len(),
        }));

        Ok(result)
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
