//! # Scanner Module
//!
//! Discovers media files, sidecars, and (optionally) everything else under
//! one or more source roots.
//!
//! ## Supported Formats
//! - Photos: JPEG, PNG, TIFF, HEIC/HEIF, WebP, AVIF, JPEG XL
//! - RAW: DNG, CR2, CR3, NEF, ARW, ORF, RW2, RAF, SRW, RAW
//! - Video: MP4, MOV, AVI, MKV, M4V, MPEG, WMV, FLV, WebM, 3GP, MTS, M2TS, HEVC, TS
//!
//! Known junk directories (version control, dependency caches, OS caches)
//! are pruned during the walk, and nothing under the destination root is
//! ever returned.
//!
//! ## Example
//! ```rust,ignore
//! use media_dedup::core::scanner::{MediaScanner, ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default().exclude(dest));
//! let result = scanner.scan(&["/Volumes/Photos".into()])?;
//! ```

mod filter;
mod walker;

pub use filter::{FileClass, MediaFilter};
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Non-RAW photo extensions
pub const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "tif", "tiff", "heic", "heif", "webp", "avif", "jxl",
];

/// Camera RAW extensions
pub const RAW_EXTENSIONS: &[&str] = &[
    "arw", "cr2", "cr3", "nef", "orf", "dng", "rw2", "raf", "srw", "raw",
];

/// Video extensions
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "m4v", "mpg", "mpeg", "wmv", "flv", "webm", "3gp", "mts",
    "m2ts", "hevc", "ts",
];

/// Sidecar extension
pub const SIDECAR_EXTENSION: &str = "xmp";

/// Directory names never descended into
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    ".idea",
    ".vscode",
    "AppData",
    "Library",
    ".npm",
    ".cache",
    "Cache",
    "Caches",
    ".gradle",
    "target",
    "build",
    "dist",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "System Volume Information",
    "$RECYCLE.BIN",
];

/// Broad media classification, derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Raw,
    Video,
}

impl MediaKind {
    /// Classify a bare extension (no dot, any case)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        let ext = ext.as_str();
        if RAW_EXTENSIONS.contains(&ext) {
            Some(MediaKind::Raw)
        } else if PHOTO_EXTENSIONS.contains(&ext) {
            Some(MediaKind::Photo)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_raw(self) -> bool {
        self == MediaKind::Raw
    }

    pub fn is_video(self) -> bool {
        self == MediaKind::Video
    }
}

/// Every extension the scanner treats as media
pub fn all_media_extensions() -> impl Iterator<Item = &'static str> {
    PHOTO_EXTENSIONS
        .iter()
        .chain(RAW_EXTENSIONS)
        .chain(VIDEO_EXTENSIONS)
        .copied()
}

/// A discovered media file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Classification from the extension
    pub kind: MediaKind,
}

/// A discovered non-media file (or sidecar), remembered with the source root
/// it was found under so relative layouts can be preserved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LooseFile {
    pub path: PathBuf,
    pub root: PathBuf,
    pub size: u64,
}

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Media files, sorted by path
    pub media: Vec<MediaFile>,
    /// XMP sidecars, sorted by path
    pub sidecars: Vec<LooseFile>,
    /// Everything else (only collected when `include_other` is set)
    pub other: Vec<LooseFile>,
    /// Roots that existed and were walked
    pub roots: Vec<PathBuf>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for media scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait MediaScanner: Send + Sync {
    /// Scan directories and return discovered files
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError>;

    /// Scan with progress reporting via events
    fn scan_with_events(
        &self,
        paths: &[PathBuf],
        events: &EventSender,
    ) -> Result<ScanResult, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_from_extension_any_case() {
        assert_eq!(MediaKind::from_extension("jpg"), Some(MediaKind::Photo));
        assert_eq!(MediaKind::from_extension("HEIC"), Some(MediaKind::Photo));
        assert_eq!(MediaKind::from_extension("DNG"), Some(MediaKind::Raw));
        assert_eq!(MediaKind::from_extension("mov"), Some(MediaKind::Video));
    }

    #[test]
    fn unknown_extension_is_not_media() {
        assert_eq!(MediaKind::from_extension("txt"), None);
        assert_eq!(MediaKind::from_extension("xmp"), None);
        assert_eq!(MediaKind::from_path(Path::new("/photos/no_extension")), None);
    }

    #[test]
    fn raw_and_video_flags() {
        assert!(MediaKind::Raw.is_raw());
        assert!(!MediaKind::Raw.is_video());
        assert!(MediaKind::Video.is_video());
        assert!(!MediaKind::Photo.is_raw());
    }

    #[test]
    fn extension_tables_do_not_overlap() {
        for ext in RAW_EXTENSIONS {
            assert!(!PHOTO_EXTENSIONS.contains(ext));
            assert!(!VIDEO_EXTENSIONS.contains(ext));
        }
        assert_eq!(
            all_media_extensions().count(),
            PHOTO_EXTENSIONS.len() + RAW_EXTENSIONS.len() + VIDEO_EXTENSIONS.len()
        );
    }
}
