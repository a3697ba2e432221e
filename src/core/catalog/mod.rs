//! # Catalog Module
//!
//! One [`CatalogEntry`] per scanned media file: its content hash plus the
//! resolved metadata. Entries are built once after hashing and extraction and
//! never modified afterwards; pairing and grouping refer to them by path.

use crate::core::hasher::ContentHash;
use crate::core::metadata::{MediaMetadata, TagMap};
use crate::core::scanner::{MediaFile, MediaKind, SIDECAR_EXTENSION};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default score contribution per rating star
pub const DEFAULT_RATING_WEIGHT: f64 = 5_000_000.0;
/// Score contribution per pixel
pub const PIXEL_WEIGHT: f64 = 5.0;
/// Score contribution per keyword
pub const KEYWORD_WEIGHT: f64 = 100_000.0;
/// Multiplier applied to RAW files
pub const RAW_MULTIPLIER: f64 = 3.0;

/// Weights used when scoring duplicate candidates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub rating: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING_WEIGHT,
        }
    }
}

/// Everything known about one media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub content_hash: ContentHash,
    pub size: u64,
    /// Embedded capture time, or the file's local mtime
    pub captured_at: NaiveDateTime,
    /// Whether `captured_at` came from embedded metadata
    pub dated_from_metadata: bool,
    pub camera_make: String,
    pub camera_model: String,
    pub keywords: BTreeSet<String>,
    pub rating: u8,
    pub width: u32,
    pub height: u32,
    pub kind: MediaKind,
    /// Attached `.xmp` sidecar
    pub sidecar: Option<PathBuf>,
    /// Lowercase extension with leading dot
    pub corrected_extension: String,
}

impl CatalogEntry {
    /// Build an entry from a scanned file, its hash and whatever tags were read
    pub fn build(file: &MediaFile, content_hash: ContentHash, tags: Option<&TagMap>) -> Self {
        let metadata = tags.map(MediaMetadata::from_tags).unwrap_or_default();
        let sidecar = find_sidecar(&file.path);
        Self::from_parts(file, content_hash, metadata, sidecar)
    }

    /// Build an entry from already-resolved parts
    pub fn from_parts(
        file: &MediaFile,
        content_hash: ContentHash,
        metadata: MediaMetadata,
        sidecar: Option<PathBuf>,
    ) -> Self {
        let corrected_extension = metadata
            .detected_extension()
            .map(str::to_string)
            .unwrap_or_else(|| lowercase_extension(&file.path));

        let (captured_at, dated_from_metadata) = match metadata.captured_at {
            Some(date) => (date, true),
            None => (local_naive(file.modified), false),
        };

        Self {
            path: file.path.clone(),
            content_hash,
            size: file.size,
            captured_at,
            dated_from_metadata,
            camera_make: metadata.camera_make,
            camera_model: metadata.camera_model,
            keywords: metadata.keywords,
            rating: metadata.rating,
            width: metadata.width,
            height: metadata.height,
            kind: file.kind,
            sidecar,
            corrected_extension,
        }
    }

    /// Preference score among byte-identical copies; higher wins
    pub fn score(&self, weights: &ScoreWeights) -> f64 {
        let pixels = self.width as f64 * self.height as f64;
        let score = self.size as f64
            + pixels * PIXEL_WEIGHT
            + self.rating as f64 * weights.rating
            + self.keywords.len() as f64 * KEYWORD_WEIGHT;

        if self.kind.is_raw() {
            score * RAW_MULTIPLIER
        } else {
            score
        }
    }

    pub fn is_raw(&self) -> bool {
        self.kind.is_raw()
    }

    pub fn is_video(&self) -> bool {
        self.kind.is_video()
    }

    /// File name without its last extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Original extension, lowercased, with dot (empty if none)
    pub fn original_extension(&self) -> String {
        lowercase_extension(&self.path)
    }
}

/// A hashed non-media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonMediaEntry {
    pub path: PathBuf,
    /// Source root it was found under
    pub root: PathBuf,
    pub size: u64,
    pub content_hash: ContentHash,
}

/// Lowercase extension of a path with its dot, or empty
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Find the sidecar for a media file: `name.xmp` first, then `name.ext.xmp`
pub fn find_sidecar(path: &Path) -> Option<PathBuf> {
    let upper = SIDECAR_EXTENSION.to_uppercase();
    let mut candidates = vec![
        path.with_extension(SIDECAR_EXTENSION),
        path.with_extension(&upper),
    ];

    if let Some(name) = path.file_name() {
        let name = name.to_string_lossy();
        candidates.push(path.with_file_name(format!("{}.{}", name, SIDECAR_EXTENSION)));
        candidates.push(path.with_file_name(format!("{}.{}", name, upper)));
    }

    candidates.into_iter().find(|c| c != path && c.is_file())
}

fn local_naive(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::TagValue;
    use std::fs;
    use tempfile::TempDir;

    fn media(path: &str, size: u64, kind: MediaKind) -> MediaFile {
        MediaFile {
            path: PathBuf::from(path),
            size,
            modified: SystemTime::UNIX_EPOCH,
            kind,
        }
    }

    fn metadata(width: u32, height: u32, rating: u8) -> MediaMetadata {
        MediaMetadata {
            width,
            height,
            rating,
            ..Default::default()
        }
    }

    #[test]
    fn raw_with_rating_beats_plain_jpeg() {
        let hash = ContentHash::from("ab");
        let raw = CatalogEntry::from_parts(
            &media("/p/IMG_1.dng", 25_000_000, MediaKind::Raw),
            hash.clone(),
            metadata(2000, 3000, 5),
            None,
        );
        let jpg = CatalogEntry::from_parts(
            &media("/p/IMG_1.jpg", 5_000_000, MediaKind::Photo),
            hash,
            metadata(2000, 3000, 0),
            None,
        );

        let weights = ScoreWeights::default();
        assert!(raw.score(&weights) > jpg.score(&weights));
    }

    #[test]
    fn score_components_add_up() {
        let mut meta = metadata(10, 10, 1);
        meta.keywords.insert("a".into());
        let entry = CatalogEntry::from_parts(
            &media("/p/a.jpg", 1000, MediaKind::Photo),
            ContentHash::from("ab"),
            meta,
            None,
        );

        let weights = ScoreWeights { rating: 10.0 };
        assert_eq!(entry.score(&weights), 1000.0 + 500.0 + 10.0 + 100_000.0);
    }

    #[test]
    fn detected_type_corrects_extension() {
        let mut tags = TagMap::new();
        tags.insert("File:FileType", TagValue::Text("HEIC".into()));
        let entry = CatalogEntry::build(
            &media("/nonexistent/IMG_0001.JPG", 10, MediaKind::Photo),
            ContentHash::from("ab"),
            Some(&tags),
        );

        assert_eq!(entry.corrected_extension, ".heic");
        assert_eq!(entry.original_extension(), ".jpg");
    }

    #[test]
    fn unknown_type_keeps_lowercased_extension() {
        let entry = CatalogEntry::build(
            &media("/nonexistent/clip.MOV", 10, MediaKind::Video),
            ContentHash::from("ab"),
            None,
        );
        assert_eq!(entry.corrected_extension, ".mov");
    }

    #[test]
    fn missing_date_falls_back_to_mtime() {
        let file = media("/nonexistent/a.jpg", 10, MediaKind::Photo);
        let entry = CatalogEntry::build(&file, ContentHash::from("ab"), None);

        assert!(!entry.dated_from_metadata);
        assert_eq!(entry.captured_at, local_naive(SystemTime::UNIX_EPOCH));
    }

    #[test]
    fn embedded_date_wins_over_mtime() {
        let mut tags = TagMap::new();
        tags.insert(
            "EXIF:DateTimeOriginal",
            TagValue::Text("2024:05:01 08:30:00".into()),
        );
        let entry = CatalogEntry::build(
            &media("/nonexistent/a.jpg", 10, MediaKind::Photo),
            ContentHash::from("ab"),
            Some(&tags),
        );

        assert!(entry.dated_from_metadata);
        assert_eq!(entry.captured_at.to_string(), "2024-05-01 08:30:00");
    }

    #[test]
    fn sidecar_prefers_stem_form() {
        let dir = TempDir::new().unwrap();
        let photo = dir.path().join("IMG_1.dng");
        fs::write(&photo, b"raw").unwrap();
        fs::write(dir.path().join("IMG_1.dng.xmp"), b"<x/>").unwrap();
        assert_eq!(find_sidecar(&photo), Some(dir.path().join("IMG_1.dng.xmp")));

        fs::write(dir.path().join("IMG_1.xmp"), b"<x/>").unwrap();
        assert_eq!(find_sidecar(&photo), Some(dir.path().join("IMG_1.xmp")));
    }

    #[test]
    fn no_sidecar_when_absent() {
        let dir = TempDir::new().unwrap();
        let photo = dir.path().join("IMG_2.jpg");
        fs::write(&photo, b"jpg").unwrap();
        assert_eq!(find_sidecar(&photo), None);
    }
}
