//! # Metadata Module
//!
//! Reads embedded metadata through ExifTool and resolves it into the handful
//! of fields the organizer cares about.
//!
//! ## Resolved Fields
//! - Capture date (first parseable of several date tags)
//! - Keywords (XMP subject, IPTC and XMP keywords)
//! - Camera make and model, sanitized for filenames
//! - Star rating (0-5)
//! - Pixel dimensions
//! - Detected file type, mapped to a corrected extension
//!
//! Reading is behind [`MetadataReader`] so the pipeline can be driven by an
//! in-memory reader in tests.

pub mod exiftool;
pub mod tags;

pub use exiftool::ExifTool;
pub use tags::{TagMap, TagValue};

use crate::core::scanner::MediaKind;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Date tags in priority order
pub const DATE_TAGS: &[&str] = &[
    "EXIF:DateTimeOriginal",
    "XMP:DateTimeOriginal",
    "Composite:DateTimeOriginal",
    "QuickTime:CreationDate",
    "QuickTime:CreateDate",
    "EXIF:CreateDate",
    "QuickTime:ModifyDate",
    "EXIF:ModifyDate",
];

/// Keyword tags, unioned
pub const KEYWORD_TAGS: &[&str] = &["XMP:Subject", "IPTC:Keywords", "XMP:Keywords"];

/// Longest sanitized camera component
pub const CAMERA_MAX_LEN: usize = 30;

/// Detected file type to canonical extension
pub const FILETYPE_TO_EXT: &[(&str, &str)] = &[
    ("JPEG", ".jpg"),
    ("PNG", ".png"),
    ("HEIC", ".heic"),
    ("HEIF", ".heif"),
    ("TIFF", ".tiff"),
    ("WEBP", ".webp"),
    ("AVIF", ".avif"),
    ("JXL", ".jxl"),
    ("GIF", ".gif"),
    ("BMP", ".bmp"),
    ("CR2", ".cr2"),
    ("CR3", ".cr3"),
    ("NEF", ".nef"),
    ("ARW", ".arw"),
    ("ORF", ".orf"),
    ("DNG", ".dng"),
    ("RW2", ".rw2"),
    ("RAF", ".raf"),
    ("SRW", ".srw"),
    ("RAW", ".raw"),
    ("MOV", ".mov"),
    ("MP4", ".mp4"),
    ("AVI", ".avi"),
    ("MKV", ".mkv"),
    ("M4V", ".m4v"),
    ("WEBM", ".webm"),
    ("MTS", ".mts"),
    ("M2TS", ".m2ts"),
    ("3GP", ".3gp"),
    ("MPG", ".mpg"),
    ("MPEG", ".mpeg"),
    ("HEVC", ".hevc"),
    ("TS", ".ts"),
    ("WMV", ".wmv"),
    ("FLV", ".flv"),
];

/// Tags for every file in one batch.
///
/// Files ExifTool said nothing about are simply absent from `tags`.
#[derive(Debug, Default)]
pub struct BatchMetadata {
    pub tags: HashMap<PathBuf, TagMap>,
    pub warnings: Vec<String>,
}

/// Source of embedded metadata
pub trait MetadataReader: Send + Sync {
    /// Read tags for a batch of files. Never fails as a whole; problems are
    /// reported through `warnings` and missing entries.
    fn read_batch(&self, files: &[(PathBuf, MediaKind)]) -> BatchMetadata;
}

/// Metadata resolved from one file's tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Capture date from embedded tags
    pub captured_at: Option<NaiveDateTime>,
    /// Sanitized camera make, empty if unknown
    pub camera_make: String,
    /// Sanitized camera model, empty if unknown
    pub camera_model: String,
    pub keywords: BTreeSet<String>,
    /// Star rating, clamped to 0-5
    pub rating: u8,
    pub width: u32,
    pub height: u32,
    /// Detected file type (e.g., "JPEG", "HEIC")
    pub file_type: Option<String>,
}

impl MediaMetadata {
    pub fn from_tags(tags: &TagMap) -> Self {
        Self {
            captured_at: resolve_date(tags),
            camera_make: tags
                .text_of(&["EXIF:Make", "Make"])
                .map(|s| sanitize_camera_str(&s))
                .unwrap_or_default(),
            camera_model: tags
                .text_of(&["EXIF:Model", "Model"])
                .map(|s| sanitize_camera_str(&s))
                .unwrap_or_default(),
            keywords: resolve_keywords(tags),
            rating: resolve_rating(tags),
            width: tags
                .first_of(&["EXIF:ImageWidth", "File:ImageWidth", "ImageWidth"])
                .and_then(TagValue::as_u32)
                .unwrap_or(0),
            height: tags
                .first_of(&["EXIF:ImageHeight", "File:ImageHeight", "ImageHeight"])
                .and_then(TagValue::as_u32)
                .unwrap_or(0),
            file_type: tags.text_of(&["File:FileType", "FileType"]),
        }
    }

    /// Canonical extension for the detected file type, if known
    pub fn detected_extension(&self) -> Option<&'static str> {
        self.file_type.as_deref().and_then(extension_for_file_type)
    }
}

fn resolve_date(tags: &TagMap) -> Option<NaiveDateTime> {
    DATE_TAGS
        .iter()
        .filter_map(|key| tags.get(key))
        .filter_map(|value| value.as_text())
        .find_map(|text| parse_exif_datetime(&text))
}

fn resolve_keywords(tags: &TagMap) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();

    for value in KEYWORD_TAGS.iter().filter_map(|key| tags.get(key)) {
        match value {
            TagValue::List(items) => {
                keywords.extend(
                    items
                        .iter()
                        .filter_map(|item| item.as_text())
                        .map(|s| s.trim().to_string()),
                );
            }
            other => {
                if let Some(text) = other.as_text() {
                    keywords.extend(text.split([',', ';']).map(|s| s.trim().to_string()));
                }
            }
        }
    }

    keywords.retain(|k| !k.is_empty());
    keywords
}

fn resolve_rating(tags: &TagMap) -> u8 {
    tags.first_of(&["XMP:Rating", "Rating"])
        .and_then(TagValue::as_f64)
        .filter(|r| r.is_finite())
        .map(|r| r.clamp(0.0, 5.0) as u8)
        .unwrap_or(0)
}

/// Parse an EXIF/QuickTime style timestamp.
///
/// Accepts `YYYY:MM:DD HH:MM:SS` with an optional `Z`, `+HH:MM` or `-HH:MM`
/// suffix or fractional seconds, all of which are dropped.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.split('+').next().unwrap_or("").replace('Z', "");
    let value = value.trim();
    let value = value.get(..19).unwrap_or(value);
    NaiveDateTime::parse_from_str(value, "%Y:%m:%d %H:%M:%S").ok()
}

/// Lowercase a camera make/model and reduce it to `[a-z0-9_]`
pub fn sanitize_camera_str(raw: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    static ALPHA_DIGIT: OnceLock<Regex> = OnceLock::new();
    static DIGIT_ALPHA: OnceLock<Regex> = OnceLock::new();

    let non_word = NON_WORD.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap());
    let alpha_digit = ALPHA_DIGIT.get_or_init(|| Regex::new(r"([a-z])([0-9])").unwrap());
    let digit_alpha = DIGIT_ALPHA.get_or_init(|| Regex::new(r"([0-9])([a-z])").unwrap());

    let lowered = raw.trim().to_lowercase();
    let s = non_word.replace_all(&lowered, "_");
    let s = alpha_digit.replace_all(&s, "${1}_${2}");
    let s = digit_alpha.replace_all(&s, "${1}_${2}");
    let s = s.trim_matches('_');

    s.chars().take(CAMERA_MAX_LEN).collect::<String>().trim_end_matches('_').to_string()
}

/// Keep alphanumerics, spaces, `-` and `_`; replace everything else with `_`
pub fn safe_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Canonical extension (with dot) for an ExifTool file type
pub fn extension_for_file_type(file_type: &str) -> Option<&'static str> {
    let upper = file_type.trim().to_uppercase();
    FILETYPE_TO_EXT
        .iter()
        .find(|(ty, _)| *ty == upper)
        .map(|(_, ext)| *ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> TagValue {
        TagValue::Text(s.to_string())
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn parses_plain_exif_date() {
        assert_eq!(
            parse_exif_datetime("2024:05:17 14:03:22"),
            Some(datetime(2024, 5, 17, 14, 3, 22))
        );
    }

    #[test]
    fn strips_offsets_zulu_and_fractions() {
        let expected = Some(datetime(2023, 12, 31, 23, 59, 1));
        assert_eq!(parse_exif_datetime("2023:12:31 23:59:01+02:00"), expected);
        assert_eq!(parse_exif_datetime("2023:12:31 23:59:01Z"), expected);
        assert_eq!(parse_exif_datetime("2023:12:31 23:59:01-05:00"), expected);
        assert_eq!(parse_exif_datetime("2023:12:31 23:59:01.123"), expected);
    }

    #[test]
    fn rejects_zero_and_garbage_dates() {
        assert_eq!(parse_exif_datetime("0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_datetime("yesterday"), None);
        assert_eq!(parse_exif_datetime(""), None);
    }

    #[test]
    fn date_tags_are_tried_in_priority_order() {
        let mut tags = TagMap::new();
        tags.insert("EXIF:ModifyDate", text("2020:01:01 00:00:00"));
        tags.insert("QuickTime:CreateDate", text("2021:02:02 02:02:02"));
        tags.insert("EXIF:DateTimeOriginal", text("0000:00:00 00:00:00"));

        let meta = MediaMetadata::from_tags(&tags);
        assert_eq!(meta.captured_at, Some(datetime(2021, 2, 2, 2, 2, 2)));
    }

    #[test]
    fn keywords_union_lists_and_delimited_strings() {
        let mut tags = TagMap::new();
        tags.insert(
            "XMP:Subject",
            TagValue::List(vec![text(" Beach "), text("Family"), text("")]),
        );
        tags.insert("IPTC:Keywords", text("Summer, Family;Sunset"));

        let meta = MediaMetadata::from_tags(&tags);
        let keywords: Vec<_> = meta.keywords.iter().map(String::as_str).collect();
        assert_eq!(keywords, vec!["Beach", "Family", "Summer", "Sunset"]);
    }

    #[test]
    fn rating_prefers_xmp_and_clamps() {
        let mut tags = TagMap::new();
        tags.insert("XMP:Rating", TagValue::Number(9.0));
        tags.insert("EXIF:Rating", TagValue::Number(2.0));
        assert_eq!(MediaMetadata::from_tags(&tags).rating, 5);

        let mut tags = TagMap::new();
        tags.insert("EXIF:Rating", text("3"));
        assert_eq!(MediaMetadata::from_tags(&tags).rating, 3);

        let mut tags = TagMap::new();
        tags.insert("XMP:Rating", TagValue::Number(-1.0));
        assert_eq!(MediaMetadata::from_tags(&tags).rating, 0);
    }

    #[test]
    fn dimensions_fall_back_across_groups() {
        let mut tags = TagMap::new();
        tags.insert("File:ImageWidth", TagValue::Number(4032.0));
        tags.insert("QuickTime:ImageHeight", TagValue::Number(3024.0));

        let meta = MediaMetadata::from_tags(&tags);
        assert_eq!((meta.width, meta.height), (4032, 3024));
    }

    #[test]
    fn camera_fields_are_sanitized() {
        let mut tags = TagMap::new();
        tags.insert("EXIF:Make", text("Canon"));
        tags.insert("EXIF:Model", text("Canon EOS R5"));

        let meta = MediaMetadata::from_tags(&tags);
        assert_eq!(meta.camera_make, "canon");
        assert_eq!(meta.camera_model, "canon_eos_r_5");
    }

    #[test]
    fn empty_tags_resolve_to_defaults() {
        let meta = MediaMetadata::from_tags(&TagMap::new());
        assert_eq!(meta, MediaMetadata::default());
        assert_eq!(meta.detected_extension(), None);
    }

    #[test]
    fn sanitize_splits_letter_digit_boundaries() {
        assert_eq!(sanitize_camera_str("iPhone 15 Pro"), "iphone_15_pro");
        assert_eq!(sanitize_camera_str("ILCE-7RM4"), "ilce_7_rm_4");
        assert_eq!(sanitize_camera_str("  NIKON CORPORATION  "), "nikon_corporation");
        assert_eq!(sanitize_camera_str("---"), "");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "a".repeat(50);
        assert_eq!(sanitize_camera_str(&long).len(), CAMERA_MAX_LEN);
    }

    #[test]
    fn safe_filename_replaces_path_characters() {
        assert_eq!(safe_filename("Beach-Family"), "Beach-Family");
        assert_eq!(safe_filename("a/b:c"), "a_b_c");
        assert_eq!(safe_filename("  Trip 2024 "), "Trip 2024");
    }

    #[test]
    fn file_type_maps_to_extension() {
        assert_eq!(extension_for_file_type("HEIC"), Some(".heic"));
        assert_eq!(extension_for_file_type("jpeg"), Some(".jpg"));
        assert_eq!(extension_for_file_type("TIFF"), Some(".tiff"));
        assert_eq!(extension_for_file_type("PDF"), None);
    }
}
