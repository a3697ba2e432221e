//! # Core Module
//!
//! The organize/deduplicate engine, independent of any front end.
//!
//! ## Modules
//! - `scanner` - Discovers media, sidecars and other files
//! - `hasher` - SHA-256 content hashes
//! - `metadata` - ExifTool extraction and the typed tag model
//! - `catalog` - One resolved entry per media file, plus scoring
//! - `grouper` - Groups identical content and links RAW+JPEG pairs
//! - `organize` - Plans and executes file placement
//! - `pipeline` - Orchestrates the full workflow

pub mod catalog;
pub mod grouper;
pub mod hasher;
pub mod metadata;
pub mod organize;
pub mod pipeline;
pub mod scanner;

// Re-export commonly used types
pub use catalog::{CatalogEntry, NonMediaEntry, ScoreWeights};
pub use grouper::{HashGroup, PairingMap};
pub use hasher::ContentHash;
pub use metadata::{MediaMetadata, MetadataReader};
pub use organize::{OrganizeOptions, OrganizePlan, OrganizeResult};
pub use pipeline::{CancellationToken, Pipeline, PipelineBuilder, PipelineResult};
pub use scanner::{MediaFile, MediaKind};
