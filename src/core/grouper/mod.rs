//! # Grouper Module
//!
//! Partitions catalog entries into groups of byte-identical files, picks the
//! copy to keep in each group, and links RAW+JPEG pairs shot together.
//!
//! Everything here is deterministic: members are ordered by path and groups
//! by capture time then hash, so the order in which files finished hashing
//! never shows up in the result.

use crate::core::catalog::{CatalogEntry, ScoreWeights};
use crate::core::hasher::ContentHash;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Files sharing one content hash
#[derive(Debug, Clone)]
pub struct HashGroup {
    pub id: Uuid,
    pub hash: ContentHash,
    /// Members, sorted by path
    pub members: Vec<CatalogEntry>,
}

impl HashGroup {
    fn new(hash: ContentHash, mut members: Vec<CatalogEntry>) -> Self {
        members.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            id: Uuid::new_v4(),
            hash,
            members,
        }
    }

    /// Whether the group holds more than one copy
    pub fn is_duplicate(&self) -> bool {
        self.members.len() >= 2
    }

    /// Number of copies beyond the first
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// Bytes that removing the extra copies would free
    pub fn wasted_bytes(&self) -> u64 {
        self.members
            .iter()
            .map(|m| m.size)
            .sum::<u64>()
            .saturating_sub(self.members.first().map(|m| m.size).unwrap_or(0))
    }

    /// Earliest capture time among members
    pub fn earliest_capture(&self) -> Option<chrono::NaiveDateTime> {
        self.members.iter().map(|m| m.captured_at).min()
    }

    /// The member to keep
    pub fn winner(&self, weights: &ScoreWeights) -> &CatalogEntry {
        &self.members[select_winner(&self.members, weights)]
    }
}

/// Partition entries by content hash.
///
/// Every entry lands in exactly one group; singletons are groups too.
pub fn group_by_hash(entries: Vec<CatalogEntry>) -> Vec<HashGroup> {
    let mut by_hash: HashMap<ContentHash, Vec<CatalogEntry>> = HashMap::new();
    for entry in entries {
        by_hash
            .entry(entry.content_hash.clone())
            .or_default()
            .push(entry);
    }

    let mut groups: Vec<HashGroup> = by_hash
        .into_iter()
        .map(|(hash, members)| HashGroup::new(hash, members))
        .collect();

    groups.sort_by(|a, b| {
        a.earliest_capture()
            .cmp(&b.earliest_capture())
            .then_with(|| a.hash.cmp(&b.hash))
    });
    groups
}

/// Index of the highest-scoring member.
///
/// Ties go to the first maximal member, so with path-sorted members the
/// lexicographically smallest path wins. Returns 0 for an empty slice.
pub fn select_winner(members: &[CatalogEntry], weights: &ScoreWeights) -> usize {
    let mut best = 0;
    let mut best_score = f64::MIN;

    for (i, member) in members.iter().enumerate() {
        let score = member.score(weights);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }

    best
}

/// RAW+JPEG pairs, linked both ways by path
#[derive(Debug, Clone, Default)]
pub struct PairingMap {
    links: HashMap<PathBuf, PathBuf>,
}

impl PairingMap {
    /// Link files that share a directory and stem when the stem holds
    /// exactly one RAW and exactly one non-RAW still image.
    pub fn build(entries: &[CatalogEntry]) -> Self {
        let mut by_stem: HashMap<(PathBuf, String), Vec<&CatalogEntry>> = HashMap::new();
        for entry in entries {
            let parent = entry
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            by_stem.entry((parent, entry.stem())).or_default().push(entry);
        }

        let mut links = HashMap::new();
        for members in by_stem.values().filter(|m| m.len() >= 2) {
            let raws: Vec<_> = members.iter().filter(|m| m.is_raw()).collect();
            let stills: Vec<_> = members
                .iter()
                .filter(|m| !m.is_raw() && !m.is_video())
                .collect();

            if let ([raw], [still]) = (raws.as_slice(), stills.as_slice()) {
                links.insert(raw.path.clone(), still.path.clone());
                links.insert(still.path.clone(), raw.path.clone());
            }
        }

        Self { links }
    }

    /// The partner of `path`, if it is paired
    pub fn partner(&self, path: &Path) -> Option<&Path> {
        self.links.get(path).map(PathBuf::as_path)
    }

    /// Number of linked pairs
    pub fn len(&self) -> usize {
        self.links.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
