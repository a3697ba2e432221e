//! Plan generator for organization operations.
//!
//! The planner is the only owner of the claimed-destination set, so it runs
//! sequentially. Every destination it hands out is unique within the run;
//! the executor can then work through the plan in parallel.

use super::types::*;
use crate::core::catalog::{lowercase_extension, CatalogEntry, NonMediaEntry};
use crate::core::grouper::{select_winner, HashGroup, PairingMap};
use crate::core::hasher::{hash_file, ContentHash};
use crate::core::metadata::safe_filename;
use crate::core::scanner::{all_media_extensions, LooseFile, SIDECAR_EXTENSION};
use crate::error::PlanError;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const DUPLICATES_DIR: &str = "duplicates";
const KEYWORDS_DIR: &str = "Keywords";
const NO_KEYWORDS_DIR: &str = "No Keywords";
const NON_MEDIA_DIR: &str = "Non-Media";
const NO_EXTENSION_DIR: &str = "NO_EXTENSION";
const KEYWORD_FOLDER_LIMIT: usize = 4;

/// How a taken name is varied
#[derive(Debug, Clone, Copy)]
enum Suffix {
    /// `photo_dup1.jpg`
    Dup,
    /// `notes_1.pdf`
    Underscore,
    /// `photo_duplicate-1-1.jpg`
    Dash,
}

impl Suffix {
    fn apply(self, stem: &str, n: usize) -> String {
        match self {
            Suffix::Dup => format!("{}_dup{}", stem, n),
            Suffix::Underscore => format!("{}_{}", stem, n),
            Suffix::Dash => format!("{}-{}", stem, n),
        }
    }
}

enum Resolved {
    Free { path: PathBuf, renamed: bool },
    Unchanged(PathBuf),
}

impl Resolved {
    fn path(&self) -> &Path {
        match self {
            Resolved::Free { path, .. } | Resolved::Unchanged(path) => path,
        }
    }
}

/// The file a destination is being resolved for
struct Source<'a> {
    path: &'a Path,
    size: u64,
    hash: Option<&'a ContentHash>,
    role: ActionRole,
    op: FileOp,
}

/// Generates organization plans
pub struct OrganizePlanner {
    options: OrganizeOptions,
    claimed: HashSet<PathBuf>,
    /// Media sources already given a destination, carried partners included
    placed: HashMap<PathBuf, PathBuf>,
    placed_sidecars: HashSet<PathBuf>,
}

impl OrganizePlanner {
    pub fn new(options: OrganizeOptions) -> Result<Self, PlanError> {
        match &options.destination {
            None if options.action != ActionMode::RenameOnly => {
                return Err(PlanError::MissingDestination);
            }
            Some(dest) if dest.exists() && !dest.is_dir() => {
                return Err(PlanError::DestinationNotDirectory { path: dest.clone() });
            }
            _ => {}
        }

        Ok(Self {
            options,
            claimed: HashSet::new(),
            placed: HashMap::new(),
            placed_sidecars: HashSet::new(),
        })
    }

    pub fn options(&self) -> &OrganizeOptions {
        &self.options
    }

    /// Every destination handed out so far
    pub fn claimed(&self) -> &HashSet<PathBuf> {
        &self.claimed
    }

    /// Plan winners, duplicates, sidecars and paired files for all groups
    pub fn plan_groups(&mut self, groups: &[HashGroup], pairs: &PairingMap) -> OrganizePlan {
        let mut plan = OrganizePlan::new(Uuid::new_v4().to_string());
        let index: HashMap<&Path, &CatalogEntry> = groups
            .iter()
            .flat_map(|g| g.members.iter())
            .map(|e| (e.path.as_path(), e))
            .collect();

        for group in groups {
            let winner_idx = select_winner(&group.members, &self.options.weights);
            let winner = &group.members[winner_idx];

            let anchor = match self.placed.get(&winner.path) {
                Some(carried) => carried.clone(),
                None => match self.plan_winner(winner, ActionRole::Winner, pairs, &index, &mut plan) {
                    Some(dest) => dest,
                    None => continue,
                },
            };

            let mut dup_index = 0;
            for (i, loser) in group.members.iter().enumerate() {
                if i == winner_idx || self.placed.contains_key(&loser.path) {
                    continue;
                }
                dup_index += 1;

                if self.options.duplicates == DuplicateStrategy::Keep {
                    self.plan_winner(loser, ActionRole::Duplicate, pairs, &index, &mut plan);
                    continue;
                }
                if self.options.action == ActionMode::RenameOnly {
                    self.placed.insert(loser.path.clone(), loser.path.clone());
                    plan.skipped += 1;
                    continue;
                }
                let source = Source {
                    path: &loser.path,
                    size: loser.size,
                    hash: Some(&loser.content_hash),
                    role: ActionRole::Duplicate,
                    op: self.options.file_op(),
                };
                self.plan_duplicate(
                    source,
                    &loser.corrected_extension,
                    loser.sidecar.as_deref(),
                    &anchor,
                    dup_index,
                    &mut plan,
                );
            }
        }

        debug!(
            "Planned {} item(s), {} unchanged, {} skipped, {} conflict(s)",
            plan.items.len(),
            plan.unchanged.len(),
            plan.skipped,
            plan.conflict_count
        );
        plan
    }

    /// Plan relocation of sidecars with no media file beside them
    pub fn plan_orphans(&mut self, sidecars: &[LooseFile]) -> OrganizePlan {
        let mut plan = OrganizePlan::new(Uuid::new_v4().to_string());
        let Some(orphan_dir) = self.options.effective_orphan_directory() else {
            debug!("No orphan directory configured; leaving orphaned sidecars in place");
            return plan;
        };
        let op = match self.options.file_op() {
            FileOp::Copy => FileOp::Copy,
            FileOp::Move | FileOp::Rename => FileOp::Move,
        };

        for sidecar in sidecars {
            if self.placed_sidecars.contains(&sidecar.path) || !is_orphan_sidecar(&sidecar.path) {
                continue;
            }
            let relative = match sidecar.path.strip_prefix(&sidecar.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => match sidecar.path.file_name() {
                    Some(name) => PathBuf::from(name),
                    None => continue,
                },
            };

            self.placed_sidecars.insert(sidecar.path.clone());
            let source = Source {
                path: &sidecar.path,
                size: sidecar.size,
                hash: None,
                role: ActionRole::Orphan,
                op,
            };
            let resolved = self.resolve(orphan_dir.join(relative), &source, Suffix::Dup);
            if let Some(action) = self.record(resolved, &source, &mut plan) {
                plan.items.push(PlannedItem::new(action));
            }
        }

        plan
    }

    /// Plan placement of non-media files under `Non-Media/<EXT>/`
    pub fn plan_non_media(&mut self, files: &[NonMediaEntry]) -> OrganizePlan {
        let mut plan = OrganizePlan::new(Uuid::new_v4().to_string());
        let dest = match (&self.options.destination, self.options.action) {
            (Some(dest), ActionMode::Copy | ActionMode::Move) => dest.clone(),
            _ => {
                debug!("Non-media files are only placed when copying or moving to a destination");
                return plan;
            }
        };

        let mut by_hash: HashMap<&ContentHash, Vec<&NonMediaEntry>> = HashMap::new();
        for file in files {
            by_hash.entry(&file.content_hash).or_default().push(file);
        }
        let mut groups: Vec<Vec<&NonMediaEntry>> = by_hash.into_values().collect();
        for group in &mut groups {
            group.sort_by(|a, b| a.path.cmp(&b.path));
        }
        groups.sort_by(|a, b| a[0].path.cmp(&b[0].path));

        for group in groups {
            let mut winner_idx = 0;
            for (i, file) in group.iter().enumerate() {
                if file.size > group[winner_idx].size {
                    winner_idx = i;
                }
            }
            let winner = group[winner_idx];
            let Some(anchor) = self.place_non_media(winner, &dest, ActionRole::NonMedia, &mut plan)
            else {
                continue;
            };

            let mut dup_index = 0;
            for (i, file) in group.iter().enumerate() {
                if i == winner_idx {
                    continue;
                }
                dup_index += 1;
                if self.options.duplicates == DuplicateStrategy::Keep {
                    self.place_non_media(file, &dest, ActionRole::Duplicate, &mut plan);
                    continue;
                }
                let source = Source {
                    path: &file.path,
                    size: file.size,
                    hash: Some(&file.content_hash),
                    role: ActionRole::Duplicate,
                    op: self.options.file_op(),
                };
                let ext = lowercase_extension(&file.path);
                self.plan_duplicate(source, &ext, None, &anchor, dup_index, &mut plan);
            }
        }

        plan
    }

    /// Place one non-media file under `Non-Media/<EXT>/`, returning where it lands
    fn place_non_media(
        &mut self,
        file: &NonMediaEntry,
        dest: &Path,
        role: ActionRole,
        plan: &mut OrganizePlan,
    ) -> Option<PathBuf> {
        let Some(name) = file.path.file_name() else {
            plan.errors.push(
                PlanError::NoFileName {
                    path: file.path.clone(),
                }
                .to_string(),
            );
            return None;
        };
        let ext_dir = file
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_uppercase())
            .unwrap_or_else(|| NO_EXTENSION_DIR.to_string());
        let wanted = dest.join(NON_MEDIA_DIR).join(ext_dir).join(name);

        let source = Source {
            path: &file.path,
            size: file.size,
            hash: Some(&file.content_hash),
            role,
            op: self.options.file_op(),
        };
        let resolved = self.resolve(wanted, &source, Suffix::Underscore);
        let placed = resolved.path().to_path_buf();
        if let Some(action) = self.record(resolved, &source, plan) {
            plan.items.push(PlannedItem::new(action));
        }
        Some(placed)
    }

    /// Place a file the way a winner is placed, carrying its sidecar and partner
    fn plan_winner(
        &mut self,
        entry: &CatalogEntry,
        role: ActionRole,
        pairs: &PairingMap,
        index: &HashMap<&Path, &CatalogEntry>,
        plan: &mut OrganizePlan,
    ) -> Option<PathBuf> {
        let name = match self.file_name_for(entry) {
            Ok(name) => name,
            Err(e) => {
                warn!("{}", e);
                plan.errors.push(e.to_string());
                return None;
            }
        };
        let wanted = self.folder_for(entry).join(name);

        let source = Source {
            path: &entry.path,
            size: entry.size,
            hash: Some(&entry.content_hash),
            role,
            op: self.options.file_op(),
        };
        let resolved = self.resolve(wanted, &source, Suffix::Dup);
        let dest = resolved.path().to_path_buf();
        self.placed.insert(entry.path.clone(), dest.clone());
        let primary = self.record(resolved, &source, plan);

        let dest_dir = dest.parent().map(Path::to_path_buf).unwrap_or_default();
        let dest_stem = file_stem(&dest);
        let mut attached = Vec::new();

        if let Some(sidecar) = &entry.sidecar {
            self.attach_sidecar(sidecar, &dest_dir, &dest_stem, plan, &mut attached);
        }

        let partner = pairs
            .partner(&entry.path)
            .filter(|p| !self.placed.contains_key(*p))
            .and_then(|p| index.get(p).copied());
        if let Some(partner) = partner {
            let wanted = dest_dir.join(format!("{}{}", dest_stem, partner.original_extension()));
            let source = Source {
                path: &partner.path,
                size: partner.size,
                hash: Some(&partner.content_hash),
                role: ActionRole::Paired,
                op: self.options.file_op(),
            };
            let resolved = self.resolve(wanted, &source, Suffix::Dup);
            self.placed
                .insert(partner.path.clone(), resolved.path().to_path_buf());
            attached.extend(self.record(resolved, &source, plan));

            if let Some(sidecar) = &partner.sidecar {
                self.attach_sidecar(sidecar, &dest_dir, &dest_stem, plan, &mut attached);
            }
        }

        match primary {
            Some(primary) => plan.items.push(PlannedItem { primary, attached }),
            None => plan.items.extend(attached.into_iter().map(PlannedItem::new)),
        }
        Some(dest)
    }

    fn plan_duplicate(
        &mut self,
        source: Source<'_>,
        ext: &str,
        sidecar: Option<&Path>,
        anchor: &Path,
        dup_index: usize,
        plan: &mut OrganizePlan,
    ) {
        let anchor_dir = anchor.parent().unwrap_or(Path::new(""));
        let dir = match self.options.duplicates {
            DuplicateStrategy::Folder => anchor_dir.join(DUPLICATES_DIR),
            DuplicateStrategy::Alongside => anchor_dir.to_path_buf(),
            // Kept copies are placed by the callers and never reach this arm
            DuplicateStrategy::Skip | DuplicateStrategy::Keep => {
                self.placed
                    .insert(source.path.to_path_buf(), source.path.to_path_buf());
                plan.skipped += 1;
                return;
            }
        };

        let wanted = dir.join(format!("{}_duplicate-{}{}", file_stem(anchor), dup_index, ext));
        let resolved = self.resolve(wanted, &source, Suffix::Dash);
        let dest = resolved.path().to_path_buf();
        self.placed.insert(source.path.to_path_buf(), dest.clone());
        let primary = self.record(resolved, &source, plan);

        let mut attached = Vec::new();
        if let Some(sidecar) = sidecar {
            let dest_dir = dest.parent().map(Path::to_path_buf).unwrap_or_default();
            self.attach_sidecar(sidecar, &dest_dir, &file_stem(&dest), plan, &mut attached);
        }

        match primary {
            Some(primary) => plan.items.push(PlannedItem { primary, attached }),
            None => plan.items.extend(attached.into_iter().map(PlannedItem::new)),
        }
    }

    fn attach_sidecar(
        &mut self,
        sidecar: &Path,
        dir: &Path,
        stem: &str,
        plan: &mut OrganizePlan,
        attached: &mut Vec<PlannedAction>,
    ) {
        if !self.placed_sidecars.insert(sidecar.to_path_buf()) {
            return;
        }
        let size = fs::metadata(sidecar).map(|m| m.len()).unwrap_or(0);
        let source = Source {
            path: sidecar,
            size,
            hash: None,
            role: ActionRole::Sidecar,
            op: self.options.file_op(),
        };
        let wanted = dir.join(format!("{}.{}", stem, SIDECAR_EXTENSION));
        let resolved = self.resolve(wanted, &source, Suffix::Dup);
        attached.extend(self.record(resolved, &source, plan));
    }

    /// Destination folder for a winner
    fn folder_for(&self, entry: &CatalogEntry) -> PathBuf {
        let dest = match (&self.options.destination, self.options.action) {
            (Some(dest), ActionMode::Copy | ActionMode::Move) => dest,
            _ => return entry.path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let year = entry.captured_at.format("%Y").to_string();
        let month = entry.captured_at.format("%m").to_string();

        let base = match self.options.structure {
            FolderStructure::Simple => dest.clone(),
            FolderStructure::Keywords => match keyword_folder(entry) {
                Some(label) => dest.join(KEYWORDS_DIR).join(label),
                None => dest.join(NO_KEYWORDS_DIR),
            },
        };
        base.join(year).join(month)
    }

    /// Destination file name for a winner
    fn file_name_for(&self, entry: &CatalogEntry) -> Result<String, PlanError> {
        let ext = &entry.corrected_extension;
        match self.options.naming {
            NamingScheme::Original => entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| PlanError::NoFileName {
                    path: entry.path.clone(),
                }),
            NamingScheme::Camera => {
                let mut parts = vec![entry.captured_at.format("%Y-%m-%d-%H%M%S").to_string()];
                if !entry.camera_make.is_empty() {
                    parts.push(entry.camera_make.clone());
                }
                if !entry.camera_model.is_empty() {
                    parts.push(entry.camera_model.clone());
                }
                parts.push(entry.content_hash.prefix(8).to_string());
                Ok(format!("{}{}", parts.join("-"), ext))
            }
            NamingScheme::ContentAddressed => Ok(format!(
                "{}_{}_{}{}",
                entry.captured_at.format("%Y-%m-%d_%H-%M-%S"),
                if entry.is_video() { "VID" } else { "IMG" },
                entry.content_hash.prefix(16),
                ext
            )),
        }
    }

    /// Find the first usable destination at or after `wanted`.
    ///
    /// A path is usable when nobody in this run claimed it and it is free on
    /// disk. Outside dry runs an occupied path is skipped; in dry runs only
    /// the claimed set counts. A path that is the source itself, or already
    /// holds the same bytes, resolves to `Unchanged`.
    fn resolve(&mut self, wanted: PathBuf, source: &Source<'_>, suffix: Suffix) -> Resolved {
        let mut path = wanted.clone();
        let mut n = 0;

        loop {
            if !self.claimed.contains(&path) {
                if path == source.path || holds_same_content(&path, source) {
                    self.claimed.insert(path.clone());
                    return Resolved::Unchanged(path);
                }
                if self.options.dry_run || fs::symlink_metadata(&path).is_err() {
                    self.claimed.insert(path.clone());
                    return Resolved::Free {
                        path,
                        renamed: n > 0,
                    };
                }
            }
            n += 1;
            path = with_suffix(&wanted, suffix, n);
        }
    }

    fn record(
        &self,
        resolved: Resolved,
        source: &Source<'_>,
        plan: &mut OrganizePlan,
    ) -> Option<PlannedAction> {
        match resolved {
            Resolved::Unchanged(destination) => {
                debug!("Unchanged: {} already at {}", source.path.display(), destination.display());
                plan.unchanged.push(UnchangedFile {
                    source: source.path.to_path_buf(),
                    destination,
                    role: source.role,
                });
                None
            }
            Resolved::Free { path, renamed } => {
                if renamed {
                    plan.conflict_count += 1;
                }
                Some(PlannedAction {
                    source: source.path.to_path_buf(),
                    destination: path,
                    op: source.op,
                    role: source.role,
                    size_bytes: source.size,
                    has_conflict: renamed,
                })
            }
        }
    }
}

/// Whether a sidecar has no media file of any supported extension beside it.
///
/// Both the name up to the first dot (`IMG_1` for `IMG_1.dng.xmp`) and the
/// plain stem are tried.
pub fn is_orphan_sidecar(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let dir = path.parent().unwrap_or(Path::new(""));
    let first = name.split('.').next().unwrap_or(name);
    let full = path.file_stem().and_then(|s| s.to_str()).unwrap_or(first);

    let mut stems = vec![first];
    if full != first {
        stems.push(full);
    }

    !stems.iter().any(|stem| {
        all_media_extensions().any(|ext| {
            dir.join(format!("{}.{}", stem, ext)).exists()
                || dir.join(format!("{}.{}", stem, ext.to_uppercase())).exists()
        })
    })
}

fn keyword_folder(entry: &CatalogEntry) -> Option<String> {
    let joined = entry
        .keywords
        .iter()
        .take(KEYWORD_FOLDER_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("-");
    let label = safe_filename(&joined);
    (!label.is_empty()).then_some(label)
}

fn holds_same_content(path: &Path, source: &Source<'_>) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() || meta.len() != source.size {
        return false;
    }

    let source_hash = match source.hash {
        Some(hash) => hash.clone(),
        None => match hash_file(source.path) {
            Ok(hash) => hash,
            Err(_) => return false,
        },
    };
    hash_file(path).map(|h| h == source_hash).unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn with_suffix(path: &Path, suffix: Suffix, n: usize) -> PathBuf {
    let name = suffix.apply(&file_stem(path), n);
    let name = match path.extension() {
        Some(ext) => format!("{}.{}", name, ext.to_string_lossy()),
        None => name,
    };
    path.with_file_name(name)
}
