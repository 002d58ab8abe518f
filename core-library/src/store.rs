//! # Local Library Store
//!
//! The on-disk media library: a two-generation ring (current + backup) with
//! atomic promotion.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   CURRENT                  pointer file naming current + backup
//!   generations/<id>/        media files
//!   generations/<id>/manifest.json
//! ```
//!
//! ## Atomicity
//!
//! Generations are immutable once written. The only mutation visible to
//! readers is the pointer file, which is rewritten via temp-file + rename,
//! a single-step operation, so every observable instant shows either the
//! fully-old or the fully-new generation. Staged generations are written
//! under `generations/` but are unreachable until `commit` repoints; a crash
//! mid-download leaves the live library untouched, and the orphan directory
//! is swept on the next startup.
//!
//! At most two generations survive a commit: the newly promoted one and the
//! previous current (now backup). This bounds disk usage and gives
//! `rollback` exactly one step to return to.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{LibraryError, Result};
use crate::generation::GenerationId;
use crate::manifest::{Manifest, ManifestEntry, MANIFEST_FILE};

/// Name of the pointer file at the library root.
pub const POINTER_FILE: &str = "CURRENT";

/// Directory holding generation snapshots.
pub const GENERATIONS_DIR: &str = "generations";

/// On-disk pointer: which generation is live, which is the rollback target.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pointer {
    current: GenerationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup: Option<GenerationId>,
}

/// In-memory mirror of the pointer plus the loaded current manifest.
#[derive(Debug, Clone)]
struct Live {
    current: GenerationId,
    manifest: Manifest,
    backup: Option<GenerationId>,
}

/// A read-only view of the promoted generation.
///
/// Cheap to clone; handed to the playback side so it never has to hold a
/// lock while playing.
#[derive(Debug, Clone)]
pub struct LibrarySnapshot {
    pub generation: GenerationId,
    pub dir: PathBuf,
    pub manifest: Manifest,
}

impl LibrarySnapshot {
    /// Absolute path of a file within this generation.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

/// A generation being populated in staging.
///
/// Files land here via `path_for` + `record` (fresh downloads) or `adopt`
/// (carry-over from the previous generation). Nothing under the handle is
/// reachable by readers until the store commits it.
#[derive(Debug)]
pub struct StagedGeneration {
    id: GenerationId,
    dir: PathBuf,
    manifest: Manifest,
}

impl StagedGeneration {
    pub fn id(&self) -> GenerationId {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Where a download for `filename` should be written.
    pub fn path_for(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.dir.join(filename))
    }

    /// Record a verified file that was written to `path_for(filename)`.
    pub fn record(&mut self, filename: &str, entry: ManifestEntry) -> Result<()> {
        validate_filename(filename)?;
        if !self.dir.join(filename).is_file() {
            return Err(LibraryError::StagedFileMissing {
                name: filename.to_string(),
            });
        }
        self.manifest.insert(filename.to_string(), entry);
        Ok(())
    }

    /// Carry an unchanged file over from another generation.
    ///
    /// Hard-links when the filesystem allows it, falling back to a copy, so
    /// unchanged media is never re-downloaded and rarely re-written.
    pub fn adopt(&mut self, from_dir: &Path, filename: &str, entry: ManifestEntry) -> Result<()> {
        validate_filename(filename)?;
        let src = from_dir.join(filename);
        let dst = self.dir.join(filename);
        if std::fs::hard_link(&src, &dst).is_err() {
            std::fs::copy(&src, &dst)?;
        }
        self.manifest.insert(filename.to_string(), entry);
        Ok(())
    }
}

/// The library store.
///
/// Thread-safe: sync and playback share one instance behind `Arc`. All
/// reads go through [`LibraryStore::snapshot`], which copies the published
/// state under a short read lock.
#[derive(Debug)]
pub struct LibraryStore {
    root: PathBuf,
    live: RwLock<Option<Live>>,
}

impl LibraryStore {
    /// Open (or initialize) a library rooted at `root`.
    ///
    /// Reads the pointer file if one exists and loads the current manifest.
    /// A current generation that fails to load falls back to the backup; if
    /// both are unreadable the library opens empty, which is logged as the
    /// distinct blank-state condition.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(GENERATIONS_DIR))?;

        let store = Self {
            root,
            live: RwLock::new(None),
        };

        let pointer = store.read_pointer()?;
        let live = match pointer {
            None => {
                info!("No pointer file; starting with an empty library");
                None
            }
            Some(pointer) => store.load_live(pointer)?,
        };

        let keep: Vec<GenerationId> = live
            .iter()
            .flat_map(|l| std::iter::once(l.current).chain(l.backup))
            .collect();
        store.sweep(&keep)?;

        *store.write_lock() = live;
        Ok(store)
    }

    /// The published view of the current generation, if any.
    pub fn snapshot(&self) -> Option<LibrarySnapshot> {
        self.read_lock().as_ref().map(|live| LibrarySnapshot {
            generation: live.current,
            dir: self.generation_dir(live.current),
            manifest: live.manifest.clone(),
        })
    }

    /// The current generation's manifest, if any.
    pub fn current_manifest(&self) -> Option<Manifest> {
        self.read_lock().as_ref().map(|live| live.manifest.clone())
    }

    /// Whether a backup generation exists to roll back to.
    pub fn has_backup(&self) -> bool {
        self.read_lock().as_ref().is_some_and(|l| l.backup.is_some())
    }

    /// Create an empty staged generation.
    pub fn stage_new_generation(&self) -> Result<StagedGeneration> {
        let id = GenerationId::new();
        let dir = self.generation_dir(id);
        std::fs::create_dir_all(&dir)?;
        debug!(generation = %id, "Staged new generation");
        Ok(StagedGeneration {
            id,
            dir,
            manifest: Manifest::new(id),
        })
    }

    /// Promote a staged generation to current.
    ///
    /// This is the atomicity boundary: the staged manifest is persisted
    /// first, then the pointer file is swapped in one rename. The previous
    /// current becomes backup; the previous backup is deleted.
    pub fn commit(&self, staged: StagedGeneration) -> Result<LibrarySnapshot> {
        staged.manifest.save(&staged.dir)?;

        let mut guard = self.write_lock();
        let (old_current, old_backup) = match guard.as_ref() {
            Some(live) => (Some(live.current), live.backup),
            None => (None, None),
        };

        let pointer = Pointer {
            current: staged.id,
            backup: old_current,
        };
        self.write_pointer(&pointer)?;

        *guard = Some(Live {
            current: staged.id,
            manifest: staged.manifest.clone(),
            backup: old_current,
        });
        drop(guard);

        if let Some(old) = old_backup {
            self.remove_generation(old);
        }

        info!(
            generation = %staged.id,
            files = staged.manifest.len(),
            "Promoted generation"
        );
        Ok(LibrarySnapshot {
            generation: staged.id,
            dir: self.generation_dir(staged.id),
            manifest: staged.manifest,
        })
    }

    /// Drop a staged generation that failed validation. Current is untouched.
    pub fn discard(&self, staged: StagedGeneration) -> Result<()> {
        debug!(generation = %staged.id, "Discarding staged generation");
        std::fs::remove_dir_all(&staged.dir)?;
        Ok(())
    }

    /// Swap current and backup generations.
    ///
    /// Returns the snapshot now current, or `None` (logged) when there is no
    /// backup to roll back to.
    pub fn rollback(&self) -> Result<Option<LibrarySnapshot>> {
        let mut guard = self.write_lock();
        let Some(live) = guard.as_ref() else {
            warn!("Rollback requested on an empty library");
            return Ok(None);
        };
        let Some(backup) = live.backup else {
            warn!(current = %live.current, "Rollback requested but no backup generation exists");
            return Ok(None);
        };
        let old_current = live.current;

        let manifest = Manifest::load(&self.generation_dir(backup))?;
        let pointer = Pointer {
            current: backup,
            backup: Some(old_current),
        };
        self.write_pointer(&pointer)?;

        *guard = Some(Live {
            current: backup,
            manifest: manifest.clone(),
            backup: Some(old_current),
        });
        drop(guard);

        info!(from = %old_current, to = %backup, "Rolled back to backup generation");
        Ok(Some(LibrarySnapshot {
            generation: backup,
            dir: self.generation_dir(backup),
            manifest,
        }))
    }

    /// Directory of a generation under this library root.
    pub fn generation_dir(&self, id: GenerationId) -> PathBuf {
        self.root.join(GENERATIONS_DIR).join(id.to_string())
    }

    fn read_pointer(&self) -> Result<Option<Pointer>> {
        let path = self.root.join(POINTER_FILE);
        match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| LibraryError::Pointer(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the pointer file via temp + rename: the single-step swap the
    /// whole store's atomicity rests on.
    fn write_pointer(&self, pointer: &Pointer) -> Result<()> {
        let raw = serde_json::to_vec_pretty(pointer)
            .map_err(|e| LibraryError::Pointer(e.to_string()))?;
        let tmp = self.root.join(format!("{}.tmp", POINTER_FILE));
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, self.root.join(POINTER_FILE))?;
        Ok(())
    }

    /// Resolve a pointer into loaded state, degrading through backup and
    /// empty as generations turn out unreadable.
    fn load_live(&self, pointer: Pointer) -> Result<Option<Live>> {
        match Manifest::load(&self.generation_dir(pointer.current)) {
            Ok(manifest) => Ok(Some(Live {
                current: pointer.current,
                manifest,
                backup: pointer.backup,
            })),
            Err(e) => {
                error!(
                    generation = %pointer.current,
                    error = %e,
                    "Current generation unreadable"
                );
                let Some(backup) = pointer.backup else {
                    error!("Library has no readable generation; starting blank");
                    return Ok(None);
                };
                match Manifest::load(&self.generation_dir(backup)) {
                    Ok(manifest) => {
                        warn!(generation = %backup, "Falling back to backup generation");
                        self.write_pointer(&Pointer {
                            current: backup,
                            backup: None,
                        })?;
                        Ok(Some(Live {
                            current: backup,
                            manifest,
                            backup: None,
                        }))
                    }
                    Err(e) => {
                        error!(
                            generation = %backup,
                            error = %e,
                            "Backup generation also unreadable; library is blank"
                        );
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Delete generation directories not referenced by the pointer
    /// (staging leftovers from an interrupted cycle).
    fn sweep(&self, keep: &[GenerationId]) -> Result<()> {
        let keep: HashSet<String> = keep.iter().map(|id| id.to_string()).collect();
        let generations = self.root.join(GENERATIONS_DIR);
        for dir_entry in std::fs::read_dir(&generations)? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if !keep.contains(&name) {
                warn!(generation = %name, "Sweeping orphan generation directory");
                if let Err(e) = std::fs::remove_dir_all(dir_entry.path()) {
                    warn!(generation = %name, error = %e, "Failed to sweep orphan generation");
                }
            }
        }
        Ok(())
    }

    fn remove_generation(&self, id: GenerationId) {
        let dir = self.generation_dir(id);
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(generation = %id, error = %e, "Failed to delete superseded generation");
            }
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Option<Live>> {
        self.live.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Option<Live>> {
        self.live.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn validate_filename(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == MANIFEST_FILE
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == "..";
    if bad {
        return Err(LibraryError::InvalidFilename {
            name: name.to_string(),
        });
    }
    Ok(())
}
