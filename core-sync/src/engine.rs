//! # Sync Engine
//!
//! Orchestrates one poll cycle: list the remote prefix, diff against the
//! current manifest, download and verify deltas into a staged generation,
//! promote atomically, and republish the playlist.
//!
//! ## Workflow
//!
//! 1. List remote media and fetch the playlist descriptor
//! 2. Diff the listing against the current generation's manifest
//! 3. Stage a new generation: carry unchanged files (hard-link), download
//!    the rest
//! 4. Verify every download (size, digest) with bounded retries; a failing
//!    entry is skipped and its previous version, if any, is retained
//! 5. Promote only if the staged generation resolves a non-empty playlist;
//!    otherwise discard it and keep the current generation
//! 6. Resolve and publish the playlist for the promoted generation
//! 7. Update the published [`SyncState`]
//!
//! Failure recovery is local: `Unavailable` defers the cycle, `NotFound`
//! and `CorruptDownload` skip single entries, `PromotionAborted` keeps the
//! device on its last good library. Only local filesystem failures are
//! fatal and escalate to the supervisor.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bridge_traits::http::RetryPolicy;
use bridge_traits::render::MediaKind;
use bridge_traits::store::{ObjectStore, RemoteObject};
use bridge_traits::BridgeError;
use chrono::Utc;
use core_library::{LibraryStore, ManifestEntry, StagedGeneration};
use core_playlist::{resolve, Playlist, PlaylistEntry};
use core_runtime::config::AgentConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::diff::diff_manifest;
use crate::error::{Result, SyncError};
use crate::state::SyncState;

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Remote prefix holding media objects (`<group>/<device>/media/`).
    pub media_prefix: String,
    /// Remote key of the playlist descriptor.
    pub playlist_key: String,
    /// Bounded-retry policy applied per entry download.
    pub retry_policy: RetryPolicy,
}

impl EngineConfig {
    pub fn from_agent(config: &AgentConfig) -> Self {
        Self {
            media_prefix: config.media_prefix(),
            playlist_key: config.playlist_key(),
            retry_policy: config.sync.retry_policy(),
        }
    }
}

/// Outcome of one `run_cycle` invocation.
#[derive(Debug)]
pub struct CycleResult {
    /// Whether the library or the published playlist changed.
    pub changed: bool,
    /// The cycle's error, if any. A `Some` with `changed: true` means the
    /// cycle completed degraded (some entries skipped).
    pub error: Option<SyncError>,
}

/// What the remote had to say about the playlist descriptor this cycle.
enum DescriptorState {
    /// Descriptor fetched successfully.
    Fetched(Vec<u8>),
    /// The remote has no descriptor; the manifest-order fallback applies.
    Missing,
    /// Transport failure: this cycle learned nothing about the descriptor.
    Unreachable,
}

impl DescriptorState {
    fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Fetched(raw) => Some(raw),
            _ => None,
        }
    }

    /// Digest used to detect descriptor changes between cycles.
    fn digest(&self) -> Option<String> {
        self.bytes()
            .map(|raw| format!("{:x}", Sha256::digest(raw)))
    }
}

/// Per-cycle bookkeeping for events and the result.
#[derive(Default)]
struct CycleOutcome {
    media_changed: bool,
    playlist_changed: bool,
    fetched: u64,
    carried: u64,
    retired: u64,
    degraded: Option<SyncError>,
}

/// The content synchronization engine.
///
/// Single-consumer: `run_cycle` takes `&mut self` and is only ever driven
/// by the [`CycleRunner`](crate::runner::CycleRunner) (or a one-shot manual
/// update), so two cycles can never overlap the staging area.
pub struct SyncEngine {
    config: EngineConfig,
    store: Arc<dyn ObjectStore>,
    library: Arc<LibraryStore>,
    events: EventBus,
    state_tx: watch::Sender<SyncState>,
    playlist_tx: watch::Sender<Playlist>,
    last_descriptor_digest: Option<String>,
}

impl SyncEngine {
    /// Create an engine over an opened library.
    ///
    /// Publishes an initial playlist from whatever generation is already on
    /// disk (manifest-order fallback), so playback starts immediately on
    /// boot without waiting for the first cycle.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ObjectStore>,
        library: Arc<LibraryStore>,
        events: EventBus,
    ) -> Self {
        let snapshot = library.snapshot();
        let initial_entries = snapshot
            .as_ref()
            .map(|s| resolve(None, &s.manifest))
            .unwrap_or_default();

        let initial_playlist = if initial_entries.is_empty() {
            Playlist::default()
        } else {
            Playlist::new(1, initial_entries)
        };
        let initial_state = SyncState {
            current_generation: snapshot.as_ref().map(|s| s.generation),
            playlist_version: initial_playlist.version,
            ..SyncState::default()
        };

        let (state_tx, _) = watch::channel(initial_state);
        let (playlist_tx, _) = watch::channel(initial_playlist);

        Self {
            config,
            store,
            library,
            events,
            state_tx,
            playlist_tx,
            last_descriptor_digest: None,
        }
    }

    /// Subscribe to the published playlist. The playback loop's only input.
    pub fn subscribe_playlist(&self) -> watch::Receiver<Playlist> {
        self.playlist_tx.subscribe()
    }

    /// Subscribe to the published sync state.
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Run one full sync cycle.
    #[instrument(skip(self, cancel))]
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleResult {
        let started = Instant::now();

        match self.execute_cycle(cancel).await {
            Ok(outcome) => {
                let changed = outcome.media_changed || outcome.playlist_changed;
                self.events
                    .emit(CoreEvent::Sync(SyncEvent::CycleCompleted {
                        changed,
                        fetched: outcome.fetched,
                        carried: outcome.carried,
                        retired: outcome.retired,
                        duration_ms: started.elapsed().as_millis() as u64,
                    }))
                    .ok();

                let generation = self.library.snapshot().map(|s| s.generation);
                let playlist_version = self.playlist_tx.borrow().version;
                let error_text = outcome.degraded.as_ref().map(ToString::to_string);
                self.state_tx.send_modify(|state| {
                    state.last_success = Some(Utc::now());
                    state.last_error = error_text;
                    state.current_generation = generation;
                    state.playlist_version = playlist_version;
                });

                info!(
                    changed,
                    fetched = outcome.fetched,
                    carried = outcome.carried,
                    retired = outcome.retired,
                    "Cycle completed"
                );
                CycleResult {
                    changed,
                    error: outcome.degraded,
                }
            }
            Err(e) => {
                warn!(error = %e, "Cycle failed");
                self.events
                    .emit(CoreEvent::Sync(SyncEvent::CycleFailed {
                        message: e.to_string(),
                        recoverable: !e.is_fatal(),
                    }))
                    .ok();
                let error_text = e.to_string();
                self.state_tx
                    .send_modify(|state| state.last_error = Some(error_text));
                CycleResult {
                    changed: false,
                    error: Some(e),
                }
            }
        }
    }

    async fn execute_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleOutcome> {
        // Phase 1: remote listing + descriptor.
        let listing = self
            .store
            .list(&self.config.media_prefix)
            .await
            .map_err(SyncError::from)?;
        let listing = filter_playable(listing);
        let descriptor = self.fetch_descriptor().await;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // Phase 2: diff against the current manifest.
        let current = self.library.current_manifest();
        let diff = diff_manifest(&listing, current.as_ref());

        let descriptor_digest = descriptor.digest();
        let descriptor_changed = !matches!(descriptor, DescriptorState::Unreachable)
            && descriptor_digest != self.last_descriptor_digest;

        let mut outcome = CycleOutcome {
            carried: diff.carry.len() as u64,
            retired: diff.retired.len() as u64,
            ..CycleOutcome::default()
        };

        if !diff.is_unchanged() {
            // Phase 3-6: stage, download, verify, promote, publish.
            self.sync_generation(cancel, &descriptor, diff, &mut outcome)
                .await?;
        } else if descriptor_changed {
            // Playlist-only change: re-resolve against the unchanged
            // generation, no staging.
            if let Some(manifest) = &current {
                let resolved = resolve(descriptor.bytes(), manifest);
                if resolved.is_empty() {
                    warn!("Changed descriptor resolves no entries; keeping previous playlist");
                    outcome.degraded = Some(SyncError::PlaylistInvalid);
                    return Ok(outcome);
                }
                outcome.playlist_changed = self.publish_playlist(resolved);
            }
        } else {
            debug!("No remote change");
        }

        // Remember the descriptor we acted on, so an unchanged remote makes
        // the next cycle a no-op.
        if !matches!(descriptor, DescriptorState::Unreachable) {
            self.last_descriptor_digest = descriptor_digest;
        }

        Ok(outcome)
    }

    /// Stage, populate, gate, promote, and publish one new generation.
    async fn sync_generation(
        &mut self,
        cancel: &CancellationToken,
        descriptor: &DescriptorState,
        diff: crate::diff::DiffOutcome,
        outcome: &mut CycleOutcome,
    ) -> Result<()> {
        let current_snapshot = self.library.snapshot();
        let mut staged = self.library.stage_new_generation()?;

        // Carry unchanged files over without touching the network.
        if let Some(snapshot) = &current_snapshot {
            for (name, entry) in &diff.carry {
                staged.adopt(&snapshot.dir, name, entry.clone())?;
            }
        }

        for object in &diff.to_fetch {
            if cancel.is_cancelled() {
                self.library.discard(staged)?;
                return Err(SyncError::Cancelled);
            }

            match self.download_entry(&mut staged, object).await {
                Ok(()) => outcome.fetched += 1,
                Err(e) if e.is_fatal() => {
                    let _ = self.library.discard(staged);
                    return Err(e);
                }
                Err(e) => {
                    // Per-entry isolation: skip this one, keep the cycle.
                    warn!(key = %object.key, error = %e, "Skipping entry");
                    self.events
                        .emit(CoreEvent::Sync(SyncEvent::EntrySkipped {
                            key: object.key.clone(),
                            reason: e.to_string(),
                        }))
                        .ok();

                    // Retain the previous version of the file when one
                    // exists, so a bad upload cannot take down a working
                    // entry.
                    if let Some(snapshot) = &current_snapshot {
                        let name = object.filename();
                        if let Some(entry) = snapshot.manifest.get(name) {
                            staged.adopt(&snapshot.dir, name, entry.clone())?;
                            info!(filename = %name, "Retained previous version");
                        }
                    }
                    outcome.degraded = Some(e);
                }
            }
        }

        // Promotion gate: the staged generation must resolve a non-empty
        // playlist, falling back to manifest order, or the device would be
        // left with nothing to show.
        let mut entries = match descriptor {
            // The authored order is unknown this cycle; keep the previous
            // sequence, pruned to files the staged generation still holds.
            DescriptorState::Unreachable => {
                let previous = self.playlist_tx.borrow();
                previous
                    .entries
                    .iter()
                    .filter(|e| staged.manifest().contains(&e.filename))
                    .cloned()
                    .collect()
            }
            _ => resolve(descriptor.bytes(), staged.manifest()),
        };
        if entries.is_empty() {
            entries = resolve(None, staged.manifest());
        }
        if entries.is_empty() {
            let reason = "staged generation resolves no playable entries";
            self.events
                .emit(CoreEvent::Library(LibraryEvent::GenerationDiscarded {
                    generation: staged.id().to_string(),
                    reason: reason.to_string(),
                }))
                .ok();
            self.library.discard(staged)?;
            return Err(SyncError::PromotionAborted(reason.to_string()));
        }

        let snapshot = self.library.commit(staged)?;
        self.events
            .emit(CoreEvent::Library(LibraryEvent::GenerationPromoted {
                generation: snapshot.generation.to_string(),
                files: snapshot.manifest.len() as u64,
            }))
            .ok();
        outcome.media_changed = true;
        outcome.playlist_changed = self.publish_playlist(entries);
        Ok(())
    }

    /// Download one entry into staging with the bounded retry policy.
    async fn download_entry(
        &self,
        staged: &mut StagedGeneration,
        object: &RemoteObject,
    ) -> Result<()> {
        let filename = object.filename().to_string();
        let path = staged.path_for(&filename)?;

        let mut last_error: Option<SyncError> = None;
        for attempt in 0..self.config.retry_policy.max_attempts {
            let delay = self.config.retry_policy.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.try_download(object, &path).await {
                Ok(entry) => {
                    staged.record(&filename, entry)?;
                    debug!(key = %object.key, attempt = attempt + 1, "Downloaded entry");
                    return Ok(());
                }
                // The key vanished between list and fetch; retrying cannot
                // bring it back.
                Err(e @ SyncError::NotFound(_)) => return Err(e),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        key = %object.key,
                        attempt = attempt + 1,
                        max_attempts = self.config.retry_policy.max_attempts,
                        error = %e,
                        "Download attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SyncError::Unavailable("download retries exhausted".to_string())))
    }

    /// One download attempt: stream to disk while hashing, then verify the
    /// written bytes against the declared size and digest.
    async fn try_download(&self, object: &RemoteObject, path: &Path) -> Result<ManifestEntry> {
        let body = self
            .store
            .fetch(&object.key)
            .await
            .map_err(SyncError::from)?;
        let mut reader = body.reader;

        let mut file = tokio::fs::File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(path).await;
                    return Err(SyncError::Unavailable(format!("stream interrupted: {}", e)));
                }
            };
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        file.flush().await?;
        drop(file);

        let declared_size = body.declared_size.unwrap_or(object.size);
        if written != declared_size {
            let _ = tokio::fs::remove_file(path).await;
            return Err(SyncError::CorruptDownload {
                key: object.key.clone(),
                reason: format!("size mismatch: wrote {}, declared {}", written, declared_size),
            });
        }

        let computed = format!("{:x}", hasher.finalize());
        if let Some(declared) = body.digest.as_deref().or(object.digest.as_deref()) {
            if computed != declared {
                let _ = tokio::fs::remove_file(path).await;
                return Err(SyncError::CorruptDownload {
                    key: object.key.clone(),
                    reason: format!("digest mismatch: computed {}, declared {}", computed, declared),
                });
            }
        }

        Ok(ManifestEntry {
            size: written,
            digest: Some(computed),
            modified_at: object.modified_at,
        })
    }

    async fn fetch_descriptor(&self) -> DescriptorState {
        match self.store.fetch(&self.config.playlist_key).await {
            Ok(mut body) => {
                let mut raw = Vec::new();
                match body.reader.read_to_end(&mut raw).await {
                    Ok(_) => DescriptorState::Fetched(raw),
                    Err(e) => {
                        warn!(error = %e, "Playlist descriptor download interrupted");
                        DescriptorState::Unreachable
                    }
                }
            }
            Err(BridgeError::NotFound(_)) => DescriptorState::Missing,
            Err(e) => {
                warn!(error = %e, "Playlist descriptor unreachable");
                DescriptorState::Unreachable
            }
        }
    }

    /// Publish a resolved sequence unless it is identical to the live one.
    /// Returns whether a new version went out.
    fn publish_playlist(&self, entries: Vec<PlaylistEntry>) -> bool {
        {
            let live = self.playlist_tx.borrow();
            if live.version > 0 && live.entries == entries {
                return false;
            }
        }

        let mut version = 0;
        let count = entries.len() as u64;
        self.playlist_tx.send_modify(|playlist| {
            playlist.version += 1;
            playlist.entries = entries;
            version = playlist.version;
        });
        self.events
            .emit(CoreEvent::Sync(SyncEvent::PlaylistPublished {
                version,
                entries: count,
            }))
            .ok();
        info!(version, entries = count, "Published playlist");
        true
    }
}

/// Keep only objects the agent can actually play: recognized media
/// extensions and safe bare filenames.
fn filter_playable(listing: Vec<RemoteObject>) -> Vec<RemoteObject> {
    listing
        .into_iter()
        .filter(|object| {
            let filename = object.filename();
            if filename.is_empty()
                || filename.contains('\\')
                || MediaKind::from_filename(filename).is_none()
            {
                debug!(key = %object.key, "Ignoring non-media object");
                return false;
            }
            true
        })
        .collect()
}
