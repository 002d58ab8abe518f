//! # Playback Loop
//!
//! Continuously replays the published playlist against the current library
//! generation. The loop is fully decoupled from sync timing: its only
//! inputs are the playlist watch channel and the library snapshot, both
//! read through single atomic indirections.
//!
//! ## Behavior
//!
//! - Plays the sequence in order and wraps around indefinitely
//! - Picks up a newly published playlist only at entry boundaries, so a
//!   sync mid-video never interrupts the video
//! - A failing entry is logged and skipped for the remainder of the pass;
//!   the loop never terminates on a single bad entry
//! - A run of consecutive renderer failures asks the library to roll back
//!   to the backup generation, at most once per playlist version
//! - An empty playlist (or a pass with no playable entry) is the distinct
//!   blank-state condition: logged as an error, then the loop idles
//!   briefly instead of spinning

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::render::{MediaKind, MediaRenderer};
use core_library::LibraryStore;
use core_playlist::{Playlist, PlaylistEntry, DEFAULT_IMAGE_DURATION};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, PlaybackEvent};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the loop idles when nothing is playable before re-checking.
const IDLE_BACKOFF: Duration = Duration::from_secs(1);

/// Playback loop tuning.
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Consecutive renderer failures that trigger a library rollback.
    pub failure_rollback_threshold: u32,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            failure_rollback_threshold: 3,
        }
    }
}

/// What a pass over the sequence concluded.
enum PassEnd {
    /// Reached the end of the sequence; wrap around.
    Completed { successes: u32 },
    /// A new playlist version was published; restart at its first entry.
    Switched,
    /// Shutdown requested.
    Cancelled,
}

/// The continuous playback loop.
pub struct PlaybackLoop {
    renderer: Arc<dyn MediaRenderer>,
    library: Arc<LibraryStore>,
    playlist_rx: watch::Receiver<Playlist>,
    events: EventBus,
    options: PlaybackOptions,
    consecutive_failures: u32,
    rolled_back_for_version: Option<u64>,
    unplayable_reported: bool,
}

impl PlaybackLoop {
    pub fn new(
        renderer: Arc<dyn MediaRenderer>,
        library: Arc<LibraryStore>,
        playlist_rx: watch::Receiver<Playlist>,
        events: EventBus,
        options: PlaybackOptions,
    ) -> Self {
        Self {
            renderer,
            library,
            playlist_rx,
            events,
            options,
            consecutive_failures: 0,
            rolled_back_for_version: None,
            unplayable_reported: false,
        }
    }

    /// Run until cancelled. Never returns an error: every failure mode is
    /// recovered locally (skip, rollback, idle).
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Playback loop started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let playlist = self.playlist_rx.borrow_and_update().clone();
            if playlist.is_empty() {
                self.report_unplayable("no playlist published");
                if !self.idle(&cancel).await {
                    break;
                }
                continue;
            }

            debug!(version = playlist.version, entries = playlist.len(), "Starting pass");
            match self.run_pass(&playlist, &cancel).await {
                PassEnd::Cancelled => break,
                PassEnd::Switched => {
                    let version = self.playlist_rx.borrow().version;
                    info!(version, "Switching to newly published playlist");
                    // A fresh publication earns a fresh blank-state report
                    // if it too turns out unplayable.
                    self.unplayable_reported = false;
                    self.events
                        .emit(CoreEvent::Playback(PlaybackEvent::PlaylistSwitched {
                            version,
                        }))
                        .ok();
                }
                PassEnd::Completed { successes } => {
                    if successes == 0 {
                        self.report_unplayable("no entry in the sequence played");
                        if !self.idle(&cancel).await {
                            break;
                        }
                    } else {
                        self.events
                            .emit(CoreEvent::Playback(PlaybackEvent::SequenceRestarted {
                                version: playlist.version,
                            }))
                            .ok();
                    }
                }
            }
        }

        info!("Playback loop stopped");
    }

    /// Play one pass over the sequence.
    async fn run_pass(&mut self, playlist: &Playlist, cancel: &CancellationToken) -> PassEnd {
        let mut skipped: HashSet<String> = HashSet::new();
        let mut successes = 0u32;

        for entry in &playlist.entries {
            if cancel.is_cancelled() {
                return PassEnd::Cancelled;
            }
            if skipped.contains(&entry.filename) {
                debug!(filename = %entry.filename, "Skipping failed entry for this pass");
                continue;
            }

            match self.play_entry(entry, cancel).await {
                None => return PassEnd::Cancelled,
                Some(Ok(())) => {
                    successes += 1;
                    self.consecutive_failures = 0;
                    self.unplayable_reported = false;
                }
                Some(Err(message)) => {
                    warn!(filename = %entry.filename, error = %message, "Entry failed to play");
                    self.events
                        .emit(CoreEvent::Playback(PlaybackEvent::EntryFailed {
                            filename: entry.filename.clone(),
                            message,
                        }))
                        .ok();
                    skipped.insert(entry.filename.clone());
                    self.consecutive_failures += 1;
                    self.maybe_rollback(playlist.version);
                }
            }

            // Entry boundary: the only place a new playlist version takes
            // over, so a long video is never cut mid-file.
            if self.playlist_rx.has_changed().unwrap_or(false) {
                return PassEnd::Switched;
            }
        }

        PassEnd::Completed { successes }
    }

    /// Play a single entry. `None` means cancellation interrupted playback.
    async fn play_entry(
        &self,
        entry: &PlaylistEntry,
        cancel: &CancellationToken,
    ) -> Option<Result<(), String>> {
        let Some(snapshot) = self.library.snapshot() else {
            return Some(Err("no current generation".to_string()));
        };
        let path = snapshot.path_for(&entry.filename);

        self.events
            .emit(CoreEvent::Playback(PlaybackEvent::EntryStarted {
                filename: entry.filename.clone(),
                kind: entry.kind.to_string(),
            }))
            .ok();

        let render = async {
            match entry.kind {
                MediaKind::Video => self.renderer.play_video(&path).await,
                MediaKind::Image => {
                    let duration = entry.duration.unwrap_or(DEFAULT_IMAGE_DURATION);
                    self.renderer.show_image(&path, duration).await
                }
            }
        };

        tokio::select! {
            // Dropping the render future stops the underlying player.
            _ = cancel.cancelled() => None,
            result = render => Some(result.map_err(|e| e.to_string())),
        }
    }

    /// After enough consecutive failures, swap back to the backup
    /// generation. At most one rollback per playlist version, so a broken
    /// backup cannot cause a swap storm.
    fn maybe_rollback(&mut self, playlist_version: u64) {
        if self.consecutive_failures < self.options.failure_rollback_threshold {
            return;
        }
        if self.rolled_back_for_version == Some(playlist_version) {
            return;
        }
        self.rolled_back_for_version = Some(playlist_version);
        self.consecutive_failures = 0;

        let from = self.library.snapshot().map(|s| s.generation);
        warn!(
            threshold = self.options.failure_rollback_threshold,
            "Repeated playback failures; rolling back to backup generation"
        );
        match self.library.rollback() {
            Ok(Some(snapshot)) => {
                self.events
                    .emit(CoreEvent::Library(LibraryEvent::RolledBack {
                        from: from.map(|g| g.to_string()).unwrap_or_default(),
                        to: snapshot.generation.to_string(),
                    }))
                    .ok();
            }
            Ok(None) => debug!("No backup generation to roll back to"),
            Err(e) => error!(error = %e, "Rollback failed"),
        }
    }

    /// The distinct blank-screen condition, reported once per streak so a
    /// long outage does not flood the log.
    fn report_unplayable(&mut self, reason: &str) {
        if self.unplayable_reported {
            debug!(reason, "Still unplayable");
            return;
        }
        self.unplayable_reported = true;
        error!(reason, "Library unplayable; device is blank");
        self.events
            .emit(CoreEvent::Playback(PlaybackEvent::LibraryUnplayable))
            .ok();
    }

    /// Idle until the playlist changes or the backoff elapses.
    /// Returns `false` on cancellation.
    async fn idle(&mut self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.playlist_rx.changed() => true,
            _ = tokio::time::sleep(IDLE_BACKOFF) => true,
        }
    }
}
