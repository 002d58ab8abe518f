//! # Playlist Resolution
//!
//! Turns a raw descriptor plus the current generation's manifest into a
//! validated, totally ordered playlist. Resolution never fails outright:
//! individual bad entries are dropped with a warning, and a missing or
//! malformed descriptor falls back to a manifest-order playlist so playback
//! never halts purely because the playlist metadata is missing.

use std::collections::HashSet;
use std::time::Duration;

use bridge_traits::render::MediaKind;
use core_library::Manifest;
use tracing::{debug, warn};

use crate::descriptor::{parse_descriptor, RawEntry};

/// Display time applied to image entries that do not declare one.
pub const DEFAULT_IMAGE_DURATION: Duration = Duration::from_secs(10);

/// One playable item of the resolved sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Filename within the current generation.
    pub filename: String,
    /// Unique ascending position.
    pub order: i64,
    /// Display time. Always `Some` for images, always `None` for videos
    /// (video length is intrinsic to the file).
    pub duration: Option<Duration>,
    /// Media kind derived from the extension.
    pub kind: MediaKind,
}

/// A validated, ordered sequence ready for the playback loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Playlist {
    /// Monotonic version assigned at publication.
    pub version: u64,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new(version: u64, entries: Vec<PlaylistEntry>) -> Self {
        Self { version, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve a descriptor against the current generation's manifest.
///
/// `descriptor` is the raw fetched bytes, or `None` when the remote has no
/// playlist. Returns the validated entries; empty means nothing resolved
/// (the caller decides whether to publish that).
pub fn resolve(descriptor: Option<&[u8]>, manifest: &Manifest) -> Vec<PlaylistEntry> {
    let raw_entries = match descriptor {
        Some(raw) => match parse_descriptor(raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Playlist descriptor unusable; falling back to manifest order");
                return fallback(manifest);
            }
        },
        None => {
            debug!("No playlist descriptor; falling back to manifest order");
            return fallback(manifest);
        }
    };

    let mut seen_orders: HashSet<i64> = HashSet::new();
    let mut entries: Vec<PlaylistEntry> = Vec::with_capacity(raw_entries.len());

    for raw in raw_entries {
        let Some(entry) = validate_entry(raw, manifest, &mut seen_orders) else {
            continue;
        };
        entries.push(entry);
    }

    entries.sort_by_key(|e| e.order);
    entries
}

/// Validate one raw entry. Returns `None` (with a log) when it must be
/// dropped; dropping is per-entry, never fatal to the playlist.
fn validate_entry(
    raw: RawEntry,
    manifest: &Manifest,
    seen_orders: &mut HashSet<i64>,
) -> Option<PlaylistEntry> {
    let Some(kind) = MediaKind::from_filename(&raw.filename) else {
        warn!(filename = %raw.filename, "Dropping playlist entry with unsupported media type");
        return None;
    };

    if !manifest.contains(&raw.filename) {
        warn!(
            filename = %raw.filename,
            "Dropping playlist entry: file not present in current generation"
        );
        return None;
    }

    // First occurrence of an order wins; later duplicates are dropped to
    // keep the sequence totally ordered.
    if !seen_orders.insert(raw.order) {
        warn!(
            filename = %raw.filename,
            order = raw.order,
            "Dropping playlist entry with duplicate order"
        );
        return None;
    }

    let duration = match kind {
        MediaKind::Image => {
            let secs = match raw.duration {
                Some(secs) if secs > 0 => secs,
                Some(_) => {
                    warn!(
                        filename = %raw.filename,
                        "Image duration must be positive; applying default"
                    );
                    DEFAULT_IMAGE_DURATION.as_secs()
                }
                None => DEFAULT_IMAGE_DURATION.as_secs(),
            };
            Some(Duration::from_secs(secs))
        }
        MediaKind::Video => {
            if raw.duration.is_some() {
                debug!(
                    filename = %raw.filename,
                    "Ignoring duration on video entry; playback length is intrinsic"
                );
            }
            None
        }
    };

    Some(PlaylistEntry {
        filename: raw.filename,
        order: raw.order,
        duration,
        kind,
    })
}

/// Manifest-order playlist of every playable file, alphabetical.
fn fallback(manifest: &Manifest) -> Vec<PlaylistEntry> {
    manifest
        .filenames()
        .filter_map(|filename| {
            let kind = MediaKind::from_filename(filename)?;
            Some((filename.to_string(), kind))
        })
        .enumerate()
        .map(|(index, (filename, kind))| PlaylistEntry {
            filename,
            order: index as i64,
            duration: match kind {
                MediaKind::Image => Some(DEFAULT_IMAGE_DURATION),
                MediaKind::Video => None,
            },
            kind,
        })
        .collect()
}
