//! # Event Bus System
//!
//! Decoupled communication between the agent's loops using
//! `tokio::sync::broadcast`. The sync engine, library store, and playback
//! loop emit typed events; subscribers (status reporting, tests) listen
//! without coupling to the emitters.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::CycleStarted {
//!         trigger: "interval".to_string(),
//!     }))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` produces two receiver errors:
//!
//! - `RecvError::Lagged(n)`: the subscriber missed `n` events; non-fatal,
//!   keep receiving.
//! - `RecvError::Closed`: all senders dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns an error that emitters ignore
//! (`.ok()`): events are advisory, never load-bearing.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync cycle events
    Sync(SyncEvent),
    /// Library generation events
    Library(LibraryEvent),
    /// Playback loop events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::CycleFailed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::LibraryUnplayable) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::EntryFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::EntrySkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Library(LibraryEvent::RolledBack { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::CycleCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::GenerationPromoted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// Events emitted by the sync engine around each cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A cycle began.
    CycleStarted {
        /// What started it: "interval" or "manual".
        trigger: String,
    },
    /// A cycle finished.
    CycleCompleted {
        /// Whether the library or playlist changed.
        changed: bool,
        /// Entries downloaded this cycle.
        fetched: u64,
        /// Entries carried over unchanged from the previous generation.
        carried: u64,
        /// Entries present locally but retired from the new generation.
        retired: u64,
        /// Cycle duration in milliseconds.
        duration_ms: u64,
    },
    /// A cycle could not complete.
    CycleFailed {
        /// Human-readable error message.
        message: String,
        /// Whether the next scheduled cycle can be expected to recover.
        recoverable: bool,
    },
    /// One entry was skipped without aborting the cycle.
    EntrySkipped {
        /// Remote key of the skipped entry.
        key: String,
        /// Why it was skipped (vanished, corrupt after retries, ...).
        reason: String,
    },
    /// A new playlist version was published.
    PlaylistPublished {
        /// Monotonic playlist version.
        version: u64,
        /// Number of resolved entries.
        entries: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::CycleStarted { .. } => "Sync cycle started",
            SyncEvent::CycleCompleted { .. } => "Sync cycle completed",
            SyncEvent::CycleFailed { .. } => "Sync cycle failed",
            SyncEvent::EntrySkipped { .. } => "Entry skipped",
            SyncEvent::PlaylistPublished { .. } => "Playlist published",
        }
    }
}

/// Events emitted by the library store around generation changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A staged generation became current.
    GenerationPromoted {
        /// The new current generation id.
        generation: String,
        /// Number of files in the generation.
        files: u64,
    },
    /// A staged generation was discarded without promotion.
    GenerationDiscarded {
        /// The discarded generation id.
        generation: String,
        /// Why it was discarded.
        reason: String,
    },
    /// Current and backup generations swapped.
    RolledBack {
        /// Generation that was current before the swap.
        from: String,
        /// Generation that is current after the swap.
        to: String,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::GenerationPromoted { .. } => "Generation promoted",
            LibraryEvent::GenerationDiscarded { .. } => "Generation discarded",
            LibraryEvent::RolledBack { .. } => "Library rolled back",
        }
    }
}

/// Events emitted by the playback loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// An entry began playing.
    EntryStarted {
        /// Filename within the current generation.
        filename: String,
        /// "video" or "image".
        kind: String,
    },
    /// An entry failed to play and will be skipped for this pass.
    EntryFailed {
        /// Filename within the current generation.
        filename: String,
        /// Renderer error message.
        message: String,
    },
    /// The loop picked up a newly published playlist version.
    PlaylistSwitched {
        /// The version now playing.
        version: u64,
    },
    /// The sequence wrapped around to its first entry.
    SequenceRestarted {
        /// The playlist version being replayed.
        version: u64,
    },
    /// Nothing is playable: playlist empty and no entry succeeded.
    ///
    /// Logged distinctly from transient errors; this is the blank-screen
    /// condition an operator must act on.
    LibraryUnplayable,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::EntryStarted { .. } => "Entry started",
            PlaybackEvent::EntryFailed { .. } => "Entry failed",
            PlaybackEvent::PlaylistSwitched { .. } => "Playlist switched",
            PlaybackEvent::SequenceRestarted { .. } => "Sequence restarted",
            PlaybackEvent::LibraryUnplayable => "Library unplayable",
        }
    }
}

/// Central broadcast channel for publishing events.
///
/// Fully thread-safe; share across tasks with `Arc` or by cloning.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events, it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of currently active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
