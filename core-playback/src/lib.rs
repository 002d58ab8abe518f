//! # Playback Module
//!
//! Drives the media renderer from the published playlist.
//!
//! ## Overview
//!
//! This module handles:
//! - Continuous wrap-around replay of the active sequence
//! - Entry-boundary switching when a new playlist version is published
//! - Per-pass skipping of failing entries
//! - Rollback escalation after repeated renderer failures

pub mod player;

pub use player::{PlaybackLoop, PlaybackOptions};
