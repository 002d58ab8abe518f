//! # Playlist Module
//!
//! Parses the externally authored playlist descriptor and resolves it into
//! a validated, totally ordered sequence against the current generation's
//! manifest.
//!
//! ## Overview
//!
//! - `descriptor`: the raw `playlist.json` wire format
//! - `resolver`: validation rules (unique order, duration semantics,
//!   presence in the manifest) and the manifest-order fallback

pub mod descriptor;
pub mod error;
pub mod resolver;

pub use descriptor::RawEntry;
pub use error::{PlaylistError, Result};
pub use resolver::{resolve, Playlist, PlaylistEntry, DEFAULT_IMAGE_DURATION};
