//! # Library Management Module
//!
//! Owns the on-disk media library and its atomicity guarantees.
//!
//! ## Overview
//!
//! This module manages:
//! - Per-generation manifests (filename → size/digest)
//! - The two-generation ring (current + backup) under the library root
//! - Atomic promotion via a single pointer-file rename
//! - Single-step rollback to the backup generation
//!
//! The sync engine stages and promotes generations; the playback loop only
//! ever reads [`LibrarySnapshot`](store::LibrarySnapshot) values, so it can
//! never observe a half-updated library.

pub mod error;
pub mod generation;
pub mod manifest;
pub mod store;

pub use error::{LibraryError, Result};
pub use generation::GenerationId;
pub use manifest::{digest_file, Manifest, ManifestEntry};
pub use store::{LibrarySnapshot, LibraryStore, StagedGeneration};
