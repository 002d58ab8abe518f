//! # Content Synchronization Module
//!
//! Keeps the local library and playlist in step with the remote store.
//!
//! ## Overview
//!
//! This module manages the poll → diff → fetch → verify → promote →
//! republish pipeline:
//! - Listing remote media through the `ObjectStore` bridge
//! - Diffing listings against the current generation's manifest
//! - Verified downloads into a staged generation, with bounded retries
//! - Atomic promotion through the library store, gated on playlist
//!   resolvability
//! - Publishing the active playlist and sync state through watch channels
//!
//! ## Components
//!
//! - **Sync Engine** (`engine`): runs one cycle end to end
//! - **Diff** (`diff`): decides fetch/carry/retire per remote entry
//! - **Cycle Runner** (`runner`): fixed-interval scheduling plus the
//!   coalesced manual trigger
//! - **Sync State** (`state`): the atomically published process state

pub mod diff;
pub mod engine;
pub mod error;
pub mod runner;
pub mod state;

pub use diff::{diff_manifest, DiffOutcome};
pub use engine::{CycleResult, EngineConfig, SyncEngine};
pub use error::{Result, SyncError};
pub use runner::{CycleRunner, UpdateTrigger};
pub use state::SyncState;
