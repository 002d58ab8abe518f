//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the sync agent:
//! - Configuration loading and validation
//! - Logging and tracing infrastructure
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other core crates depend
//! on. It establishes the logging conventions and event broadcasting
//! mechanisms used throughout the agent; it holds no sync or playback
//! logic of its own.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::AgentConfig;
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, LibraryEvent, PlaybackEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
