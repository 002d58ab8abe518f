//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host
//! environment the agent runs on.
//!
//! ## Overview
//!
//! This crate defines the contract between the core crates and the outside
//! world. The sync engine and playback loop are written entirely against
//! these traits; everything that touches the network or a display lives in
//! an implementation crate.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`ObjectStore`](store::ObjectStore) - Remote listing and streaming downloads
//! - [`MediaRenderer`](render::MediaRenderer) - Fullscreen video/image playback
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). The
//! `Unavailable`/`NotFound` variants carry the transport taxonomy the sync
//! engine's recovery rules are written against: `Unavailable` defers the
//! cycle, `NotFound` skips the entry.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod http;
pub mod render;
pub mod store;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use render::{MediaKind, MediaRenderer};
pub use store::{ObjectBody, ObjectStore, RemoteObject};
