//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for the device runtime
//! (Linux field units, desktop development machines).
//!
//! ## Overview
//!
//! This crate provides production implementations of the bridge traits:
//! - `HttpClient` using `reqwest`
//! - `MediaRenderer` using a VLC child process
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, VlcRenderer};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let renderer = VlcRenderer::new();
//! ```

mod http;
mod renderer;

pub use http::ReqwestHttpClient;
pub use renderer::VlcRenderer;
