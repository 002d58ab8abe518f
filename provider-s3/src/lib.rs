//! # S3-Compatible Store Provider
//!
//! Implements the `ObjectStore` trait for S3-compatible object stores.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated listing via ListObjectsV2 (XML)
//! - Streaming object downloads with declared size/digest
//! - Listing hygiene (directory markers and empty objects dropped)
//! - Static bearer-token authentication

pub mod connector;
pub mod error;
pub mod types;

pub use connector::S3Connector;
pub use error::{Result, S3Error};
