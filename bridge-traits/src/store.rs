//! Remote Object Store Abstraction
//!
//! The sync engine sees the remote side only through [`ObjectStore`]:
//! list keys under a device prefix, open objects for download. Provider
//! crates implement this against concrete backends.

use async_trait::async_trait;

use crate::error::Result;

/// Immutable snapshot of one remote object, produced by a listing.
///
/// A listing is a point-in-time view; objects may vanish between `list`
/// and `fetch`, which surfaces as [`BridgeError::NotFound`](crate::BridgeError::NotFound).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full object key, including the device prefix.
    pub key: String,
    /// Object size in bytes as declared by the store.
    pub size: u64,
    /// Content digest (SHA-256, lowercase hex) when the store declares one.
    pub digest: Option<String>,
    /// Last-modified time as a Unix timestamp, when known.
    pub modified_at: Option<i64>,
}

impl RemoteObject {
    /// The final path segment of the key.
    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// An open download: declared metadata plus the byte stream.
///
/// `declared_size` and `digest` come from the store's response headers and
/// are what downloaded bytes are verified against.
pub struct ObjectBody {
    pub declared_size: Option<u64>,
    pub digest: Option<String>,
    pub reader: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("declared_size", &self.declared_size)
            .field("digest", &self.digest)
            .field("reader", &"<dyn AsyncRead>")
            .finish()
    }
}

/// Remote object store trait
///
/// # Errors
///
/// * `Unavailable`: network or auth failure; callers defer and retry later.
/// * `NotFound`: the key disappeared between list and fetch; callers skip
///   the entry and continue the cycle.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all objects under `prefix`.
    ///
    /// Implementations handle pagination internally and return the complete
    /// listing. Directory markers and zero-byte objects are excluded.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>>;

    /// Open `key` for streaming download.
    async fn fetch(&self, key: &str) -> Result<ObjectBody>;
}
