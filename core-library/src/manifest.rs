//! Per-generation manifests.
//!
//! A manifest records exactly which files a generation holds, with the size
//! and digest each file was verified against when it entered the library.
//! The manifest file lives inside its generation directory and is written
//! before the generation is ever reachable through the pointer file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::error::{LibraryError, Result};
use crate::generation::GenerationId;

/// File name of the manifest inside a generation directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What the library knows about one file in a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Size in bytes at verification time.
    pub size: u64,
    /// SHA-256 hex digest, when one was declared or computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Remote last-modified timestamp the file was fetched at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
}

/// Mapping from relative filename to verified file metadata for one
/// generation.
///
/// Entries are kept in a `BTreeMap` so iteration (and the fallback playlist
/// built from it) is alphabetical by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// The generation this manifest describes.
    pub generation: GenerationId,
    /// Filename to entry mapping.
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new(generation: GenerationId) -> Self {
        Self {
            generation,
            entries: BTreeMap::new(),
        }
    }

    /// Load a manifest from a generation directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read(&path)?;
        serde_json::from_slice(&raw)
            .map_err(|e| LibraryError::Manifest(format!("{}: {}", path.display(), e)))
    }

    /// Write the manifest into its generation directory.
    ///
    /// Written to a temporary name then renamed, so a crash never leaves a
    /// half-written manifest where a reader expects a complete one.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let raw = serde_json::to_vec_pretty(self)
            .map_err(|e| LibraryError::Manifest(e.to_string()))?;
        let tmp = dir.join(format!("{}.tmp", MANIFEST_FILE));
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, dir.join(MANIFEST_FILE))?;
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    pub fn insert(&mut self, filename: String, entry: ManifestEntry) {
        self.entries.insert(filename, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filenames in alphabetical order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Compute the SHA-256 hex digest of a file on disk.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Manifest {
        let mut manifest = Manifest::new(GenerationId::new());
        manifest.insert(
            "b.mp4".to_string(),
            ManifestEntry {
                size: 2048,
                digest: Some("beef".to_string()),
                modified_at: Some(1_700_000_000),
            },
        );
        manifest.insert(
            "a.png".to_string(),
            ManifestEntry {
                size: 512,
                digest: None,
                modified_at: None,
            },
        );
        manifest
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest();

        manifest.save(dir.path()).unwrap();
        let loaded = Manifest::load(dir.path()).unwrap();

        assert_eq!(loaded, manifest);
        // No stray temp file left behind.
        assert!(!dir.path().join(format!("{}.tmp", MANIFEST_FILE)).exists());
    }

    #[test]
    fn test_filenames_are_alphabetical() {
        let manifest = sample_manifest();
        let names: Vec<&str> = manifest.filenames().collect();
        assert_eq!(names, vec!["a.png", "b.mp4"]);
    }

    #[test]
    fn test_load_rejects_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), b"not json").unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(LibraryError::Manifest(_))
        ));
    }

    #[test]
    fn test_digest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"hello").unwrap();

        // SHA-256 of "hello".
        assert_eq!(
            digest_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
