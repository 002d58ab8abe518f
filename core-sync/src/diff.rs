//! Remote/local diffing.
//!
//! Decides, per remote entry, whether the local library already holds the
//! same content (carry it into the next generation) or it must be fetched.
//! Comparison is by digest when both sides declare one, falling back to
//! size + last-modified when either side lacks it.

use bridge_traits::store::RemoteObject;
use core_library::{Manifest, ManifestEntry};

/// Result of diffing a remote listing against the current manifest.
#[derive(Debug, Default)]
pub struct DiffOutcome {
    /// Remote entries absent or mismatched locally.
    pub to_fetch: Vec<RemoteObject>,
    /// Unchanged files to carry over: filename plus the manifest entry to
    /// reuse.
    pub carry: Vec<(String, ManifestEntry)>,
    /// Local filenames absent remotely; excluded from the next generation.
    pub retired: Vec<String>,
}

impl DiffOutcome {
    /// True when the next generation would be identical to the current one.
    pub fn is_unchanged(&self) -> bool {
        self.to_fetch.is_empty() && self.retired.is_empty()
    }
}

/// Diff a remote listing against the current generation's manifest.
pub fn diff_manifest(remote: &[RemoteObject], local: Option<&Manifest>) -> DiffOutcome {
    let mut outcome = DiffOutcome::default();

    for object in remote {
        let filename = object.filename();
        match local.and_then(|m| m.get(filename)) {
            Some(entry) if matches(object, entry) => {
                outcome.carry.push((filename.to_string(), entry.clone()));
            }
            _ => outcome.to_fetch.push(object.clone()),
        }
    }

    if let Some(local) = local {
        let remote_names: std::collections::HashSet<&str> =
            remote.iter().map(|o| o.filename()).collect();
        outcome.retired = local
            .filenames()
            .filter(|name| !remote_names.contains(name))
            .map(str::to_string)
            .collect();
    }

    outcome
}

fn matches(object: &RemoteObject, entry: &ManifestEntry) -> bool {
    match (&object.digest, &entry.digest) {
        (Some(remote), Some(local)) => remote == local,
        _ => entry.size == object.size && entry.modified_at == object.modified_at,
    }
}
