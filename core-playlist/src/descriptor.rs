//! The remote playlist descriptor.
//!
//! Authored externally and fetched as `<prefix>/playlist.json`: an ordered
//! array of `{filename, order, duration}` objects. Treated as untrusted
//! input; everything here is validated again during resolution.

use serde::Deserialize;

use crate::error::{PlaylistError, Result};

/// One raw descriptor entry, exactly as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    /// Bare media filename (no path).
    pub filename: String,
    /// Position in the sequence. Must be unique; later duplicates lose.
    pub order: i64,
    /// Display seconds. Required semantics differ by media kind: images
    /// default when absent, videos ignore it.
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Parse raw descriptor bytes.
pub fn parse_descriptor(raw: &[u8]) -> Result<Vec<RawEntry>> {
    serde_json::from_slice(raw).map_err(|e| PlaylistError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let raw = br#"[
            {"filename": "intro.mp4", "order": 1, "duration": null},
            {"filename": "promo.png", "order": 2, "duration": 15}
        ]"#;

        let entries = parse_descriptor(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filename, "intro.mp4");
        assert_eq!(entries[0].duration, None);
        assert_eq!(entries[1].duration, Some(15));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_descriptor(b"{\"filename\": \"a.mp4\"}").is_err());
        assert!(parse_descriptor(b"not json at all").is_err());
    }
}
