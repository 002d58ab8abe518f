//! Media Renderer Abstraction
//!
//! The playback loop drives a renderer through this trait; the concrete
//! implementation (an external player process on devices) lives in a bridge
//! crate. The renderer owns nothing between calls: each call plays exactly
//! one entry and returns when it is done.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Video container extensions the agent recognizes.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov"];

/// Image extensions the agent recognizes.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// What kind of media a playlist entry refers to, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Classify a filename by extension. Returns `None` for anything the
    /// agent does not know how to play.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Media renderer trait
///
/// Both operations resolve when the entry is finished; dropping the returned
/// future must stop the underlying player so cancellation (shutdown, playlist
/// switch) cannot leak a fullscreen process.
#[async_trait]
pub trait MediaRenderer: Send + Sync {
    /// Play a video file to its natural end.
    async fn play_video(&self, path: &Path) -> Result<()>;

    /// Display an image for `duration`, then stop.
    async fn show_image(&self, path: &Path, duration: Duration) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_filename() {
        assert_eq!(MediaKind::from_filename("a.mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_filename("a.MOV"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_filename("b.png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_filename("b.JPEG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_filename("notes.txt"), None);
        assert_eq!(MediaKind::from_filename("no_extension"), None);
    }
}
