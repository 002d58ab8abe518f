//! Media Renderer Implementation using VLC
//!
//! Drives a `cvlc` child process per entry: videos run to their natural
//! end with `--play-and-exit`, images are displayed for the requested
//! duration and then the player is stopped. Children are spawned with
//! `kill_on_drop`, so cancelling playback (shutdown, playlist switch)
//! can never leak a fullscreen process.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::render::MediaRenderer;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default player binary (VLC without the GUI shell).
const DEFAULT_PLAYER: &str = "cvlc";

/// VLC-based fullscreen renderer.
pub struct VlcRenderer {
    binary: String,
}

impl VlcRenderer {
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_PLAYER.to_string(),
        }
    }

    /// Use a different player binary (mainly for tests and bench rigs).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn base_command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--fullscreen")
            .arg("--no-osd")
            .arg("--no-audio")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, e: std::io::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("failed to launch {}: {}", self.binary, e))
    }
}

impl Default for VlcRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaRenderer for VlcRenderer {
    async fn play_video(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "Starting video playback");
        let mut child = self
            .base_command()
            .arg("--play-and-exit")
            .arg(path)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let status = child.wait().await?;
        if !status.success() {
            return Err(BridgeError::OperationFailed(format!(
                "player exited with {} for {}",
                status,
                path.display()
            )));
        }
        Ok(())
    }

    async fn show_image(&self, path: &Path, duration: Duration) -> Result<()> {
        debug!(path = %path.display(), ?duration, "Displaying image");
        let mut child = self
            .base_command()
            .arg(path)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        tokio::select! {
            // Without a duration flag VLC keeps the image up indefinitely;
            // an early exit means it could not display the file.
            status = child.wait() => {
                let status = status?;
                Err(BridgeError::OperationFailed(format!(
                    "player exited early ({}) for {}",
                    status,
                    path.display()
                )))
            }
            _ = tokio::time::sleep(duration) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to stop image display");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_video_succeeds_when_player_exits_cleanly() {
        // `true` ignores the VLC flags and exits 0, standing in for a
        // video playing to its natural end.
        let renderer = VlcRenderer::with_binary("true");
        assert!(renderer.play_video(Path::new("/tmp/clip.mp4")).await.is_ok());
    }

    #[tokio::test]
    async fn test_video_failure_is_reported() {
        let renderer = VlcRenderer::with_binary("false");
        let err = renderer
            .play_video(Path::new("/tmp/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_player_binary_is_reported() {
        let renderer = VlcRenderer::with_binary("/nonexistent/player-binary");
        let err = renderer
            .play_video(Path::new("/tmp/clip.mp4"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }

    #[tokio::test]
    async fn test_image_early_exit_is_a_failure() {
        // A player that exits immediately never displayed the image for
        // its duration.
        let renderer = VlcRenderer::with_binary("true");
        let err = renderer
            .show_image(Path::new("/tmp/slide.png"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_image_runs_for_duration_then_stops() {
        use std::os::unix::fs::PermissionsExt;

        // Stand-in player that ignores its arguments and blocks until
        // killed, like VLC holding an image on screen.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-player");
        std::fs::write(&script, "#!/bin/sh\nsleep 100\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let renderer = VlcRenderer::with_binary(script.to_string_lossy().into_owned());
        let started = std::time::Instant::now();
        renderer
            .show_image(Path::new("/tmp/slide.png"), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
