//! Capture backend abstraction and the default video-node implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::CaptureError;

/// A camera visible to the host.
#[derive(Debug, Clone, Serialize)]
pub struct CameraInfo {
    pub index: u32,
    pub path: String,
}

/// An open capture stream. Exactly one handle exists per device index at a
/// time; the registry enforces that.
pub trait CaptureHandle: Send + Sync + std::fmt::Debug {
    fn path(&self) -> &str;

    /// Release the device. Consumes the handle so a released stream cannot
    /// be used again.
    fn close(self: Box<Self>) -> Result<(), CaptureError>;
}

/// How capture devices are opened and enumerated. The registry only ever
/// talks to this trait, so tests substitute an in-memory backend.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn open(&self, index: u32) -> Result<Box<dyn CaptureHandle>, CaptureError>;

    /// Enumerate cameras currently present on the host.
    async fn probe(&self) -> Vec<CameraInfo>;
}

/// Backend over `/dev/video*` nodes. Opening verifies the node exists and is
/// readable; the browser consumes the actual frames through its own capture
/// pipeline, so the broker side only needs exclusive on/off bookkeeping.
pub struct VideoNodeBackend {
    root: PathBuf,
}

impl VideoNodeBackend {
    pub fn new() -> Self {
        Self::with_root("/dev")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn node(&self, index: u32) -> PathBuf {
        self.root.join(format!("video{index}"))
    }
}

impl Default for VideoNodeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct VideoNodeHandle {
    index: u32,
    path: String,
    // Held open for the lifetime of the stream.
    file: Option<std::fs::File>,
}

impl CaptureHandle for VideoNodeHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn close(mut self: Box<Self>) -> Result<(), CaptureError> {
        debug!(index = self.index, path = %self.path, "closing capture device");
        self.file.take();
        Ok(())
    }
}

#[async_trait]
impl CaptureBackend for VideoNodeBackend {
    async fn open(&self, index: u32) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let node = self.node(index);
        if !node.exists() {
            return Err(CaptureError::Unavailable {
                index,
                reason: format!("{} does not exist", node.display()),
            });
        }
        let file = std::fs::File::open(&node)
            .map_err(|source| CaptureError::Open { index, source })?;
        debug!(index, path = %node.display(), "opened capture device");
        Ok(Box::new(VideoNodeHandle {
            index,
            path: node.display().to_string(),
            file: Some(file),
        }))
    }

    async fn probe(&self) -> Vec<CameraInfo> {
        let mut found = Vec::new();
        let pattern = self.root.join("video*");
        if let Ok(paths) = glob::glob(&pattern.to_string_lossy()) {
            for path in paths.flatten() {
                if let Some(index) = video_index(&path) {
                    found.push(CameraInfo {
                        index,
                        path: path.display().to_string(),
                    });
                }
            }
        }
        found.sort_by_key(|c| c.index);
        found
    }
}

fn video_index(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("video")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_index_parses_node_names() {
        assert_eq!(video_index(Path::new("/dev/video0")), Some(0));
        assert_eq!(video_index(Path::new("/dev/video12")), Some(12));
        assert_eq!(video_index(Path::new("/dev/videoX")), None);
        assert_eq!(video_index(Path::new("/dev/ttyUSB0")), None);
    }

    #[tokio::test]
    async fn probe_lists_nodes_sorted_by_index() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["video2", "video0", "other"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let backend = VideoNodeBackend::with_root(dir.path());
        let cameras = backend.probe().await;
        let indexes: Vec<u32> = cameras.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![0, 2]);
    }

    #[tokio::test]
    async fn open_missing_node_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = VideoNodeBackend::with_root(dir.path());
        let err = backend.open(7).await.unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable { index: 7, .. }));
    }

    #[tokio::test]
    async fn open_existing_node_yields_a_handle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video3"), b"").unwrap();
        let backend = VideoNodeBackend::with_root(dir.path());
        let handle = backend.open(3).await.unwrap();
        assert!(handle.path().ends_with("video3"));
        handle.close().unwrap();
    }
}
