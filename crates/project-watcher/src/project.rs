//! Project directory: one sub-directory of history per camera.

use std::path::{Path, PathBuf};

use crate::history::{HistoryStore, DEFAULT_JPEG_QUALITY, DESCRIPTOR_FILENAME};
use crate::types::{CameraDescriptor, WatchError, WatchResult};

/// A project directory holding the history of several cameras.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    jpeg_quality: u8,
}

impl Project {
    /// Open a project at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> WatchResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        })
    }

    /// JPEG quality for frames saved through stores handed out by this project.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// History directory for camera `name`.
    pub fn camera_dir(&self, name: &str) -> WatchResult<PathBuf> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains(['/', '\\'])
            || trimmed != name
        {
            return Err(WatchError::InvalidInput(format!("Invalid camera name: {name:?}")));
        }
        Ok(self.root.join(name))
    }

    pub fn history_store(&self, name: &str) -> WatchResult<HistoryStore> {
        Ok(HistoryStore::open(self.camera_dir(name)?)?.with_jpeg_quality(self.jpeg_quality))
    }

    /// History store of an existing camera, without creating anything.
    pub fn existing_history(&self, name: &str) -> WatchResult<HistoryStore> {
        let dir = self.camera_dir(name)?;
        if !dir.join(DESCRIPTOR_FILENAME).is_file() {
            return Err(WatchError::InvalidInput(format!("No camera named {name:?} in {}", self.root.display())));
        }
        Ok(HistoryStore::open(dir)?.with_jpeg_quality(self.jpeg_quality))
    }

    /// Cameras with a readable descriptor directly under the project root,
    /// sorted by name.
    pub fn discover(&self) -> WatchResult<Vec<CameraDescriptor>> {
        let mut cameras = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            if !path.join(DESCRIPTOR_FILENAME).is_file() {
                continue;
            }
            match HistoryStore::open(&path)?.load_descriptor()? {
                Some(descriptor) => cameras.push(descriptor),
                None => tracing::warn!("Skipping camera in {}: unreadable descriptor", path.display()),
            }
        }

        cameras.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cameras)
    }
}
