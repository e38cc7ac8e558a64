//! Folder replay device: serves the images of a directory as camera frames.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::DynamicImage;

use project_watcher::{CaptureDevice, DeviceOpener, Resolution, WatchError, WatchResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

/// Opens [`FolderDevice`]s over one directory.
#[derive(Debug, Clone)]
pub struct FolderOpener {
    folder: PathBuf,
    period: Duration,
    looping: bool,
}

impl FolderOpener {
    pub fn new(folder: impl Into<PathBuf>, fps: f64, looping: bool) -> WatchResult<Self> {
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(WatchError::InvalidInput(format!("fps must be positive, got {fps}")));
        }
        let period = Duration::try_from_secs_f64(1.0 / fps)
            .map_err(|e| WatchError::InvalidInput(format!("fps {fps} is out of range: {e}")))?;
        Ok(Self {
            folder: folder.into(),
            period,
            looping,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

impl DeviceOpener for FolderOpener {
    fn open(&self, _resolution: Resolution) -> WatchResult<Box<dyn CaptureDevice>> {
        let files = image_files(&self.folder)?;
        if files.is_empty() {
            return Err(WatchError::Capture(format!(
                "no images in {}",
                self.folder.display()
            )));
        }
        tracing::debug!("Replaying {} images from {}", files.len(), self.folder.display());
        Ok(Box::new(FolderDevice {
            files,
            next: 0,
            period: self.period,
            last_read: None,
            looping: self.looping,
        }))
    }

    fn moniker(&self) -> String {
        format!("folder:{}", self.folder.display())
    }
}

/// Image files directly in `folder`, sorted by file name.
pub fn image_files(folder: &Path) -> WatchResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Replays image files at a fixed rate.
pub struct FolderDevice {
    files: Vec<PathBuf>,
    next: usize,
    period: Duration,
    last_read: Option<Instant>,
    looping: bool,
}

impl CaptureDevice for FolderDevice {
    fn read_frame(&mut self) -> WatchResult<DynamicImage> {
        if self.next >= self.files.len() {
            if !self.looping {
                return Err(WatchError::Capture("end of replay".into()));
            }
            self.next = 0;
        }

        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < self.period {
                std::thread::sleep(self.period - elapsed);
            }
        }
        self.last_read = Some(Instant::now());

        let path = &self.files[self.next];
        self.next += 1;
        image::open(path).map_err(|e| WatchError::Capture(format!("{}: {e}", path.display())))
    }
}
