//! Filesystem-backed history of timestamp-named frames plus the camera
//! descriptor file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::types::{CameraDescriptor, WatchError, WatchResult};

/// Descriptor filename inside each camera directory.
pub const DESCRIPTOR_FILENAME: &str = "camera_data.json";

/// Timestamp layout of history filenames (without extension).
const ENTRY_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Extension used for saved frames.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// JPEG quality for saved frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Filename for a frame captured at `t`, e.g. `20240315_142501.jpg`.
pub fn entry_filename(t: NaiveDateTime, extension: &str) -> String {
    format!("{}.{extension}", t.format(ENTRY_TIME_FORMAT))
}

/// Parse a history filename back into its timestamp. Anything that is not
/// exactly `YYYYMMDD_HHMMSS.<extension>` yields `None`.
pub fn parse_entry_filename(name: &str, extension: &str) -> Option<NaiveDateTime> {
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    let well_formed = stem.len() == 15
        && stem.bytes().enumerate().all(|(i, b)| match i {
            8 => b == b'_',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return None;
    }
    NaiveDateTime::parse_from_str(stem, ENTRY_TIME_FORMAT).ok()
}

/// History directory of one camera.
///
/// Holds no state beyond the directory path; every query re-scans the disk.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
    extension: String,
    jpeg_quality: u8,
}

impl HistoryStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> WatchResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            extension: DEFAULT_EXTENSION.to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        })
    }

    /// Set the JPEG quality used by [`HistoryStore::save_frame`].
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn filename_for(&self, t: NaiveDateTime) -> String {
        entry_filename(t, &self.extension)
    }

    /// Timestamps of all history entries, in directory order.
    pub fn list_entries(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!("Cannot scan history {}: {e}", self.dir.display());
                None
            }
        };

        entries
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .filter_map(move |entry| {
                let name = entry.file_name();
                parse_entry_filename(name.to_str()?, &self.extension)
            })
    }

    /// All entries, newest first.
    pub fn latest_entries(&self) -> Vec<NaiveDateTime> {
        let mut entries: Vec<_> = self.list_entries().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }

    /// Write `image` as the entry for `t` and return its filename.
    pub fn save_frame(&self, image: &DynamicImage, t: NaiveDateTime) -> WatchResult<String> {
        let filename = self.filename_for(t);
        let path = self.path_of(&filename);

        if let Err(e) = self.write_jpeg(image, &path) {
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }

        tracing::debug!("Wrote frame {}", path.display());
        Ok(filename)
    }

    fn write_jpeg(&self, image: &DynamicImage, path: &Path) -> WatchResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
        image.to_rgb8().write_with_encoder(encoder)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a saved frame by filename.
    pub fn load_frame(&self, filename: &str) -> WatchResult<DynamicImage> {
        let path = self.path_of(filename);
        if !path.is_file() {
            return Err(WatchError::FrameNotFound(filename.to_string()));
        }
        Ok(image::open(&path)?)
    }

    /// Load the descriptor. A missing file is `None`; a malformed one is
    /// reported and also treated as `None`.
    pub fn load_descriptor(&self) -> WatchResult<Option<CameraDescriptor>> {
        let path = self.path_of(DESCRIPTOR_FILENAME);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&text) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(e) => {
                tracing::warn!("Ignoring malformed descriptor {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    /// Persist the descriptor, replacing the previous file atomically.
    pub fn save_descriptor(&self, descriptor: &CameraDescriptor) -> WatchResult<()> {
        let path = self.path_of(DESCRIPTOR_FILENAME);
        let tmp = self.path_of(&format!("{DESCRIPTOR_FILENAME}.tmp"));

        let json = serde_json::to_string_pretty(descriptor)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
