//! Core data types for frames, camera descriptors, and errors.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A single frame read from a capture device.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub timestamp: NaiveDateTime,
}

impl Frame {
    /// Wrap an image read just now, stamped with local wall-clock time.
    pub fn now(image: DynamicImage) -> Self {
        Self {
            image,
            timestamp: chrono::Local::now().naive_local(),
        }
    }
}

/// Capture resolution requested from a device. The device may deliver
/// something else; downstream code accepts whatever arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    /// Ask for the largest frames the device can produce.
    fn default() -> Self {
        Self {
            width: 10_000,
            height: 10_000,
        }
    }
}

/// Identity of one monitored source plus its long-term stable images.
///
/// Persisted as `camera_data.json` in the camera's history directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub name: String,
    pub moniker: String,
    #[serde(default)]
    pub stable_images: BTreeSet<String>,
}

impl CameraDescriptor {
    pub fn new(name: impl Into<String>, moniker: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            moniker: moniker.into(),
            stable_images: BTreeSet::new(),
        }
    }

    /// Whether `filename` has been confirmed as a stable image.
    pub fn is_stable(&self, filename: &str) -> bool {
        self.stable_images.contains(filename)
    }
}

/// Errors that can occur while watching cameras.
#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame not found: {0}")]
    FrameNotFound(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type WatchResult<T> = Result<T, WatchError>;
