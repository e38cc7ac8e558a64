//! Project Watcher: watches cameras, keeps a history of frames that changed,
//! and remembers scenes that stayed stable.

pub mod camera;
pub mod compare;
pub mod config;
pub mod history;
pub mod monitor;
pub mod project;
pub mod source;
pub mod types;

pub use camera::{CameraEvent, WatchedCamera};
pub use compare::{comparison_size, difference_from, difference_image, ComparisonImage};
pub use config::MonitorConfig;
pub use history::{entry_filename, parse_entry_filename, HistoryStore, DESCRIPTOR_FILENAME};
pub use monitor::{CameraMonitor, Decision};
pub use project::Project;
pub use source::{CaptureDevice, DeviceOpener, FrameSink, FrameSource};
pub use types::*;
