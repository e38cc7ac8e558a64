//! Project Watcher CLI: watch folders of frames as cameras and browse the
//! resulting history.

pub mod config;
pub mod device;
pub mod inspect;
pub mod repl;
pub mod watch;

pub use config::{resolve_project_path, ConfigError, WatchSettings};
pub use device::FolderOpener;
pub use watch::{CameraArg, WatchOptions, WatchSummary};
