//! The `watch` command: run cameras until interrupted or all have failed.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Context;

use project_watcher::{CameraEvent, Project, WatchedCamera};

use crate::config::WatchSettings;
use crate::device::FolderOpener;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// `NAME=FOLDER` argument of `watch --camera`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraArg {
    pub name: String,
    pub folder: PathBuf,
}

impl FromStr for CameraArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, folder) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=FOLDER, got '{s}'"))?;
        if name.trim().is_empty() || folder.trim().is_empty() {
            return Err(format!("expected NAME=FOLDER, got '{s}'"));
        }
        Ok(Self {
            name: name.to_string(),
            folder: PathBuf::from(folder),
        })
    }
}

/// Replay options shared by every camera of one `watch` run.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub cameras: Vec<CameraArg>,
    pub fps: f64,
    pub looping: bool,
}

/// What happened during a `watch` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub saved: usize,
    pub stable: usize,
    pub save_failures: usize,
    pub failed_cameras: BTreeSet<String>,
}

/// Watch every camera in `options` until `stop` is raised or every camera has
/// stopped capturing.
pub fn run(
    project: &Project,
    settings: &WatchSettings,
    options: &WatchOptions,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<WatchSummary> {
    anyhow::ensure!(!options.cameras.is_empty(), "No cameras given; use --camera NAME=FOLDER");

    let config = settings.monitor_config()?;
    let (tx, rx) = mpsc::channel();

    let mut cameras = Vec::with_capacity(options.cameras.len());
    for arg in &options.cameras {
        let opener = FolderOpener::new(&arg.folder, options.fps, options.looping)?;
        let camera = WatchedCamera::open(
            project,
            &arg.name,
            Arc::new(opener),
            settings.resolution(),
            config.clone(),
            tx.clone(),
        )
        .with_context(|| format!("Failed to open camera '{}'", arg.name))?;
        cameras.push(camera);
    }
    drop(tx);

    for camera in &mut cameras {
        camera.start()?;
    }
    tracing::info!("Watching {} camera(s) in {}", cameras.len(), project.root().display());

    let mut summary = WatchSummary::default();
    while !stop.load(Ordering::SeqCst) && summary.failed_cameras.len() < cameras.len() {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => record(&mut summary, event),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    for camera in &cameras {
        camera.stop();
    }
    for camera in &mut cameras {
        camera.wait();
    }
    // Decisions made while shutting down.
    for event in rx.try_iter() {
        record(&mut summary, event);
    }

    tracing::info!(
        "Stopped: {} saved, {} stable, {} failed saves",
        summary.saved,
        summary.stable,
        summary.save_failures
    );
    Ok(summary)
}

fn record(summary: &mut WatchSummary, event: CameraEvent) {
    match event {
        CameraEvent::FrameDelivered { .. } => {}
        CameraEvent::FrameSaved { camera, filename } => {
            tracing::info!("[{camera}] saved {filename}");
            summary.saved += 1;
        }
        CameraEvent::StableImageFound { camera, filename } => {
            tracing::info!("[{camera}] stable image {filename}");
            summary.stable += 1;
        }
        CameraEvent::SaveFailed { camera, error } => {
            tracing::error!("[{camera}] save failed: {error}");
            summary.save_failures += 1;
        }
        CameraEvent::CaptureFailed { camera, reason } => {
            tracing::warn!("[{camera}] capture stopped: {reason}");
            summary.failed_cameras.insert(camera);
        }
    }
}
