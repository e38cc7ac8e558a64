//! A watched camera: one frame source feeding one monitor, with decisions
//! published as events.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::{DynamicImage, RgbImage};

use crate::config::MonitorConfig;
use crate::monitor::{CameraMonitor, Decision};
use crate::project::Project;
use crate::source::{DeviceOpener, FrameSink, FrameSource};
use crate::types::{CameraDescriptor, Frame, Resolution, WatchError, WatchResult};

/// Events published for the presentation layer.
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// Every frame read from the device, for display.
    FrameDelivered { camera: String, frame: Frame },
    /// The device failed; the camera stopped and must be started again.
    CaptureFailed { camera: String, reason: String },
    FrameSaved { camera: String, filename: String },
    StableImageFound { camera: String, filename: String },
    /// A history or descriptor write failed; a later frame will retry.
    SaveFailed { camera: String, error: String },
}

impl CameraEvent {
    pub fn camera(&self) -> &str {
        match self {
            CameraEvent::FrameDelivered { camera, .. }
            | CameraEvent::CaptureFailed { camera, .. }
            | CameraEvent::FrameSaved { camera, .. }
            | CameraEvent::StableImageFound { camera, .. }
            | CameraEvent::SaveFailed { camera, .. } => camera,
        }
    }
}

/// Runs the monitor on the capture thread.
struct MonitorSink {
    camera: String,
    monitor: Arc<Mutex<CameraMonitor>>,
    events: Sender<CameraEvent>,
}

impl MonitorSink {
    fn publish(&self, event: CameraEvent) {
        // Nobody listening is not an error for the capture loop.
        let _ = self.events.send(event);
    }
}

impl FrameSink for MonitorSink {
    fn on_frame(&self, frame: Frame) {
        let result = lock(&self.monitor).add_frame(&frame.image, frame.timestamp);
        self.publish(CameraEvent::FrameDelivered {
            camera: self.camera.clone(),
            frame,
        });

        let camera = self.camera.clone();
        match result {
            Ok(None) => {}
            Ok(Some(Decision::Saved { filename, .. })) => {
                self.publish(CameraEvent::FrameSaved { camera, filename })
            }
            Ok(Some(Decision::StableImageFound { filename })) => {
                self.publish(CameraEvent::StableImageFound { camera, filename })
            }
            Err(e) => {
                tracing::error!("Camera '{camera}' failed to save: {e}");
                self.publish(CameraEvent::SaveFailed {
                    camera,
                    error: e.to_string(),
                });
            }
        }
    }

    fn on_capture_failed(&self, error: WatchError) {
        tracing::warn!("Camera '{}' stopped: {error}", self.camera);
        self.publish(CameraEvent::CaptureFailed {
            camera: self.camera.clone(),
            reason: error.to_string(),
        });
    }
}

fn lock(monitor: &Mutex<CameraMonitor>) -> MutexGuard<'_, CameraMonitor> {
    monitor.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One monitored camera in a project.
pub struct WatchedCamera {
    name: String,
    monitor: Arc<Mutex<CameraMonitor>>,
    source: FrameSource,
}

impl WatchedCamera {
    /// Open camera `name` in `project`, reading frames through `opener`.
    pub fn open(
        project: &Project,
        name: &str,
        opener: Arc<dyn DeviceOpener>,
        resolution: Resolution,
        config: MonitorConfig,
        events: Sender<CameraEvent>,
    ) -> WatchResult<Self> {
        let history = project.history_store(name)?;
        let monitor = CameraMonitor::open(history, name, &opener.moniker(), config)?;
        let monitor = Arc::new(Mutex::new(monitor));

        let sink = Arc::new(MonitorSink {
            camera: name.to_string(),
            monitor: Arc::clone(&monitor),
            events,
        });

        Ok(Self {
            name: name.to_string(),
            monitor,
            source: FrameSource::new(opener, resolution, sink),
        })
    }

    /// Begin capturing. The warm-up period starts now. Does nothing if the
    /// camera is already capturing.
    pub fn start(&mut self) -> WatchResult<()> {
        if self.source.is_running() {
            return Ok(());
        }
        lock(&self.monitor).begin_warm_up(chrono::Local::now().naive_local());
        self.source.start()?;
        tracing::info!("Camera '{}' capturing", self.name);
        Ok(())
    }

    /// Ask the capture loop to end. Does not wait.
    pub fn stop(&self) {
        self.source.stop();
    }

    /// Block until the capture loop has exited.
    pub fn wait(&mut self) {
        self.source.wait();
    }

    pub fn is_running(&self) -> bool {
        self.source.is_running()
    }

    pub fn visualize_difference(&self, frame: &DynamicImage) -> RgbImage {
        lock(&self.monitor).visualize_difference(frame)
    }

    pub fn descriptor(&self) -> CameraDescriptor {
        lock(&self.monitor).descriptor().clone()
    }

    pub fn last_save_filename(&self) -> Option<String> {
        lock(&self.monitor).last_save_filename().map(str::to_string)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for WatchedCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
