//! Frame acquisition loop running on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use image::DynamicImage;

use crate::types::{Frame, Resolution, WatchError, WatchResult};

/// An opened capture device.
///
/// Dropping the device releases it.
pub trait CaptureDevice: Send {
    /// Block until the next frame is available.
    fn read_frame(&mut self) -> WatchResult<DynamicImage>;
}

/// Opens capture devices. Called on the capture thread each time a source
/// starts.
pub trait DeviceOpener: Send + Sync {
    /// Open the device, asking for `resolution`. The device decides what it
    /// actually delivers.
    fn open(&self, resolution: Resolution) -> WatchResult<Box<dyn CaptureDevice>>;

    /// Human-readable device handle for logs and descriptors.
    fn moniker(&self) -> String;
}

/// The single subscriber of a [`FrameSource`]. Runs on the capture thread.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: Frame);

    /// Called at most once per started loop, after which the loop ends.
    fn on_capture_failed(&self, error: WatchError);
}

/// Drives a capture device on a dedicated thread and hands every frame to
/// its sink.
pub struct FrameSource {
    opener: Arc<dyn DeviceOpener>,
    resolution: Resolution,
    sink: Arc<dyn FrameSink>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FrameSource {
    pub fn new(opener: Arc<dyn DeviceOpener>, resolution: Resolution, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            opener,
            resolution,
            sink,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start the capture loop. Does nothing if it is already running.
    pub fn start(&mut self) -> WatchResult<()> {
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }
        // A stopped loop may still be finishing its last frame.
        self.wait();

        self.running.store(true, Ordering::Release);
        let opener = Arc::clone(&self.opener);
        let sink = Arc::clone(&self.sink);
        let running = Arc::clone(&self.running);
        let resolution = self.resolution;

        let spawned = std::thread::Builder::new()
            .name(format!("capture-{}", opener.moniker()))
            .spawn(move || capture_loop(opener.as_ref(), resolution, sink.as_ref(), &running));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Ask the loop to end after the current frame. Does not wait.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Block until the capture thread has exited.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Capture thread for {} panicked", self.opener.moniker());
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(opener: &dyn DeviceOpener, resolution: Resolution, sink: &dyn FrameSink, running: &AtomicBool) {
    let moniker = opener.moniker();
    let mut device = match opener.open(resolution) {
        Ok(device) => device,
        Err(e) => {
            tracing::warn!("Failed to open {moniker}: {e}");
            running.store(false, Ordering::Release);
            sink.on_capture_failed(e);
            return;
        }
    };
    tracing::debug!("Opened {moniker} ({}x{} requested)", resolution.width, resolution.height);

    while running.load(Ordering::Acquire) {
        match device.read_frame() {
            Ok(image) => sink.on_frame(Frame::now(image)),
            Err(e) => {
                tracing::warn!("Read from {moniker} failed: {e}");
                running.store(false, Ordering::Release);
                sink.on_capture_failed(e);
                break;
            }
        }
    }

    drop(device);
    tracing::debug!("Released {moniker}");
}
