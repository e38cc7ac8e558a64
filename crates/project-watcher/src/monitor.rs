//! Per-camera decision state machine: when to save a frame and when the
//! scene has been stable long enough to remember.

use chrono::{NaiveDateTime, Timelike};
use image::{DynamicImage, RgbImage};

use crate::compare::{difference_from, difference_image, to_rgb, ComparisonImage};
use crate::config::MonitorConfig;
use crate::history::{parse_entry_filename, HistoryStore};
use crate::types::{CameraDescriptor, WatchResult};

/// Outcome of a frame that changed something.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The frame differed from the last save and was written to history.
    Saved { filename: String, difference: f64 },
    /// The last saved frame was added to the descriptor's stable set.
    StableImageFound { filename: String },
}

#[derive(Debug, Default)]
struct MonitorState {
    last_save_time: Option<NaiveDateTime>,
    last_save_filename: Option<String>,
    last_save_comparison: Option<ComparisonImage>,
    last_stable_comparison: Option<ComparisonImage>,
    last_considered_time: Option<NaiveDateTime>,
}

/// Applies the save and stable-image policy to one camera's frames.
pub struct CameraMonitor {
    config: MonitorConfig,
    history: HistoryStore,
    descriptor: CameraDescriptor,
    state: MonitorState,
}

impl CameraMonitor {
    /// Open the monitor for a camera whose history lives in `history`.
    ///
    /// Loads (or creates and persists) the descriptor, then seeds the last
    /// save from the newest history entry and the stable reference from the
    /// newest stable image, so a restart does not re-save the same scene.
    pub fn open(
        history: HistoryStore,
        name: &str,
        moniker: &str,
        config: MonitorConfig,
    ) -> WatchResult<Self> {
        config.validate()?;

        let descriptor = match history.load_descriptor()? {
            Some(descriptor) => descriptor,
            None => {
                let descriptor = CameraDescriptor::new(name, moniker);
                history.save_descriptor(&descriptor)?;
                tracing::info!("Created descriptor for camera '{name}' in {}", history.dir().display());
                descriptor
            }
        };

        let mut monitor = Self {
            config,
            history,
            descriptor,
            state: MonitorState::default(),
        };
        monitor.recover_last_save();
        monitor.recover_last_stable();

        tracing::info!(
            "Camera '{}' opened. Last save: {}. Stable images: {}",
            monitor.descriptor.name,
            monitor.state.last_save_filename.as_deref().unwrap_or("none"),
            monitor.descriptor.stable_images.len()
        );

        Ok(monitor)
    }

    fn recover_last_save(&mut self) {
        for t in self.history.latest_entries() {
            let filename = self.history.filename_for(t);
            match self.history.load_frame(&filename) {
                Ok(img) => {
                    self.update_last_save(&to_rgb(&img), filename, t);
                    return;
                }
                Err(e) => tracing::warn!("Skipping unreadable history entry {filename}: {e}"),
            }
        }
    }

    fn recover_last_stable(&mut self) {
        let mut stable: Vec<(NaiveDateTime, &String)> = self
            .descriptor
            .stable_images
            .iter()
            .filter_map(|name| Some((parse_entry_filename(name, self.history.extension())?, name)))
            .collect();
        stable.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, filename) in stable {
            let img = match self.history.load_frame(filename) {
                Ok(img) => img,
                Err(e) => {
                    tracing::warn!("Skipping missing stable image {filename}: {e}");
                    continue;
                }
            };
            let rgb = to_rgb(&img);
            let comparison = match &self.state.last_save_comparison {
                Some(last) => ComparisonImage::resized(&rgb, last.width(), last.height()),
                None => ComparisonImage::from_rgb(&rgb, self.config.comparison_megapixel_ceiling),
            };
            self.state.last_stable_comparison = Some(comparison);
            return;
        }
    }

    /// Hold off evaluation until `start_up_grace` has passed, so exposure
    /// and focus can settle.
    pub fn begin_warm_up(&mut self, now: NaiveDateTime) {
        self.state.last_considered_time = Some(now + self.config.start_up_grace);
    }

    /// Run the decision policy for one frame captured at `t`.
    ///
    /// On a storage error the last save and the descriptor are left as they
    /// were, so the next evaluated frame retries the write.
    pub fn add_frame(&mut self, frame: &DynamicImage, t: NaiveDateTime) -> WatchResult<Option<Decision>> {
        if let Some(last_save) = self.state.last_save_time {
            if t <= last_save + self.config.min_save_interval {
                return Ok(None);
            }
        }
        if let Some(considered) = self.state.last_considered_time {
            if t < considered + self.config.consideration_interval {
                return Ok(None);
            }
        }

        // Counts as an evaluation even if the write below fails.
        self.state.last_considered_time = Some(t);
        self.consider(frame, t)
    }

    fn consider(&mut self, frame: &DynamicImage, t: NaiveDateTime) -> WatchResult<Option<Decision>> {
        let rgb = to_rgb(frame);
        let threshold = self.config.binarization_threshold;

        let diff = difference_from(&rgb, self.state.last_save_comparison.as_ref(), threshold);
        if diff > self.config.change_threshold {
            // Whole seconds, matching what a restart parses from the filename.
            let t = t.with_nanosecond(0).unwrap_or(t);
            let filename = self.history.save_frame(frame, t)?;
            self.update_last_save(&rgb, filename.clone(), t);
            tracing::info!("Camera '{}' saved {filename} (diff {diff:.6})", self.descriptor.name);
            return Ok(Some(Decision::Saved {
                filename,
                difference: diff,
            }));
        }

        let (Some(last_save_time), Some(filename), Some(last_save)) = (
            self.state.last_save_time,
            self.state.last_save_filename.as_ref(),
            self.state.last_save_comparison.as_ref(),
        ) else {
            return Ok(None);
        };

        if t <= last_save_time + self.config.min_stable_duration {
            return Ok(None);
        }

        let stable_diff = difference_from(
            last_save.as_rgb(),
            self.state.last_stable_comparison.as_ref(),
            threshold,
        );
        if stable_diff <= self.config.change_threshold {
            return Ok(None);
        }

        let filename = filename.clone();
        let candidate = last_save.clone();

        let mut descriptor = self.descriptor.clone();
        descriptor.stable_images.insert(filename.clone());
        self.history.save_descriptor(&descriptor)?;

        self.descriptor = descriptor;
        self.state.last_stable_comparison = Some(candidate);
        tracing::info!("Camera '{}' found stable image {filename}", self.descriptor.name);
        Ok(Some(Decision::StableImageFound { filename }))
    }

    fn update_last_save(&mut self, frame: &RgbImage, filename: String, t: NaiveDateTime) {
        self.state.last_save_comparison = Some(ComparisonImage::from_rgb(
            frame,
            self.config.comparison_megapixel_ceiling,
        ));
        self.state.last_save_time = Some(t);
        self.state.last_save_filename = Some(filename);
    }

    /// Binarized difference of `frame` against the last save, for display.
    /// Without a last save, the frame itself.
    pub fn visualize_difference(&self, frame: &DynamicImage) -> RgbImage {
        let rgb = to_rgb(frame);
        match &self.state.last_save_comparison {
            Some(last) => difference_image(&rgb, last, self.config.binarization_threshold),
            None => rgb.into_owned(),
        }
    }

    pub fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn last_save_filename(&self) -> Option<&str> {
        self.state.last_save_filename.as_deref()
    }

    pub fn last_save_time(&self) -> Option<NaiveDateTime> {
        self.state.last_save_time
    }

    pub fn has_stable_reference(&self) -> bool {
        self.state.last_stable_comparison.is_some()
    }
}
