//! Read-only views of a project's history, shared by the subcommands and the
//! REPL.

use std::path::Path;

use serde::Serialize;

use project_watcher::compare::to_rgb;
use project_watcher::{
    difference_from, difference_image, CameraDescriptor, ComparisonImage, HistoryStore, MonitorConfig, Project,
    WatchError, WatchResult,
};

/// One discovered camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraSummary {
    pub name: String,
    pub moniker: String,
    pub entries: usize,
    pub stable: usize,
}

/// One saved frame of a camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryLine {
    pub filename: String,
    pub stable: bool,
}

/// Every camera in the project with its entry and stable counts.
pub fn list_cameras(project: &Project) -> WatchResult<Vec<CameraSummary>> {
    project
        .discover()?
        .into_iter()
        .map(|descriptor| -> WatchResult<CameraSummary> {
            let store = project.existing_history(&descriptor.name)?;
            Ok(CameraSummary {
                entries: store.list_entries().count(),
                stable: descriptor.stable_images.len(),
                name: descriptor.name,
                moniker: descriptor.moniker,
            })
        })
        .collect()
}

/// Newest-first history of camera `name`, at most `limit` lines.
pub fn history(project: &Project, name: &str, limit: Option<usize>) -> WatchResult<Vec<HistoryLine>> {
    let store = project.existing_history(name)?;
    let descriptor = descriptor_of(&store, name)?;

    Ok(store
        .latest_entries()
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|t| {
            let filename = store.filename_for(t);
            HistoryLine {
                stable: descriptor.is_stable(&filename),
                filename,
            }
        })
        .collect())
}

/// Stable images of camera `name`, newest first.
pub fn stable_images(project: &Project, name: &str) -> WatchResult<Vec<String>> {
    let store = project.existing_history(name)?;
    let descriptor = descriptor_of(&store, name)?;
    Ok(descriptor.stable_images.into_iter().rev().collect())
}

/// Fraction changed of saved frame `a` measured against saved frame `b` at
/// `config`'s comparison size and threshold.
pub fn diff(project: &Project, name: &str, a: &str, b: &str, config: &MonitorConfig) -> WatchResult<f64> {
    let store = project.existing_history(name)?;
    let frame = store.load_frame(a)?;
    let reference = ComparisonImage::from_frame(&store.load_frame(b)?, config.comparison_megapixel_ceiling);
    Ok(difference_from(
        &to_rgb(&frame),
        Some(&reference),
        config.binarization_threshold,
    ))
}

/// Write the difference visualization of the image at `input` against the
/// camera's newest readable saved frame to `out`. Writes nothing else.
pub fn preview(project: &Project, name: &str, input: &Path, out: &Path, config: &MonitorConfig) -> WatchResult<()> {
    let store = project.existing_history(name)?;
    let last_save = store
        .latest_entries()
        .into_iter()
        .find_map(|t| store.load_frame(&store.filename_for(t)).ok())
        .ok_or_else(|| WatchError::FrameNotFound(format!("camera '{name}' has no saved frames")))?;
    let reference = ComparisonImage::from_frame(&last_save, config.comparison_megapixel_ceiling);

    let frame = image::open(input)?;
    difference_image(&to_rgb(&frame), &reference, config.binarization_threshold).save(out)?;
    tracing::info!("Wrote difference preview to {}", out.display());
    Ok(())
}

/// The camera's descriptor, or an empty one when it cannot be read.
fn descriptor_of(store: &HistoryStore, name: &str) -> WatchResult<CameraDescriptor> {
    Ok(store
        .load_descriptor()?
        .unwrap_or_else(|| CameraDescriptor::new(name, "")))
}
