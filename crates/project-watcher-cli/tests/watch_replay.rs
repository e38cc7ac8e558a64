//! Folder replay through the full capture pipeline.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::TimeDelta;
use image::{DynamicImage, Rgb, RgbImage};

use project_watcher::Project;
use project_watcher_cli::inspect;
use project_watcher_cli::watch::{self, CameraArg, WatchOptions};
use project_watcher_cli::WatchSettings;

/// Evaluate every frame from the start; saves stay five seconds apart.
const EAGER: &str = "[policy]\nstart_up_grace_secs = 0.0\nconsideration_interval_secs = 0.0\n";

fn scene() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([40, 90, 160])))
}

fn frames_folder(count: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..count {
        scene()
            .save(dir.path().join(format!("frame_{i:03}.png")))
            .unwrap();
    }
    dir
}

fn options(name: &str, folder: &tempfile::TempDir) -> WatchOptions {
    WatchOptions {
        cameras: vec![CameraArg {
            name: name.to_string(),
            folder: folder.path().to_path_buf(),
        }],
        fps: 200.0,
        looping: false,
    }
}

#[test]
fn test_replay_saves_first_frame_then_stops() {
    let project_dir = tempfile::tempdir().unwrap();
    let project = Project::open(project_dir.path()).unwrap();
    let frames = frames_folder(4);
    let settings = WatchSettings::parse(EAGER).unwrap();

    let summary = watch::run(
        &project,
        &settings,
        &options("Porch", &frames),
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();

    assert_eq!(summary.saved, 1);
    assert_eq!(summary.stable, 0);
    assert_eq!(summary.save_failures, 0);
    assert!(summary.failed_cameras.contains("Porch"));

    let cameras = inspect::list_cameras(&project).unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].entries, 1);
    assert!(cameras[0].moniker.starts_with("folder:"));
}

#[test]
fn test_recovered_save_suppresses_unchanged_scene() {
    let project_dir = tempfile::tempdir().unwrap();
    let project = Project::open(project_dir.path()).unwrap();
    let frames = frames_folder(3);

    // An hour old, so only the comparison against it can hold off a save.
    let earlier = chrono::Local::now().naive_local() - TimeDelta::hours(1);
    let seeded = project
        .history_store("Porch")
        .unwrap()
        .save_frame(&scene(), earlier)
        .unwrap();

    let summary = watch::run(
        &project,
        &WatchSettings::parse(EAGER).unwrap(),
        &options("Porch", &frames),
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();

    assert_eq!(summary.saved, 0);
    assert_eq!(summary.save_failures, 0);
    let history = inspect::history(&project, "Porch", None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].filename, seeded);
}

#[test]
fn test_changed_scene_after_restart_is_saved() {
    let project_dir = tempfile::tempdir().unwrap();
    let project = Project::open(project_dir.path()).unwrap();
    let frames = frames_folder(3);

    let earlier = chrono::Local::now().naive_local() - TimeDelta::hours(1);
    let dark = DynamicImage::ImageRgb8(RgbImage::new(32, 24));
    project
        .history_store("Porch")
        .unwrap()
        .save_frame(&dark, earlier)
        .unwrap();

    let summary = watch::run(
        &project,
        &WatchSettings::parse(EAGER).unwrap(),
        &options("Porch", &frames),
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();

    assert_eq!(summary.saved, 1);
    assert_eq!(inspect::history(&project, "Porch", None).unwrap().len(), 2);
}

#[test]
fn test_raised_stop_flag_ends_looping_replay() {
    let project_dir = tempfile::tempdir().unwrap();
    let project = Project::open(project_dir.path()).unwrap();
    let frames = frames_folder(1);
    let mut options = options("Porch", &frames);
    options.looping = true;

    let summary = watch::run(
        &project,
        &WatchSettings::default(),
        &options,
        Arc::new(AtomicBool::new(true)),
    )
    .unwrap();

    // Default warm-up swallows everything in the time the loop ran.
    assert_eq!(summary.saved, 0);
    assert!(summary.failed_cameras.is_empty());
}

#[test]
fn test_missing_folder_fails_camera() {
    let project_dir = tempfile::tempdir().unwrap();
    let project = Project::open(project_dir.path()).unwrap();
    let options = WatchOptions {
        cameras: vec![CameraArg {
            name: "Ghost".into(),
            folder: project_dir.path().join("no-such-folder"),
        }],
        fps: 10.0,
        looping: false,
    };

    let summary = watch::run(
        &project,
        &WatchSettings::default(),
        &options,
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();
    assert!(summary.failed_cameras.contains("Ghost"));
}
