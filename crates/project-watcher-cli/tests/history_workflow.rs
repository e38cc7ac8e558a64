//! A camera's history built through the library, then read back the way the
//! subcommands read it.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use image::{DynamicImage, Rgb, RgbImage};

use project_watcher::{CameraMonitor, Decision, MonitorConfig, Project, DESCRIPTOR_FILENAME};
use project_watcher_cli::inspect;

fn at(secs: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        + TimeDelta::seconds(secs)
}

fn black() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(96, 96))
}

/// Left half white. The edge sits on a JPEG block boundary.
fn half_white() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(96, 96, |x, _| {
        if x < 48 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

fn open_monitor(project: &Project) -> CameraMonitor {
    CameraMonitor::open(
        project.history_store("Bench").unwrap(),
        "Bench",
        "usb:0",
        MonitorConfig::default(),
    )
    .unwrap()
}

#[test]
fn test_day_of_watching() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::open(dir.path()).unwrap();
    let mut monitor = open_monitor(&project);

    assert!(matches!(
        monitor.add_frame(&black(), at(0)).unwrap(),
        Some(Decision::Saved { .. })
    ));
    match monitor.add_frame(&half_white(), at(6)).unwrap() {
        Some(Decision::Saved { filename, difference }) => {
            assert_eq!(filename, "20240517_090006.jpg");
            assert!((difference - 0.5).abs() < 1e-9);
        }
        other => panic!("expected a save, got {other:?}"),
    }

    // Quiet scene until the stable duration has passed.
    let mut stable = Vec::new();
    for s in 7..=40 {
        if let Some(decision) = monitor.add_frame(&half_white(), at(s)).unwrap() {
            stable.push((s, decision));
        }
    }
    assert_eq!(
        stable,
        vec![(
            37,
            Decision::StableImageFound {
                filename: "20240517_090006.jpg".into()
            }
        )]
    );
    drop(monitor);

    let cameras = inspect::list_cameras(&project).unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].name, "Bench");
    assert_eq!(cameras[0].moniker, "usb:0");
    assert_eq!(cameras[0].entries, 2);
    assert_eq!(cameras[0].stable, 1);

    let history = inspect::history(&project, "Bench", None).unwrap();
    let lines: Vec<_> = history.iter().map(|l| (l.filename.as_str(), l.stable)).collect();
    assert_eq!(
        lines,
        vec![("20240517_090006.jpg", true), ("20240517_090000.jpg", false)]
    );
    assert_eq!(inspect::history(&project, "Bench", Some(1)).unwrap().len(), 1);
    assert_eq!(
        inspect::stable_images(&project, "Bench").unwrap(),
        vec!["20240517_090006.jpg"]
    );

    let fraction = inspect::diff(
        &project,
        "Bench",
        "20240517_090006.jpg",
        "20240517_090000.jpg",
        &MonitorConfig::default(),
    )
    .unwrap();
    assert!((fraction - 0.5).abs() < 0.02, "fraction {fraction}");
}

#[test]
fn test_restart_continues_where_it_left_off() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::open(dir.path()).unwrap();

    let mut monitor = open_monitor(&project);
    monitor.add_frame(&black(), at(0)).unwrap();
    monitor.add_frame(&half_white(), at(6)).unwrap();
    monitor.add_frame(&half_white(), at(37)).unwrap();
    drop(monitor);

    let mut monitor = open_monitor(&project);
    assert_eq!(monitor.last_save_filename(), Some("20240517_090006.jpg"));
    assert_eq!(monitor.last_save_time(), Some(at(6)));
    assert!(monitor.has_stable_reference());

    // Same scene after the restart: nothing new is saved or confirmed.
    for s in 100..140 {
        assert_eq!(monitor.add_frame(&half_white(), at(s)).unwrap(), None);
    }
}

#[test]
fn test_foreign_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::open(dir.path()).unwrap();
    let mut monitor = open_monitor(&project);
    monitor.add_frame(&black(), at(0)).unwrap();
    drop(monitor);

    let camera_dir = project.camera_dir("Bench").unwrap();
    for name in ["thumbs.db", "20240517_0900.jpg", "notes_20240517.jpg", "20240517_090010.png"] {
        std::fs::write(camera_dir.join(name), "x").unwrap();
    }

    let history = inspect::history(&project, "Bench", None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].filename, "20240517_090000.jpg");
}

#[test]
fn test_preview_against_last_save() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::open(dir.path()).unwrap();
    let mut monitor = open_monitor(&project);
    monitor.add_frame(&black(), at(0)).unwrap();
    drop(monitor);

    let input = dir.path().join("input.png");
    half_white().save(&input).unwrap();
    let out = dir.path().join("preview.png");
    inspect::preview(&project, "Bench", &input, &out, &MonitorConfig::default()).unwrap();

    let preview = image::open(&out).unwrap().to_rgb8();
    assert_eq!(preview.dimensions(), (96, 96));
    assert_eq!(preview.get_pixel(10, 10), &Rgb([255, 255, 255]));
    assert_eq!(preview.get_pixel(80, 10), &Rgb([0, 0, 0]));
}

#[test]
fn test_preview_leaves_descriptor_alone() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::open(dir.path()).unwrap();
    let mut monitor = open_monitor(&project);
    monitor.add_frame(&black(), at(0)).unwrap();
    drop(monitor);

    let descriptor = project.camera_dir("Bench").unwrap().join(DESCRIPTOR_FILENAME);
    std::fs::write(&descriptor, "{ not json").unwrap();

    let input = dir.path().join("input.png");
    black().save(&input).unwrap();
    let out = dir.path().join("preview.png");
    inspect::preview(&project, "Bench", &input, &out, &MonitorConfig::default()).unwrap();

    assert_eq!(std::fs::read_to_string(&descriptor).unwrap(), "{ not json");
    assert!(out.exists());
}

#[test]
fn test_preview_needs_a_saved_frame() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::open(dir.path()).unwrap();
    drop(open_monitor(&project));

    let input = dir.path().join("input.png");
    black().save(&input).unwrap();
    let out = dir.path().join("preview.png");
    assert!(inspect::preview(&project, "Bench", &input, &out, &MonitorConfig::default()).is_err());
    assert!(!out.exists());
}

#[test]
fn test_unknown_camera() {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::open(dir.path()).unwrap();
    assert!(inspect::history(&project, "Nobody", None).is_err());
    assert!(!dir.path().join("Nobody").join(DESCRIPTOR_FILENAME).exists());
}
