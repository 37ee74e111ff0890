use std::path::Path;

use chrono::Utc;
use clap::Parser;
use image::{Rgba, RgbaImage};
use kiosk_watch::{Cli, WatchConfig, Watcher};

fn config(dir: &Path, extra: &[&str]) -> WatchConfig {
    let folder = dir.join("incoming");
    let previews = dir.join("previews");
    let ledger = dir.join("printed_files.txt");
    let mut argv = vec![
        "kiosk-watch".to_string(),
        "--source".into(),
        "folder".into(),
        "--folder".into(),
        folder.display().to_string(),
        "--output".into(),
        "preview".into(),
        "--preview-dir".into(),
        previews.display().to_string(),
        "--ledger".into(),
        ledger.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    WatchConfig::try_from(Cli::parse_from(argv)).unwrap()
}

fn previews(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.join("previews"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_new_image_printed_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut watcher = Watcher::from_config(&config(dir.path(), &[])).await.unwrap();

    // Pre-existing file only forms the baseline
    RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]))
        .save(dir.path().join("incoming").join("before.png"))
        .unwrap();
    let baseline = watcher.poll_once(Utc::now()).await;
    assert!(baseline.selected.is_empty());

    RgbaImage::from_pixel(20, 10, Rgba([255, 0, 0, 128]))
        .save(dir.path().join("incoming").join("photo.png"))
        .unwrap();
    std::fs::write(dir.path().join("incoming").join("notes.pdf"), b"%PDF").unwrap();

    let report = watcher.poll_once(Utc::now()).await;
    assert_eq!(report.printed, vec!["photo.png"]);

    let again = watcher.poll_once(Utc::now()).await;
    assert!(again.selected.is_empty());

    let names = previews(dir.path());
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("photo_"));

    let ledger = std::fs::read_to_string(dir.path().join("printed_files.txt")).unwrap();
    assert!(ledger.starts_with("photo.png,"));
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &["--process-backlog"]);

    let mut first = Watcher::from_config(&cfg).await.unwrap();
    RgbaImage::new(4, 4)
        .save(dir.path().join("incoming").join("badge.png"))
        .unwrap();
    assert_eq!(first.poll_once(Utc::now()).await.printed, vec!["badge.png"]);
    drop(first);

    // Backlog again after restart, but the ledger vetoes the key
    let mut second = Watcher::from_config(&cfg).await.unwrap();
    assert!(second.ledger().contains("badge.png"));
    assert!(second.poll_once(Utc::now()).await.selected.is_empty());
    assert_eq!(previews(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_corrupt_image_retried_until_fixed() {
    let dir = tempfile::tempdir().unwrap();
    let mut watcher = Watcher::from_config(&config(dir.path(), &["--process-backlog"]))
        .await
        .unwrap();

    let path = dir.path().join("incoming").join("upload.jpg");
    std::fs::write(&path, b"partial upload").unwrap();
    let report = watcher.poll_once(Utc::now()).await;
    assert_eq!(report.failed, vec!["upload.jpg"]);
    assert!(!watcher.ledger().contains("upload.jpg"));

    image::RgbImage::new(6, 6).save(&path).unwrap();
    let report = watcher.poll_once(Utc::now()).await;
    assert_eq!(report.printed, vec!["upload.jpg"]);
}

#[tokio::test]
async fn test_text_setup_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-template.png");
    let font = dir.path().join("font.ttf");
    std::fs::write(&font, b"not a font").unwrap();

    let cfg = config(
        dir.path(),
        &[
            "--profile",
            "text",
            "--template",
            &missing.display().to_string(),
            "--font",
            &font.display().to_string(),
        ],
    );
    assert!(Watcher::from_config(&cfg).await.is_err());
}

#[tokio::test]
async fn test_text_rendered_onto_template() {
    let dir = tempfile::tempdir().unwrap();

    // Needs a real font; system fonts differ between machines
    let Ok(_) = kiosk_printer::FontStack::load(None, None, 24.0) else {
        eprintln!("no system font available, skipping");
        return;
    };

    let template = dir.path().join("template.png");
    RgbaImage::from_pixel(400, 300, Rgba([255, 255, 255, 255]))
        .save(&template)
        .unwrap();

    let cfg = config(
        dir.path(),
        &[
            "--profile",
            "text",
            "--process-backlog",
            "--template",
            &template.display().to_string(),
            "--text-region",
            "20,20,380,280",
        ],
    );
    let mut watcher = Watcher::from_config(&cfg).await.unwrap();

    std::fs::write(
        dir.path().join("incoming").join("hello.txt"),
        "Привет, kiosk!\nSecond line",
    )
    .unwrap();
    let report = watcher.poll_once(Utc::now()).await;
    assert_eq!(report.printed, vec!["hello.txt"]);

    let names = previews(dir.path());
    let page = image::open(dir.path().join("previews").join(&names[0]))
        .unwrap()
        .to_rgb8();
    assert_eq!(page.dimensions(), (400, 300));
    assert!(page.pixels().any(|p| p.0 != [255, 255, 255]));
}
