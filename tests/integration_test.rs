//! 整合測試 - 以合成的影像驗證縮圖、修復與預覽圖
//!
//! 外部修復工具以 shell 腳本取代。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use media_derivatives::FailureKind;
use media_derivatives::component::image_preview::{
    ImagePreviewOptions, SelectionStrategy, generate_folder_preview,
};
use media_derivatives::component::image_resizer::{
    ImageDimensions, QualityTier, RepairTool, ResizeOptions, ResizePool, SetResizeReport,
    corrupt_aside_path, filter_tiers, resize_set,
};
use media_derivatives::config::FileTypeTable;
use media_derivatives::outcome::Outcome;
use tempfile::tempdir;

/// 損毀的 JPEG：只有檔頭，後面是雜訊
const BROKEN_JPEG: &[u8] = b"\xFF\xD8\xFF\xE0garbage garbage garbage";

fn pool_with_repair(repair: RepairTool) -> ResizePool {
    ResizePool::new(
        ResizeOptions {
            jpeg_quality: 90,
            max_workers: Some(4),
            progress_every: 10,
            repair,
            show_progress: false,
        },
        Arc::new(AtomicBool::new(false)),
    )
}

fn pool() -> ResizePool {
    pool_with_repair(RepairTool::new("false", Duration::from_secs(5)))
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(&path)
        .unwrap();
    path
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// 測試 1: 輸出數量與輸入一一對應，失敗不影響其他項目
#[test]
fn test_outcomes_match_inputs() {
    let dir = tempdir().unwrap();
    let mut sources: Vec<PathBuf> = (0..9)
        .map(|i| write_image(dir.path(), &format!("img_{i:02}.jpg"), 500, 400, [90, 90, 90]))
        .collect();
    sources.insert(3, dir.path().join("missing.jpg"));
    let unsupported = dir.path().join("notes.jpg");
    fs::write(&unsupported, b"plain text, not an image").unwrap();
    sources.push(unsupported);

    let result = pool().resize_batch(&sources, &[QualityTier::Small]);

    assert_eq!(result.total(), sources.len());
    assert_eq!(result.success_count(), 9);
    assert_eq!(result.failed_count(), 2);
    assert!(matches!(
        result.outcomes[3],
        Outcome::Failed {
            kind: FailureKind::InputMissing,
            ..
        }
    ));
    for (source, outcome) in sources.iter().zip(&result.outcomes) {
        if outcome.is_usable() {
            let expected = dir
                .path()
                .join("m")
                .join(source.file_name().unwrap());
            assert_eq!(outcome.paths(), [expected]);
        }
    }
}

/// 測試 2: 修復成功的影像標記為 Repaired，損毀的原始檔被刪除
#[cfg(unix)]
#[test]
fn test_corrupt_image_is_repaired() {
    let dir = tempdir().unwrap();
    let fixtures = tempdir().unwrap();
    let valid = write_image(fixtures.path(), "valid.jpg", 800, 600, [10, 200, 30]);
    let script = write_script(
        fixtures.path(),
        "fake_convert.sh",
        &format!("cp \"{}\" \"$7\"", valid.display()),
    );

    let broken = dir.path().join("broken.jpg");
    fs::write(&broken, BROKEN_JPEG).unwrap();
    let good = write_image(dir.path(), "good.jpg", 640, 480, [1, 2, 3]);

    let pool = pool_with_repair(RepairTool::new(
        script.to_string_lossy(),
        Duration::from_secs(10),
    ));
    let result = pool.resize_batch(&[broken.clone(), good], &[QualityTier::Small]);

    assert_eq!(result.total(), 2);
    assert_eq!(result.repaired_count(), 1);
    assert_eq!(result.success_count(), 1);
    assert!(matches!(result.outcomes[0], Outcome::Repaired(_)));

    let output = dir.path().join("m").join("broken.jpg");
    assert_eq!(result.outcomes[0].paths(), [output.clone()]);
    let (w, h) = image::image_dimensions(&output).unwrap();
    assert_eq!(w.max(h), 320);

    // 原位置換成修復後的檔案，改名的損毀檔已刪除
    assert!(image::image_dimensions(&broken).is_ok());
    assert!(!corrupt_aside_path(&broken).exists());
}

/// 測試 3: 修復失敗時原始檔保持不變
#[cfg(unix)]
#[test]
fn test_failed_repair_leaves_original_intact() {
    let dir = tempdir().unwrap();
    let fixtures = tempdir().unwrap();
    let script = write_script(fixtures.path(), "fake_convert.sh", "echo 'bad input' >&2\nexit 1");

    let broken = dir.path().join("broken.jpg");
    fs::write(&broken, BROKEN_JPEG).unwrap();

    let pool = pool_with_repair(RepairTool::new(
        script.to_string_lossy(),
        Duration::from_secs(10),
    ));
    let result = pool.resize_batch(std::slice::from_ref(&broken), &[QualityTier::Small]);

    assert_eq!(result.total(), 1);
    assert!(matches!(result.outcomes[0], Outcome::Failed { .. }));
    assert_eq!(fs::read(&broken).unwrap(), BROKEN_JPEG);
    assert!(!corrupt_aside_path(&broken).exists());
    assert!(!dir.path().join("m").join("broken.jpg").exists());
}

/// 測試 4: 等級依影像尺寸篩選
#[test]
fn test_tier_filtering() {
    assert_eq!(
        filter_tiers(&QualityTier::ALL, ImageDimensions::new(100, 100)),
        vec![QualityTier::Small]
    );
    assert_eq!(
        filter_tiers(&QualityTier::ALL, ImageDimensions::new(1281, 3000)),
        vec![QualityTier::Small, QualityTier::Medium]
    );
    assert_eq!(
        filter_tiers(&QualityTier::ALL, ImageDimensions::new(1280, 3000)),
        vec![QualityTier::Small]
    );
}

/// 測試 5: 影像集縮圖，輸出不超過等級上限也不放大
#[test]
fn test_resize_set_respects_tier_limits() {
    let dir = tempdir().unwrap();
    write_image(dir.path(), "large.jpg", 1600, 1500, [200, 10, 10]);
    write_image(dir.path(), "small.png", 200, 150, [10, 10, 200]);
    let table = FileTypeTable::embedded().unwrap();

    let report = resize_set(
        &pool(),
        dir.path(),
        &[QualityTier::Small, QualityTier::Medium],
        &table,
    )
    .unwrap();
    let SetResizeReport::Processed(result) = report else {
        panic!("expected processed report");
    };
    assert_eq!(result.success_count(), 2);

    for tier in [QualityTier::Small, QualityTier::Medium] {
        for entry in fs::read_dir(tier.output_dir(dir.path())).unwrap() {
            let path = entry.unwrap().path();
            let (w, h) = image::image_dimensions(&path).unwrap();
            assert!(w.max(h) <= tier.max_dimension(), "{} 超過上限", path.display());
        }
    }
    assert_eq!(
        image::image_dimensions(dir.path().join("m").join("small.jpg")).unwrap(),
        (200, 150)
    );
    assert!(!dir.path().join("x").join("small.jpg").exists());
    assert!(dir.path().join("x").join("large.jpg").is_file());
}

/// 測試 6: 透明 PNG 輸出為三通道並以白色填底
#[test]
fn test_transparent_png_output() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("logo.png");
    let mut rgba = RgbaImage::from_pixel(400, 400, Rgba([0, 0, 0, 0]));
    for x in 0..200 {
        for y in 0..400 {
            rgba.put_pixel(x, y, Rgba([255, 0, 0, 255]));
        }
    }
    rgba.save(&source).unwrap();

    let result = pool().resize_batch(&[source], &[QualityTier::Small]);

    let output = result.outcomes[0].paths()[0].clone();
    assert_eq!(output.file_name().unwrap(), "logo.jpg");
    let image = image::open(&output).unwrap();
    assert!(!image.color().has_alpha());
    let rgb = image.to_rgb8();
    assert!(rgb.get_pixel(300, 160).0.iter().all(|c| *c > 240));
    let left = rgb.get_pixel(40, 160).0;
    assert!(left[0] > 200 && left[1] < 60 && left[2] < 60);
}

/// 測試 7: 影像集預覽圖版面與選圖
#[test]
fn test_folder_preview_layout() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        write_image(dir.path(), &format!("p_{i:02}.jpg"), 60, 40, [i * 10, 50, 50]);
    }
    let table = FileTypeTable::embedded().unwrap();
    let options = ImagePreviewOptions {
        cell_size: 32,
        strategy: SelectionStrategy::Random,
        ..ImagePreviewOptions::default()
    };

    let report = generate_folder_preview(dir.path(), None, &options, &table).unwrap();

    assert_eq!((report.rows, report.cols), (4, 3));
    assert_eq!(report.selected, 12);
    assert_eq!(report.total, 20);
    assert_eq!(report.output_path, dir.path().join(".previews").join("preview.jpg"));
    assert_eq!(image::image_dimensions(&report.output_path).unwrap(), (96, 128));
}
