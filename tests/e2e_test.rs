//! E2E Integration Tests
//!
//! 以 shell 腳本取代 ffprobe / ffmpeg，驗證影片管線的端對端行為

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use image::{Rgb, RgbImage};
use media_derivatives::MediaError;
use media_derivatives::component::video_converter::{
    ConversionKind, ConversionOptions, convert_folder, convert_video,
};
use media_derivatives::config::{ConversionSettings, FileTypeTable};
use media_derivatives::component::video_grid::{GridOptions, generate_grid};
use media_derivatives::component::video_sprite::{SpriteOptions, generate_sprites};
use media_derivatives::component::video_thumbnail::{ThumbnailOptions, generate_thumbnail};
use tempfile::{TempDir, tempdir};

/// 測試用的假工具與影片
struct Fixture {
    dir: TempDir,
    staging_root: TempDir,
    video: PathBuf,
}

impl Fixture {
    fn new(duration: f64) -> Self {
        Self::with_stream_fields(duration, "")
    }

    /// `extra` 直接接在影片串流的 JSON 欄位之後（需以逗號開頭）
    fn with_stream_fields(duration: f64, extra: &str) -> Self {
        let dir = tempdir().unwrap();
        let staging_root = tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        fs::write(&video, b"not really a video").unwrap();

        let probe_json = format!(
            r#"{{"streams":[{{"codec_type":"video","codec_name":"h264","width":640,"height":360,"r_frame_rate":"30/1"{extra}}}],"format":{{"duration":"{duration}"}}}}"#
        );
        let json_path = dir.path().join("probe.json");
        fs::write(&json_path, probe_json).unwrap();
        write_script(
            dir.path(),
            "ffprobe.sh",
            &format!("cat \"{}\"", json_path.display()),
        );

        let striped = dir.path().join("striped.jpg");
        RgbImage::from_fn(64, 36, |x, _| {
            if x % 8 < 4 { Rgb([20, 20, 20]) } else { Rgb([230, 230, 230]) }
        })
        .save(&striped)
        .unwrap();
        let blank = dir.path().join("blank.jpg");
        RgbImage::from_pixel(64, 36, Rgb([0, 0, 0])).save(&blank).unwrap();

        Self {
            dir,
            staging_root,
            video,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// 把指定的圖檔複製到最後一個參數（輸出路徑）
    fn copying_ffmpeg(&self, image: &str) -> String {
        self.ffmpeg_script(&format!(
            "for last; do :; done\ncp \"{}\" \"$last\"",
            self.path(image).display()
        ))
    }

    fn ffmpeg_script(&self, body: &str) -> String {
        write_script(self.dir.path(), "ffmpeg.sh", body)
            .to_string_lossy()
            .to_string()
    }

    fn ffprobe(&self) -> String {
        self.path("ffprobe.sh").to_string_lossy().to_string()
    }

    fn grid_options(&self, ffmpeg: String) -> GridOptions {
        GridOptions {
            grid_size: None,
            max_tile_size: 90,
            max_parallel: 3,
            quality: 80,
            ffmpeg,
            ffprobe: self.ffprobe(),
            timeout: Duration::from_secs(10),
            staging_root: Some(self.staging_root.path().to_path_buf()),
        }
    }

    fn sprite_options(&self, ffmpeg: String) -> SpriteOptions {
        SpriteOptions {
            grid_size: 10,
            interval: 5.0,
            max_tile_size: 160,
            quality: 3,
            output_prefix: "sprite_".to_string(),
            max_parallel: 2,
            ffmpeg,
            ffprobe: self.ffprobe(),
            timeout: Duration::from_secs(10),
            staging_root: Some(self.staging_root.path().to_path_buf()),
        }
    }

    fn thumbnail_options(&self, ffmpeg: String) -> ThumbnailOptions {
        ThumbnailOptions {
            step: None,
            ffmpeg,
            ffprobe: self.ffprobe(),
            timeout: Duration::from_secs(10),
            staging_root: Some(self.staging_root.path().to_path_buf()),
        }
    }

    fn conversion_options(&self, ffmpeg: String) -> ConversionOptions {
        ConversionOptions {
            settings: ConversionSettings::default(),
            ffmpeg,
            ffprobe: self.ffprobe(),
            probe_timeout: Duration::from_secs(10),
            staging_root: Some(self.staging_root.path().to_path_buf()),
        }
    }

    /// 記錄參數並在最後一個參數（輸出路徑）寫入內容
    fn recording_ffmpeg(&self) -> String {
        self.ffmpeg_script(&format!(
            "echo \"$@\" >> \"{}\"\nfor last; do :; done\necho converted > \"$last\"",
            self.path("ffmpeg_args.txt").display()
        ))
    }

    fn ffmpeg_calls(&self) -> Vec<String> {
        fs::read_to_string(self.path("ffmpeg_args.txt"))
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn staging_is_empty(&self) -> bool {
        fs::read_dir(self.staging_root.path()).unwrap().count() == 0
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn no_shutdown() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// 測試網格預覽圖：60 秒影片 → 3x3 網格，輸出在影片旁
#[tokio::test]
async fn test_grid_end_to_end() {
    let fixture = Fixture::new(60.0);
    let options = fixture.grid_options(fixture.copying_ffmpeg("striped.jpg"));

    let report = generate_grid(&fixture.video, None, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.grid_size, 3);
    assert_eq!(report.tile_size, (160, 90));
    assert_eq!(report.extraction.total(), 9);
    assert_eq!(report.extraction.success_count(), 9);
    assert_eq!(report.placed, 9);
    assert_eq!(report.output_path, fixture.path("clip_grid.jpg"));
    assert_eq!(
        image::image_dimensions(&report.output_path).unwrap(),
        (480, 270)
    );
    assert!(fixture.staging_is_empty());
}

/// 測試所有影格都擷取失敗時不產生輸出
#[tokio::test]
async fn test_grid_all_frames_failed() {
    let fixture = Fixture::new(60.0);
    let options = fixture.grid_options(fixture.ffmpeg_script("echo 'decode error' >&2\nexit 1"));

    let result = generate_grid(&fixture.video, None, &options, no_shutdown()).await;

    assert!(matches!(result, Err(MediaError::InsufficientInput(_))));
    assert!(!fixture.path("clip_grid.jpg").exists());
    assert!(fixture.staging_is_empty());
}

/// 測試擷取中途取消：程序被終止、暫存區被移除
#[tokio::test]
async fn test_grid_cancel_mid_extraction() {
    let fixture = Fixture::new(600.0);
    let options = fixture.grid_options(fixture.ffmpeg_script("sleep 30"));
    let shutdown = no_shutdown();

    let trigger = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.store(true, Ordering::SeqCst);
    });

    let started = std::time::Instant::now();
    let result = generate_grid(&fixture.video, None, &options, shutdown).await;

    assert!(matches!(result, Err(MediaError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!fixture.path("clip_grid.jpg").exists());
    assert!(fixture.staging_is_empty());
}

/// 測試縮圖表：60 秒、每 5 秒一張 → 1 張縮圖表、12 筆時間軸
#[tokio::test]
async fn test_sprite_end_to_end() {
    let fixture = Fixture::new(60.0);
    let options = fixture.sprite_options(fixture.copying_ffmpeg("striped.jpg"));
    let output_dir = fixture.path("clip_sprites");

    let report = generate_sprites(&fixture.video, &output_dir, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.sheets, vec![output_dir.join("sprite_001.jpg")]);
    assert_eq!(report.cue_document, output_dir.join("sprite_.vtt"));
    assert_eq!(report.tile_size, (160, 90));
    assert_eq!(report.cue_count, 12);

    let document = fs::read_to_string(&report.cue_document).unwrap();
    assert!(document.starts_with("WEBVTT\n\n"));
    assert_eq!(document.matches(" --> ").count(), 12);
    assert!(document.contains("00:00:00.000 --> 00:00:05.000\nsprite_001.jpg#xywh=0,0,160,90"));
    assert!(document.contains("00:00:55.000 --> 00:01:00.000\nsprite_001.jpg#xywh=160,90,160,90"));
    assert!(fixture.staging_is_empty());
}

/// 測試單張縮圖表失敗：其他縮圖表照常輸出，失敗的不列入時間軸
#[tokio::test]
async fn test_sprite_failed_sheet_is_omitted() {
    let fixture = Fixture::new(1500.0);
    let striped = fixture.path("striped.jpg");
    let options = fixture.sprite_options(fixture.ffmpeg_script(&format!(
        "case \"$*\" in *\"-ss 500.000\"*) exit 1 ;; esac\nfor last; do :; done\ncp \"{}\" \"$last\"",
        striped.display()
    )));
    let output_dir = fixture.path("sprites");

    let report = generate_sprites(&fixture.video, &output_dir, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.generation.total(), 3);
    assert_eq!(report.generation.failed_count(), 1);
    assert_eq!(
        report.sheets,
        vec![output_dir.join("sprite_001.jpg"), output_dir.join("sprite_003.jpg")]
    );
    assert!(!output_dir.join("sprite_002.jpg").exists());
    assert_eq!(report.cue_count, 200);

    let document = fs::read_to_string(&report.cue_document).unwrap();
    assert!(!document.contains("sprite_002.jpg"));
    assert!(document.contains("00:16:40.000 --> 00:16:45.000\nsprite_003.jpg#xywh=0,0,160,90"));
}

/// 測試封面縮圖：第一個影格就有內容
#[tokio::test]
async fn test_thumbnail_picks_first_valid_frame() {
    let fixture = Fixture::new(30.0);
    let options = fixture.thumbnail_options(fixture.copying_ffmpeg("striped.jpg"));

    let report = generate_thumbnail(&fixture.video, None, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.output_path, fixture.path("clip_thumb.jpg"));
    assert_eq!(report.attempts, 1);
    assert!(report.timestamp.abs() < f64::EPSILON);
    assert!(image::image_dimensions(&report.output_path).is_ok());
    assert!(fixture.staging_is_empty());
}

/// 測試封面縮圖：所有影格都是單色時回傳錯誤
#[tokio::test]
async fn test_thumbnail_all_blank_frames() {
    let fixture = Fixture::new(5.0);
    let options = fixture.thumbnail_options(fixture.copying_ffmpeg("blank.jpg"));

    let result = generate_thumbnail(&fixture.video, None, &options, no_shutdown()).await;

    assert!(matches!(result, Err(MediaError::InsufficientInput(_))));
    assert!(!fixture.path("clip_thumb.jpg").exists());
    assert!(fixture.staging_is_empty());
}

const ROTATED_MINUS_90: &str =
    r#","side_data_list":[{"side_data_type":"Display Matrix","rotation":-90}]"#;

/// 測試直拍影片（Display Matrix -90）：網格圖塊寬高互換
#[tokio::test]
async fn test_grid_rotated_video_swaps_tiles() {
    let fixture = Fixture::with_stream_fields(60.0, ROTATED_MINUS_90);
    let options = fixture.grid_options(fixture.copying_ffmpeg("striped.jpg"));

    let report = generate_grid(&fixture.video, None, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.grid_size, 3);
    assert_eq!(report.tile_size, (90, 160));
    assert_eq!(
        image::image_dimensions(&report.output_path).unwrap(),
        (270, 480)
    );
    assert!(fixture.staging_is_empty());
}

/// 測試直拍影片（Display Matrix -90）：縮圖表圖塊與時間軸座標寬高互換
#[tokio::test]
async fn test_sprite_rotated_video_swaps_tiles() {
    let fixture = Fixture::with_stream_fields(60.0, ROTATED_MINUS_90);
    let options = fixture.sprite_options(fixture.copying_ffmpeg("striped.jpg"));
    let output_dir = fixture.path("clip_sprites");

    let report = generate_sprites(&fixture.video, &output_dir, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.tile_size, (90, 160));
    let document = fs::read_to_string(&report.cue_document).unwrap();
    assert!(document.contains("00:00:05.000 --> 00:00:10.000\nsprite_001.jpg#xywh=90,0,90,160"));
}

/// 測試相容編碼但容器不支援：只換容器，輸出在影片旁
#[tokio::test]
async fn test_convert_remuxes_unsupported_container() {
    let fixture = Fixture::new(30.0);
    let video = fixture.path("clip.avi");
    fs::write(&video, b"avi payload").unwrap();
    let options = fixture.conversion_options(fixture.recording_ffmpeg());

    let report = convert_video(&video, None, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.kind, ConversionKind::Remux);
    assert_eq!(report.output_path, fixture.path("clip.convert.mp4"));
    assert_eq!(fs::read_to_string(&report.output_path).unwrap(), "converted\n");
    let calls = fixture.ffmpeg_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("-c:v copy"));
    assert!(calls[0].contains("-movflags faststart"));
    assert!(video.exists());
    assert!(fixture.staging_is_empty());
}

/// 測試已是相容格式的影片：不呼叫 ffmpeg
#[tokio::test]
async fn test_convert_skips_compatible_video() {
    let fixture = Fixture::new(30.0);
    let options = fixture.conversion_options(fixture.recording_ffmpeg());

    let report = convert_video(&fixture.video, None, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.kind, ConversionKind::Unchanged);
    assert_eq!(report.output_path, fixture.video);
    assert!(fixture.ffmpeg_calls().is_empty());
}

/// 測試資料夾轉檔：同名影片分到不同輸出，相容影片略過
#[tokio::test]
async fn test_convert_folder_assigns_distinct_targets() {
    let fixture = Fixture::new(30.0);
    let folder = fixture.path("videos");
    fs::create_dir(&folder).unwrap();
    for name in ["a.avi", "a.mkv", "b.mp4"] {
        fs::write(folder.join(name), name).unwrap();
    }
    let options = fixture.conversion_options(fixture.recording_ffmpeg());
    let file_types = FileTypeTable::embedded().unwrap();

    let report = convert_folder(&folder, &file_types, &options, no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.converted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.batch.failed_count(), 0);
    assert_eq!(
        report.batch.outcomes[0].first_path(),
        Some(folder.join("a.mp4"))
    );
    assert_eq!(
        report.batch.outcomes[1].first_path(),
        Some(folder.join("a.convert.mp4"))
    );
    assert_eq!(
        report.batch.outcomes[2].first_path(),
        Some(folder.join("b.mp4"))
    );
    assert_eq!(fixture.ffmpeg_calls().len(), 2);
    assert!(fixture.staging_is_empty());
}

