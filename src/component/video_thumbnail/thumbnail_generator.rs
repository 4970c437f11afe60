use crate::config::Config;
use crate::error::{MediaError, MediaResult};
use crate::pipeline::{PipelineState, RunSupervisor};
use crate::tools::sampling::thumbnail_step;
use crate::tools::{FfmpegCommand, StagingArea, move_file, probe_video};
use image::RgbImage;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 任一通道的標準差超過此值才視為有內容的影格
pub const BLANK_STDDEV_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct ThumbnailOptions {
    /// 未設定時依影片長度決定
    pub step: Option<f64>,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub timeout: Duration,
    pub staging_root: Option<PathBuf>,
}

impl ThumbnailOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.settings.tools;
        Self {
            step: None,
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
            timeout: tools.timeout(),
            staging_root: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailReport {
    pub output_path: PathBuf,
    /// 選中影格的時間點（秒）
    pub timestamp: f64,
    /// 嘗試擷取的次數
    pub attempts: usize,
}

/// 預設輸出位置：影片旁的 `<stem>_thumb.jpg`
#[must_use]
pub fn default_thumbnail_path(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
    video_path.with_file_name(format!("{stem}_thumb.jpg"))
}

/// 各通道的標準差
#[must_use]
pub fn channel_stddev(image: &RgbImage) -> [f64; 3] {
    let count = f64::from(image.width()) * f64::from(image.height());
    if count == 0.0 {
        return [0.0; 3];
    }

    let mut sum = [0.0_f64; 3];
    let mut sum_sq = [0.0_f64; 3];
    for pixel in image.pixels() {
        for (channel, value) in pixel.0.iter().enumerate() {
            let value = f64::from(*value);
            sum[channel] += value;
            sum_sq[channel] += value * value;
        }
    }

    let mut stddev = [0.0; 3];
    for channel in 0..3 {
        let mean = sum[channel] / count;
        stddev[channel] = (sum_sq[channel] / count - mean * mean).max(0.0).sqrt();
    }
    stddev
}

/// 影格是否有內容（不是整片黑或整片白）
///
/// 無法讀取的檔案視為無效。
#[must_use]
pub fn is_valid_frame(path: &Path) -> bool {
    match image::open(path) {
        Ok(frame) => channel_stddev(&frame.to_rgb8())
            .iter()
            .any(|stddev| *stddev > BLANK_STDDEV_THRESHOLD),
        Err(e) => {
            warn!("無法讀取影格 {}: {e}", path.display());
            false
        }
    }
}

/// 擷取候選時間點：`0, step, 2·step, ...`（小於影片長度），最後再試一次 `0`
#[must_use]
pub fn candidate_instants(duration: f64, step: f64) -> Vec<f64> {
    let mut instants = Vec::new();
    if step > 0.0 && duration.is_finite() {
        let mut t = 0.0;
        while t < duration {
            instants.push(t);
            t += step;
        }
    }
    instants.push(0.0);
    instants
}

/// 產生影片封面縮圖
///
/// 依序擷取候選時間點，找到第一張有內容的影格就停止。
pub async fn generate_thumbnail(
    video_path: &Path,
    output_path: Option<&Path>,
    options: &ThumbnailOptions,
    shutdown_signal: Arc<AtomicBool>,
) -> MediaResult<ThumbnailReport> {
    let label = video_path
        .file_name()
        .map_or_else(|| "thumbnail".to_string(), |n| n.to_string_lossy().to_string());
    let mut supervisor = RunSupervisor::new(label);

    supervisor.advance(PipelineState::Sampling);
    let info = probe_video(&options.ffprobe, video_path, options.timeout)
        .await
        .map_err(|e| supervisor.fail(e))?;
    let step = options
        .step
        .filter(|step| *step > 0.0)
        .unwrap_or_else(|| thumbnail_step(info.duration_seconds));
    let instants = candidate_instants(info.duration_seconds, step);
    debug!(
        "{}: {:.1}s, 每 {step} 秒嘗試一次，共 {} 個候選",
        video_path.display(),
        info.duration_seconds,
        instants.len()
    );

    let staging = StagingArea::create(options.staging_root.as_deref(), "thumb")
        .map_err(|e| supervisor.fail(e))?;

    supervisor.advance(PipelineState::Dispatching);
    supervisor.advance(PipelineState::Collecting);
    let ffmpeg = FfmpegCommand::new(options.ffmpeg.clone(), options.timeout);
    let candidate = staging.file("thumbnail.jpg");
    let mut selected = None;
    let mut attempts = 0;

    for timestamp in instants {
        if shutdown_signal.load(Ordering::SeqCst) {
            return Err(supervisor.fail(MediaError::Cancelled));
        }
        attempts += 1;

        let captured = ffmpeg
            .capture_frame(video_path, timestamp, &candidate)
            .execute(Some(shutdown_signal.as_ref()))
            .await;
        match captured {
            Ok(_) if candidate.is_file() && is_valid_frame(&candidate) => {
                selected = Some(timestamp);
                break;
            }
            Ok(_) => debug!("{timestamp:.1}s 的影格沒有內容"),
            Err(MediaError::Cancelled) => return Err(supervisor.fail(MediaError::Cancelled)),
            Err(e) => debug!("{timestamp:.1}s 擷取失敗: {e}"),
        }
        let _ = fs::remove_file(&candidate);
    }

    let Some(timestamp) = selected else {
        return Err(supervisor.fail(MediaError::InsufficientInput(format!(
            "找不到有效的影格: {}",
            video_path.display()
        ))));
    };

    supervisor.advance(PipelineState::Finalizing);
    let final_path =
        output_path.map_or_else(|| default_thumbnail_path(video_path), Path::to_path_buf);
    if let Some(parent) = final_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| supervisor.fail(MediaError::io(parent, e)))?;
    }
    move_file(&candidate, &final_path).map_err(|e| supervisor.fail(e))?;

    if let Err(e) = staging.close() {
        warn!("無法移除暫存區: {e}");
    }
    supervisor.advance(PipelineState::Done);

    info!(
        "封面縮圖已建立: {} ({timestamp:.1}s)",
        final_path.display()
    );
    Ok(ThumbnailReport {
        output_path: final_path,
        timestamp,
        attempts,
    })
}
