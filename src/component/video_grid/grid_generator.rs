use super::frame_extractor::{artifact_slots, extract_frames, extraction_jobs};
use crate::config::Config;
use crate::error::{MediaError, MediaResult};
use crate::outcome::BatchResult;
use crate::pipeline::{PipelineState, RunSupervisor};
use crate::tools::composer::BLACK;
use crate::tools::sampling::{grid_instants, grid_size_for_duration, orient, scale_short_edge};
use crate::tools::{
    FfmpegCommand, GridLayout, RunDirectory, SheetSpec, StagingArea, TileSource, compose_sheet,
    move_file, probe_video,
};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GridOptions {
    /// 未設定時依影片長度決定
    pub grid_size: Option<u32>,
    pub max_tile_size: u32,
    pub max_parallel: usize,
    /// 合成圖的 JPEG 品質（1-100）
    pub quality: u8,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub timeout: Duration,
    /// 暫存區的上層目錄；未設定時使用系統暫存目錄
    pub staging_root: Option<PathBuf>,
}

impl GridOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let settings = &config.settings;
        Self {
            grid_size: settings.video_grid.grid_size,
            max_tile_size: settings.video_grid.max_tile_size,
            max_parallel: settings.video_grid.max_parallel,
            quality: settings.video_grid.quality,
            ffmpeg: settings.tools.ffmpeg.clone(),
            ffprobe: settings.tools.ffprobe.clone(),
            timeout: settings.tools.timeout(),
            staging_root: None,
        }
    }
}

#[derive(Debug)]
pub struct GridReport {
    pub output_path: PathBuf,
    pub grid_size: u32,
    pub tile_size: (u32, u32),
    pub extraction: BatchResult,
    pub placed: usize,
}

/// 預設輸出位置：影片旁的 `<stem>_grid.jpg`
#[must_use]
pub fn default_grid_path(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
    video_path.with_file_name(format!("{stem}_grid.jpg"))
}

/// 產生影片網格預覽圖
///
/// 無法 probe 或影片太短時在派送前就回傳錯誤。擷取失敗的影格在網格中留空，
/// 全部失敗時回傳 [`MediaError::InsufficientInput`]。中斷時回傳
/// [`MediaError::Cancelled`]，暫存區一律移除。
pub async fn generate_grid(
    video_path: &Path,
    output_path: Option<&Path>,
    options: &GridOptions,
    shutdown_signal: Arc<AtomicBool>,
) -> MediaResult<GridReport> {
    let label = video_path
        .file_name()
        .map_or_else(|| "grid".to_string(), |n| n.to_string_lossy().to_string());
    let mut supervisor = RunSupervisor::new(label);

    // Sampling
    supervisor.advance(PipelineState::Sampling);
    let info = probe_video(&options.ffprobe, video_path, options.timeout)
        .await
        .map_err(|e| supervisor.fail(e))?;

    let grid_size = match options.grid_size.or_else(|| grid_size_for_duration(info.duration_seconds)) {
        Some(size) if size > 0 => size,
        _ => {
            return Err(supervisor.fail(MediaError::InsufficientInput(format!(
                "影片太短（{:.1} 秒）",
                info.duration_seconds
            ))));
        }
    };

    let samples = grid_instants(info.duration_seconds, grid_size);
    if samples.is_empty() {
        return Err(supervisor.fail(MediaError::InsufficientInput(format!(
            "影片太短（{:.1} 秒）",
            info.duration_seconds
        ))));
    }

    let tile_size = orient(
        scale_short_edge(info.width, info.height, options.max_tile_size),
        info.is_sideways(),
    );
    info!(
        "{}: {:.1}s, {}x{}, 旋轉 {}°, 網格 {grid_size}x{grid_size}, 圖塊 {}x{}",
        video_path.display(),
        info.duration_seconds,
        info.width,
        info.height,
        info.rotation,
        tile_size.0,
        tile_size.1
    );

    let staging =
        StagingArea::create(options.staging_root.as_deref(), "grid").map_err(|e| supervisor.fail(e))?;

    // Dispatching
    supervisor.advance(PipelineState::Dispatching);
    let ffmpeg = FfmpegCommand::new(options.ffmpeg.clone(), options.timeout);
    let jobs = extraction_jobs(&ffmpeg, video_path, &samples, tile_size, &staging);

    // Collecting
    supervisor.advance(PipelineState::Collecting);
    let extraction = extract_frames(jobs, options.max_parallel, Arc::clone(&shutdown_signal)).await;

    if shutdown_signal.load(Ordering::SeqCst) {
        warn!("收到中斷訊號，捨棄 {} 的擷取結果", video_path.display());
        return Err(supervisor.fail(MediaError::Cancelled));
    }
    if extraction.success_count() == 0 {
        return Err(supervisor.fail(MediaError::InsufficientInput(
            "沒有成功擷取任何影格".to_string(),
        )));
    }

    let run_dir = RunDirectory::create(options.staging_root.as_deref(), staging.run_id())
        .map_err(|e| supervisor.fail(e))?;
    let frames = staging.promote(&artifact_slots(&extraction), &run_dir);

    // Composing
    supervisor.advance(PipelineState::Composing);
    let composed = staging.file("grid.jpg");
    let spec = SheetSpec {
        layout: GridLayout::square(grid_size, tile_size.0, tile_size.1),
        background: BLACK,
        quality: options.quality,
        source: TileSource::Frame,
    };
    let compose_target = composed.clone();
    let report = tokio::task::spawn_blocking(move || compose_sheet(&frames, &spec, &compose_target))
        .await
        .map_err(|e| supervisor.fail(MediaError::io(&composed, std::io::Error::other(e))))?
        .map_err(|e| supervisor.fail(e))?;

    // Finalizing
    supervisor.advance(PipelineState::Finalizing);
    let final_path = output_path.map_or_else(|| default_grid_path(video_path), Path::to_path_buf);
    if let Some(parent) = final_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| supervisor.fail(MediaError::io(parent, e)))?;
    }
    move_file(&composed, &final_path).map_err(|e| supervisor.fail(e))?;

    drop(run_dir);
    if let Err(e) = staging.close() {
        warn!("無法移除暫存區: {e}");
    }
    supervisor.advance(PipelineState::Done);

    info!(
        "網格預覽圖已建立: {} ({}/{} 格)",
        final_path.display(),
        report.placed,
        grid_size * grid_size
    );
    Ok(GridReport {
        output_path: final_path,
        grid_size,
        tile_size,
        extraction,
        placed: report.placed,
    })
}
