use crate::config::Config;
use crate::error::{MediaError, MediaResult};
use crate::outcome::BatchResult;
use crate::pipeline::{PipelineState, RunSupervisor};
use crate::tools::sampling::{orient, scale_long_edge, sprite_plan};
use crate::tools::timeline::{
    SpriteGeometry, build_cues, cue_document_name, sheet_file_name, write_cue_document,
};
use crate::tools::{
    FfmpegCommand, GatedJob, SheetRange, StagingArea, TileSheetRequest, move_all, probe_video,
    run_gated,
};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SpriteOptions {
    pub grid_size: u32,
    /// 取樣間隔（秒）
    pub interval: f64,
    pub max_tile_size: u32,
    /// ffmpeg `-q:v`
    pub quality: u8,
    pub output_prefix: String,
    pub max_parallel: usize,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub timeout: Duration,
    pub staging_root: Option<PathBuf>,
}

impl SpriteOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let settings = &config.settings;
        Self {
            grid_size: settings.sprite.grid_size,
            interval: settings.sprite.interval,
            max_tile_size: settings.sprite.max_tile_size,
            quality: settings.sprite.quality,
            output_prefix: settings.sprite.output_prefix.clone(),
            max_parallel: settings.sprite.max_parallel,
            ffmpeg: settings.tools.ffmpeg.clone(),
            ffprobe: settings.tools.ffprobe.clone(),
            timeout: settings.tools.timeout(),
            staging_root: None,
        }
    }
}

#[derive(Debug)]
pub struct SpriteReport {
    pub sheets: Vec<PathBuf>,
    pub cue_document: PathBuf,
    pub tile_size: (u32, u32),
    pub cue_count: usize,
    pub generation: BatchResult,
}

/// 產生縮圖表與 WebVTT 時間軸
///
/// 每張縮圖表是一次 ffmpeg 呼叫。失敗的縮圖表不會出現在時間軸中；
/// 全部失敗時回傳 [`MediaError::InsufficientInput`]。
pub async fn generate_sprites(
    video_path: &Path,
    output_dir: &Path,
    options: &SpriteOptions,
    shutdown_signal: Arc<AtomicBool>,
) -> MediaResult<SpriteReport> {
    let label = video_path
        .file_name()
        .map_or_else(|| "sprite".to_string(), |n| n.to_string_lossy().to_string());
    let mut supervisor = RunSupervisor::new(label);

    supervisor.advance(PipelineState::Sampling);
    let info = probe_video(&options.ffprobe, video_path, options.timeout)
        .await
        .map_err(|e| supervisor.fail(e))?;

    let plan = sprite_plan(info.duration_seconds, options.interval, options.grid_size);
    if plan.sheets.is_empty() {
        return Err(supervisor.fail(MediaError::InsufficientInput(format!(
            "無法產生縮圖表（長度 {:.1} 秒，間隔 {} 秒）",
            info.duration_seconds, options.interval
        ))));
    }

    let tile_size = orient(
        scale_long_edge(info.width, info.height, options.max_tile_size),
        info.is_sideways(),
    );
    info!(
        "{}: {} 個縮圖，{} 張縮圖表，圖塊 {}x{}",
        video_path.display(),
        plan.total_instants,
        plan.sheets.len(),
        tile_size.0,
        tile_size.1
    );

    let staging = StagingArea::create(options.staging_root.as_deref(), "sprite")
        .map_err(|e| supervisor.fail(e))?;

    supervisor.advance(PipelineState::Dispatching);
    let ffmpeg = FfmpegCommand::new(options.ffmpeg.clone(), options.timeout);
    let jobs: Vec<GatedJob> = plan
        .sheets
        .iter()
        .map(|range| {
            let output = staging.file(&sheet_file_name(&options.output_prefix, range.sheet_index));
            let command = ffmpeg.tile_sheet(&TileSheetRequest {
                video_path,
                output_path: &output,
                start_time: range.start_time(options.interval),
                interval: options.interval,
                tile_count: range.tile_count(),
                tile_width: tile_size.0,
                tile_height: tile_size.1,
                grid_size: options.grid_size,
                quality: options.quality,
            });
            GatedJob::new(command, output)
        })
        .collect();

    supervisor.advance(PipelineState::Collecting);
    let started = Instant::now();
    let outcomes = run_gated(jobs, options.max_parallel, Arc::clone(&shutdown_signal)).await;
    let generation = BatchResult::new(outcomes, started.elapsed());

    if shutdown_signal.load(Ordering::SeqCst) {
        warn!("收到中斷訊號，捨棄 {} 的縮圖表", video_path.display());
        return Err(supervisor.fail(MediaError::Cancelled));
    }

    let produced: Vec<(SheetRange, PathBuf)> = plan
        .sheets
        .iter()
        .zip(&generation.outcomes)
        .filter_map(|(range, outcome)| outcome.first_path().map(|path| (*range, path)))
        .collect();
    if produced.is_empty() {
        return Err(supervisor.fail(MediaError::InsufficientInput(
            "所有縮圖表都產生失敗".to_string(),
        )));
    }
    for (range, outcome) in plan.sheets.iter().zip(&generation.outcomes) {
        if !outcome.is_usable() {
            warn!("縮圖表 {} 產生失敗，不列入時間軸", range.sheet_index + 1);
        }
    }

    supervisor.advance(PipelineState::Composing);
    let geometry = SpriteGeometry {
        interval: options.interval,
        tile_width: tile_size.0,
        tile_height: tile_size.1,
        grid_size: options.grid_size,
        prefix: options.output_prefix.clone(),
        total_duration: info.duration_seconds,
    };
    let ranges: Vec<SheetRange> = produced.iter().map(|(range, _)| *range).collect();
    let cues = build_cues(&ranges, &geometry);

    supervisor.advance(PipelineState::Finalizing);
    let staged_cues = write_cue_document(staging.path(), &options.output_prefix, &cues)
        .map_err(|e| supervisor.fail(e))?;
    fs::create_dir_all(output_dir).map_err(|e| supervisor.fail(MediaError::io(output_dir, e)))?;

    let mut moves: Vec<(PathBuf, PathBuf)> = produced
        .iter()
        .filter_map(|(_, staged)| {
            staged
                .file_name()
                .map(|name| (staged.clone(), output_dir.join(name)))
        })
        .collect();
    let sheets: Vec<PathBuf> = moves.iter().map(|(_, target)| target.clone()).collect();
    let cue_document = output_dir.join(cue_document_name(&options.output_prefix));
    moves.push((staged_cues, cue_document.clone()));

    move_all(&moves).map_err(|e| supervisor.fail(e))?;

    if let Err(e) = staging.close() {
        warn!("無法移除暫存區: {e}");
    }
    supervisor.advance(PipelineState::Done);

    info!(
        "已產生 {} 張縮圖表與時間軸 {}",
        sheets.len(),
        cue_document.display()
    );
    Ok(SpriteReport {
        sheets,
        cue_document,
        tile_size,
        cue_count: cues.len(),
        generation,
    })
}
