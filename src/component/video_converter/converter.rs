use crate::config::{Config, ConversionSettings, FileTypeTable};
use crate::error::{CodecError, MediaError, MediaResult};
use crate::outcome::{BatchResult, Outcome};
use crate::pipeline::{PipelineState, RunSupervisor};
use crate::tools::{
    ConvertRequest, FfmpegCommand, GatedJob, StagingArea, ToolCommand, VideoEncoder, VideoInfo,
    move_file, probe_video, run_gated, scan_media,
};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 轉檔方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// 編碼與容器都相容
    Unchanged,
    /// 只更換容器，視訊直接複製
    Remux,
    /// 視訊重新編碼
    Transcode,
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "不需轉檔"),
            Self::Remux => write!(f, "更換容器"),
            Self::Transcode => write!(f, "重新編碼"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub settings: ConversionSettings,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub probe_timeout: Duration,
    pub staging_root: Option<PathBuf>,
}

impl ConversionOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.settings.tools;
        Self {
            settings: config.settings.conversion.clone(),
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
            probe_timeout: tools.timeout(),
            staging_root: None,
        }
    }
}

/// 依視訊編碼與副檔名決定轉檔方式
#[must_use]
pub fn conversion_kind(codec: &str, video: &Path, settings: &ConversionSettings) -> ConversionKind {
    let codec_supported = settings
        .supported_codecs
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(codec));
    let extension = video
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let container_supported = settings
        .supported_extensions
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(&extension));

    match (codec_supported, container_supported) {
        (false, _) => ConversionKind::Transcode,
        (true, false) => ConversionKind::Remux,
        (true, true) => ConversionKind::Unchanged,
    }
}

/// 依影片長度選擇編碼速度，越長的影片用越快的 preset
#[must_use]
pub fn preset_for_duration(seconds: f64) -> &'static str {
    match seconds {
        s if s < 60.0 => "slow",
        s if s < 120.0 => "medium",
        s if s < 240.0 => "fast",
        s if s < 600.0 => "veryfast",
        _ => "ultrafast",
    }
}

/// ffmpeg `creation_time` 使用的格式，例如 `2021-05-01T08:30:00.000000Z`
#[must_use]
pub fn format_creation_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// 檔案修改時間與建立時間中較早的一個
fn file_creation_time(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = fs::metadata(path).ok()?;
    [metadata.modified().ok(), metadata.created().ok()]
        .into_iter()
        .flatten()
        .min()
        .map(DateTime::<Utc>::from)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string())
}

/// 單部影片的轉檔計畫
#[derive(Debug, Clone)]
pub struct ConversionPlan {
    pub kind: ConversionKind,
    pub preset: &'static str,
    /// 音訊已是目標編碼時直接複製
    pub copy_audio: bool,
    /// 影片標籤中最早的建立時間，沒有標籤時取檔案時間
    pub creation_time: Option<String>,
}

impl ConversionPlan {
    fn command(
        &self,
        ffmpeg: &FfmpegCommand,
        settings: &ConversionSettings,
        input_path: &Path,
        output_path: &Path,
    ) -> ToolCommand {
        let request = ConvertRequest {
            input_path,
            output_path,
            creation_time: self.creation_time.as_deref(),
            audio_encoder: (!self.copy_audio)
                .then_some((settings.audio_codec.as_str(), settings.audio_bitrate.as_str())),
            video_encoder: (self.kind == ConversionKind::Transcode).then_some(VideoEncoder {
                codec: &settings.video_codec,
                preset: self.preset,
                crf: settings.crf,
            }),
        };
        ffmpeg.convert(&request)
    }
}

#[must_use]
pub fn plan_conversion(
    video: &Path,
    info: &VideoInfo,
    settings: &ConversionSettings,
) -> ConversionPlan {
    ConversionPlan {
        kind: conversion_kind(&info.codec, video, settings),
        preset: preset_for_duration(info.duration_seconds),
        copy_audio: info
            .audio_codec
            .as_deref()
            .is_some_and(|codec| codec.eq_ignore_ascii_case(&settings.audio_codec)),
        creation_time: info
            .creation_time
            .or_else(|| file_creation_time(video))
            .map(format_creation_time),
    }
}

/// 影片旁不會覆寫既有檔案的輸出路徑
///
/// 依序嘗試 `<stem>.mp4`、`<stem>.convert.mp4`、`<stem>.convert_2.mp4`…，
/// 略過來源本身、`taken` 中已分配的路徑與已存在的檔案。
#[must_use]
pub fn unique_target(video: &Path, taken: &HashSet<PathBuf>) -> PathBuf {
    let parent = video.parent().unwrap_or(Path::new("."));
    let stem = file_stem(video);
    let is_free = |candidate: &Path| {
        candidate != video && !taken.contains(candidate) && !candidate.exists()
    };

    let preferred = parent.join(format!("{stem}.mp4"));
    if is_free(preferred.as_path()) {
        return preferred;
    }

    let mut candidate = parent.join(format!("{stem}.convert.mp4"));
    let mut counter = 2;
    while !is_free(candidate.as_path()) {
        candidate = parent.join(format!("{stem}.convert_{counter}.mp4"));
        counter += 1;
    }
    candidate
}

#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// 不需轉檔時就是來源路徑
    pub output_path: PathBuf,
    pub kind: ConversionKind,
    pub preset: Option<&'static str>,
    pub creation_time: Option<String>,
}

#[derive(Debug)]
pub struct FolderConversionReport {
    /// 與掃描到的影片一一對應；不需轉檔的項目回報來源路徑
    pub batch: BatchResult,
    pub converted: usize,
    pub skipped: usize,
}

fn missing_output(command: &ToolCommand, staged: &Path) -> MediaError {
    MediaError::from(CodecError {
        tool: command.program_name(),
        exit_code: Some(0),
        message: format!("未產生輸出檔 {}", staged.display()),
    })
}

/// 轉換單部影片
///
/// 輸出先寫到暫存區，完成後才搬到目的地；不需轉檔時直接回傳來源路徑。
pub async fn convert_video(
    video: &Path,
    output_path: Option<&Path>,
    options: &ConversionOptions,
    shutdown_signal: Arc<AtomicBool>,
) -> MediaResult<ConversionReport> {
    let label = video
        .file_name()
        .map_or_else(|| "convert".to_string(), |n| n.to_string_lossy().to_string());
    let mut supervisor = RunSupervisor::new(label);

    supervisor.advance(PipelineState::Sampling);
    let info = probe_video(&options.ffprobe, video, options.probe_timeout)
        .await
        .map_err(|e| supervisor.fail(e))?;
    let plan = plan_conversion(video, &info, &options.settings);

    if plan.kind == ConversionKind::Unchanged {
        info!("{} 不需要轉檔 ({})", video.display(), info.codec);
        return Ok(ConversionReport {
            output_path: video.to_path_buf(),
            kind: plan.kind,
            preset: None,
            creation_time: plan.creation_time,
        });
    }

    let staging = StagingArea::create(options.staging_root.as_deref(), "convert")
        .map_err(|e| supervisor.fail(e))?;
    let staged = staging.file(&format!("{}.temp.mp4", file_stem(video)));

    supervisor.advance(PipelineState::Dispatching);
    let ffmpeg = FfmpegCommand::new(options.ffmpeg.clone(), options.settings.timeout());
    let command = plan.command(&ffmpeg, &options.settings, video, &staged);
    info!(
        "{}: {} ({} -> {}, preset {})",
        video.display(),
        plan.kind,
        info.codec,
        options.settings.video_codec,
        plan.preset
    );
    command
        .execute(Some(shutdown_signal.as_ref()))
        .await
        .map_err(|e| supervisor.fail(e))?;

    supervisor.advance(PipelineState::Collecting);
    if !staged.is_file() {
        return Err(supervisor.fail(missing_output(&command, &staged)));
    }

    supervisor.advance(PipelineState::Finalizing);
    let final_path = output_path
        .map_or_else(|| unique_target(video, &HashSet::new()), Path::to_path_buf);
    if let Some(parent) = final_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| supervisor.fail(MediaError::io(parent, e)))?;
    }
    move_file(&staged, &final_path).map_err(|e| supervisor.fail(e))?;

    if let Err(e) = staging.close() {
        warn!("無法移除暫存區: {e}");
    }
    supervisor.advance(PipelineState::Done);

    info!("已轉檔: {} -> {}", video.display(), final_path.display());
    Ok(ConversionReport {
        output_path: final_path,
        kind: plan.kind,
        preset: (plan.kind == ConversionKind::Transcode).then_some(plan.preset),
        creation_time: plan.creation_time,
    })
}

/// 轉換資料夾第一層的所有影片
///
/// 先以 ffprobe 讀取每部影片並分配輸出路徑，再經由有上限的排程器同時執行 ffmpeg。
/// 單部影片失敗只會成為該項的 [`Outcome::Failed`]。
pub async fn convert_folder(
    folder: &Path,
    file_types: &FileTypeTable,
    options: &ConversionOptions,
    shutdown_signal: Arc<AtomicBool>,
) -> MediaResult<FolderConversionReport> {
    let mut supervisor = RunSupervisor::new(format!("convert:{}", folder.display()));

    supervisor.advance(PipelineState::Sampling);
    let videos = scan_media(folder, false, |path| file_types.is_video_file(path))
        .map_err(|e| supervisor.fail(e))?;
    if videos.is_empty() {
        return Err(supervisor.fail(MediaError::InsufficientInput(format!(
            "資料夾中沒有影片: {}",
            folder.display()
        ))));
    }

    let started = Instant::now();
    let staging = StagingArea::create(options.staging_root.as_deref(), "convert")
        .map_err(|e| supervisor.fail(e))?;
    let ffmpeg = FfmpegCommand::new(options.ffmpeg.clone(), options.settings.timeout());

    let mut outcomes: Vec<Outcome> = Vec::with_capacity(videos.len());
    let mut jobs: Vec<GatedJob> = Vec::new();
    let mut targets: Vec<(usize, PathBuf)> = Vec::new();
    let mut taken: HashSet<PathBuf> = HashSet::new();
    let mut skipped = 0;

    for (index, video) in videos.iter().enumerate() {
        if shutdown_signal.load(Ordering::SeqCst) {
            return Err(supervisor.fail(MediaError::Cancelled));
        }

        let info = match probe_video(&options.ffprobe, video, options.probe_timeout).await {
            Ok(info) => info,
            Err(e) => {
                warn!("無法讀取影片資訊 {}: {e}", video.display());
                outcomes.push(Outcome::failed(&e));
                continue;
            }
        };

        let plan = plan_conversion(video, &info, &options.settings);
        if plan.kind == ConversionKind::Unchanged {
            debug!("{} 不需要轉檔", video.display());
            skipped += 1;
            outcomes.push(Outcome::Success(vec![video.clone()]));
            continue;
        }

        let target = unique_target(video, &taken);
        taken.insert(target.clone());
        let staged = staging.file(&format!("{index:04}_{}.temp.mp4", file_stem(video)));
        debug!("{}: {} -> {}", video.display(), plan.kind, target.display());
        jobs.push(GatedJob::new(
            plan.command(&ffmpeg, &options.settings, video, &staged),
            staged,
        ));
        targets.push((index, target));
        // 派送完成後以實際結果取代
        outcomes.push(Outcome::failed(&MediaError::Cancelled));
    }

    supervisor.advance(PipelineState::Dispatching);
    info!(
        "開始轉檔: {} 部需要轉檔，{skipped} 部略過",
        jobs.len()
    );
    let results = run_gated(
        jobs,
        options.settings.max_parallel,
        Arc::clone(&shutdown_signal),
    )
    .await;

    supervisor.advance(PipelineState::Collecting);
    if shutdown_signal.load(Ordering::SeqCst) {
        warn!("收到中斷訊號，捨棄 {} 的轉檔結果", folder.display());
        return Err(supervisor.fail(MediaError::Cancelled));
    }

    supervisor.advance(PipelineState::Finalizing);
    let mut converted = 0;
    for ((index, target), result) in targets.into_iter().zip(results) {
        outcomes[index] = match result.first_path() {
            Some(staged) => match move_file(&staged, &target) {
                Ok(()) => {
                    converted += 1;
                    info!("已轉檔: {} -> {}", videos[index].display(), target.display());
                    Outcome::Success(vec![target])
                }
                Err(e) => {
                    error!("{e}");
                    Outcome::failed(&e)
                }
            },
            None => result,
        };
    }

    if let Err(e) = staging.close() {
        warn!("無法移除暫存區: {e}");
    }
    supervisor.advance(PipelineState::Done);

    let batch = BatchResult::new(outcomes, started.elapsed());
    info!(
        "轉檔完成: 轉檔 {converted}, 略過 {skipped}, 失敗 {}，耗時 {:.2}s",
        batch.failed_count(),
        batch.elapsed.as_secs_f64()
    );
    Ok(FolderConversionReport {
        batch,
        converted,
        skipped,
    })
}
