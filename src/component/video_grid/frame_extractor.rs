use crate::outcome::{BatchResult, Outcome};
use crate::tools::{FfmpegCommand, GatedJob, SampleSet, StagingArea, run_gated};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// 影格檔名：依取樣順序編號，三位數補零
#[must_use]
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{index:03}.jpg")
}

/// 每個取樣點一個擷取工作，輸出都寫在暫存區內
#[must_use]
pub fn extraction_jobs(
    ffmpeg: &FfmpegCommand,
    video_path: &Path,
    samples: &SampleSet,
    (width, height): (u32, u32),
    staging: &StagingArea,
) -> Vec<GatedJob> {
    samples
        .as_slice()
        .iter()
        .enumerate()
        .map(|(index, timestamp)| {
            let output = staging.file(&frame_file_name(index));
            let command = ffmpeg.extract_frame(video_path, *timestamp, width, height, &output);
            GatedJob::new(command, output)
        })
        .collect()
}

/// 擷取全部影格，最多同時 `max_parallel` 個
///
/// 擷取失敗的取樣點在結果中為 `Failed`，合成時留空。
pub async fn extract_frames(
    jobs: Vec<GatedJob>,
    max_parallel: usize,
    shutdown_signal: Arc<AtomicBool>,
) -> BatchResult {
    let started = Instant::now();
    let total = jobs.len();
    let outcomes = run_gated(jobs, max_parallel, shutdown_signal).await;
    let result = BatchResult::new(outcomes, started.elapsed());
    debug!(
        "影格擷取: {}/{total} 成功，耗時 {:.2}s",
        result.success_count(),
        result.elapsed.as_secs_f64()
    );
    result
}

/// 依原始順序列出擷取到的影格，失敗的位置為 `None`
#[must_use]
pub fn artifact_slots(result: &BatchResult) -> Vec<Option<PathBuf>> {
    result.outcomes.iter().map(Outcome::first_path).collect()
}
