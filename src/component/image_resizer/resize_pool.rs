use super::repair::{RepairTool, is_corruption};
use super::tier::{ImageDimensions, QualityTier, assign_output_names, filter_tiers};
use crate::config::Config;
use crate::error::{MediaError, MediaResult};
use crate::outcome::{BatchResult, Outcome};
use crate::tools::composer::{WHITE, decode_oriented, flatten_to_rgb, write_jpeg};
use image::DynamicImage;
use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// 縮圖執行設定
#[derive(Debug, Clone)]
pub struct ResizeOptions {
    pub jpeg_quality: u8,
    /// 未設定時使用 `min(CPU 數 - 1, 項目數)`，至少 1
    pub max_workers: Option<usize>,
    /// 每處理多少張記錄一次進度
    pub progress_every: usize,
    pub repair: RepairTool,
    pub show_progress: bool,
}

impl ResizeOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let settings = &config.settings;
        Self {
            jpeg_quality: settings.resize.jpeg_quality,
            max_workers: settings.resize.max_workers,
            progress_every: settings.resize.progress_every,
            repair: RepairTool::new(
                settings.tools.repair.clone(),
                settings.tools.repair_timeout(),
            ),
            show_progress: true,
        }
    }
}

/// 固定大小的縮圖工作池
///
/// 每個工作執行緒獨立處理一張影像，不共享可變狀態。
/// 單張失敗只會變成 [`Outcome::Failed`]，不會中斷整批。
pub struct ResizePool {
    options: ResizeOptions,
    shutdown_signal: Arc<AtomicBool>,
}

impl ResizePool {
    pub const fn new(options: ResizeOptions, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            options,
            shutdown_signal,
        }
    }

    #[must_use]
    pub const fn options(&self) -> &ResizeOptions {
        &self.options
    }

    #[must_use]
    pub fn worker_count(&self, item_count: usize) -> usize {
        let available = std::thread::available_parallelism().map_or(1, std::num::NonZero::get);
        let limit = self
            .options
            .max_workers
            .unwrap_or_else(|| available.saturating_sub(1));
        limit.min(item_count).max(1)
    }

    /// 批次縮圖
    ///
    /// 輸出寫到各來源所在資料夾的等級子資料夾。輸出檔名在分派前一次決定，
    /// 不同來源不會寫到同一個檔案。回傳的結果與 `sources` 一一對應。
    pub fn resize_batch(&self, sources: &[PathBuf], tiers: &[QualityTier]) -> BatchResult {
        let started = Instant::now();
        let workers = self.worker_count(sources.len());
        info!("開始縮圖: {} 張，{workers} 個工作執行緒", sources.len());

        let progress_bar = self.progress_bar(sources.len());
        let processed = AtomicUsize::new(0);
        let every = self.options.progress_every.max(1);
        let total = sources.len();
        let names = assign_output_names(sources);

        let work = || -> Vec<Outcome> {
            sources
                .par_iter()
                .zip(names.par_iter())
                .map(|(source, name)| {
                    let outcome = self.process_item(source, name, tiers);
                    progress_bar.inc(1);
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % every == 0 {
                        info!("縮圖進度: {done}/{total}");
                    }
                    outcome
                })
                .collect()
        };

        let outcomes = match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("resize-{i}"))
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                warn!("無法建立工作池，改用全域執行緒池: {e}");
                work()
            }
        };

        if self.shutdown_signal.load(Ordering::SeqCst) {
            progress_bar.abandon_with_message("操作已中斷");
        } else {
            progress_bar.finish_with_message("完成");
        }

        let result = BatchResult::new(outcomes, started.elapsed());
        info!(
            "縮圖完成: 成功 {}, 修復 {}, 失敗 {}，耗時 {:.2}s ({:.1} 張/秒)",
            result.success_count(),
            result.repaired_count(),
            result.failed_count(),
            result.elapsed.as_secs_f64(),
            result.items_per_second()
        );
        result
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message("縮圖中...");
        bar
    }

    fn process_item(&self, source: &Path, file_name: &str, tiers: &[QualityTier]) -> Outcome {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Outcome::failed(&MediaError::Cancelled);
        }
        if !source.is_file() {
            let err = MediaError::InputMissing(source.to_path_buf());
            warn!("{err}");
            return Outcome::failed(&err);
        }

        let quality = self.options.jpeg_quality;
        match decode_oriented(source) {
            Ok(image) => match render_tiers(image, source, file_name, tiers, quality) {
                Ok(paths) => Outcome::Success(paths),
                Err(e) => {
                    error!("縮圖失敗 {}: {e}", source.display());
                    Outcome::failed(&e)
                }
            },
            Err(e) if is_corruption(&e) => {
                warn!("偵測到損毀影像 {}: {e}，嘗試修復", source.display());
                let retried = self.options.repair.repair_and_retry(source, |repaired| {
                    let image =
                        decode_oriented(repaired).map_err(|e| MediaError::decode(repaired, e))?;
                    render_tiers(image, repaired, file_name, tiers, quality)
                });
                match retried {
                    Ok(paths) => {
                        warn!("已修復並完成縮圖: {}", source.display());
                        Outcome::Repaired(paths)
                    }
                    Err(e) => {
                        error!("修復失敗 {}: {e}", source.display());
                        Outcome::failed(&e)
                    }
                }
            }
            Err(e) => {
                let err = MediaError::decode(source, e);
                error!("{err}");
                Outcome::failed(&err)
            }
        }
    }
}

/// 把一張已解碼的影像寫成各等級輸出
///
/// 影像只解碼一次；處理完畢即釋放。
fn render_tiers(
    image: DynamicImage,
    source: &Path,
    file_name: &str,
    tiers: &[QualityTier],
    quality: u8,
) -> MediaResult<Vec<PathBuf>> {
    let set_dir = source.parent().unwrap_or(Path::new("."));
    let dims = ImageDimensions::new(image.width(), image.height());
    let mut written = Vec::new();

    for tier in filter_tiers(tiers, dims) {
        let target = dims.fit_within(tier.max_dimension());
        let output_dir = tier.output_dir(set_dir);
        fs::create_dir_all(&output_dir).map_err(|e| MediaError::io(&output_dir, e))?;

        let rgb = if target == dims {
            flatten_to_rgb(&image, WHITE)
        } else {
            let resized = image.resize_exact(target.width, target.height, FilterType::Lanczos3);
            flatten_to_rgb(&resized, WHITE)
        };

        let output_path = output_dir.join(file_name);
        write_jpeg(&rgb, quality, &output_path)?;
        debug!("{} -> {}", source.display(), output_path.display());
        written.push(output_path);
    }

    drop(image);
    Ok(written)
}

/// 所有來源中最大的寬與高（無法讀取的檔案略過）
#[must_use]
pub fn get_max_dimensions(sources: &[PathBuf]) -> ImageDimensions {
    sources
        .par_iter()
        .filter_map(|path| match image::image_dimensions(path) {
            Ok((width, height)) => Some(ImageDimensions::new(width, height)),
            Err(e) => {
                warn!("無法讀取尺寸 {}: {e}", path.display());
                None
            }
        })
        .reduce(
            || ImageDimensions::new(0, 0),
            |a, b| ImageDimensions::new(a.width.max(b.width), a.height.max(b.height)),
        )
}
