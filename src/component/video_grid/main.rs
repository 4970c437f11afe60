use super::grid_generator::{GridOptions, default_grid_path, generate_grid};
use crate::config::Config;
use crate::error::MediaError;
use crate::tools::{
    ensure_directory_exists, normalize_input_path, scan_media, validate_directory_exists,
};
use anyhow::Result;
use console::style;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 網格生成結果
#[derive(Debug, Default)]
pub struct GridGenerationResult {
    pub total_videos: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 影片網格預覽圖
///
/// 逐一處理資料夾中的影片；每部影片內的影格擷取以有上限的並行度進行。
pub struct VideoGridGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl VideoGridGenerator {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影片網格預覽圖 ===").cyan().bold());

        let input_dir = self.prompt_path("請輸入影片資料夾路徑", false)?;
        validate_directory_exists(&input_dir)?;

        let output_dir = self.prompt_path("輸出資料夾路徑（留空則輸出在影片旁）", true)?;
        let output_dir = (!output_dir.as_os_str().is_empty()).then_some(output_dir);
        if let Some(dir) = &output_dir {
            ensure_directory_exists(dir)?;
        }

        println!("{}", style("掃描影片檔案中...").dim());
        let table = &self.config.file_type_table;
        let videos = scan_media(&input_dir, true, |path| table.is_video_file(path))?;
        if videos.is_empty() {
            println!("{}", style("找不到任何影片檔案").yellow());
            return Ok(());
        }
        println!("{}", style(format!("找到 {} 個影片檔案", videos.len())).green());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let result = runtime.block_on(self.process_videos(&videos, output_dir.as_deref()));

        self.print_summary(&result);
        Ok(())
    }

    fn prompt_path(&self, prompt: &str, allow_empty: bool) -> Result<PathBuf> {
        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty(allow_empty)
            .interact_text()?;
        Ok(normalize_input_path(&path))
    }

    async fn process_videos(
        &self,
        videos: &[PathBuf],
        output_dir: Option<&Path>,
    ) -> GridGenerationResult {
        let options = GridOptions::from_config(&self.config);
        let mut result = GridGenerationResult {
            total_videos: videos.len(),
            ..GridGenerationResult::default()
        };

        for (index, video) in videos.iter().enumerate() {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("收到中斷訊號，停止處理");
                break;
            }

            let default_path = default_grid_path(video);
            let output_path = match (output_dir, default_path.file_name()) {
                (Some(dir), Some(name)) => dir.join(name),
                _ => default_path,
            };

            println!(
                "\n{} [{}/{}] {}",
                style("處理中").cyan(),
                index + 1,
                videos.len(),
                style(video.display()).bold()
            );

            if output_path.exists() {
                println!("  {} 網格預覽圖已存在，跳過", style("⤳").dim());
                result.skipped += 1;
                continue;
            }

            match generate_grid(
                video,
                Some(&output_path),
                &options,
                Arc::clone(&self.shutdown_signal),
            )
            .await
            {
                Ok(report) => {
                    println!(
                        "  {} {}x{} 網格，{} 格 ({} 失敗)",
                        style("✓").green(),
                        report.grid_size,
                        report.grid_size,
                        report.placed,
                        report.extraction.failed_count()
                    );
                    result.successful += 1;
                }
                Err(MediaError::InsufficientInput(reason)) => {
                    println!("  {} {reason}", style("⤳").dim());
                    result.skipped += 1;
                }
                Err(MediaError::Cancelled) => {
                    println!("  {} 已中斷", style("✗").red());
                    result.failed += 1;
                    break;
                }
                Err(e) => {
                    error!("處理影片失敗 {}: {e}", video.display());
                    println!("  {} 處理失敗: {e}", style("✗").red());
                    result.failed += 1;
                }
            }
        }

        result
    }

    fn print_summary(&self, result: &GridGenerationResult) {
        println!();
        println!("{}", style("=== 網格預覽圖摘要 ===").cyan().bold());
        println!("  總計: {} 個影片", result.total_videos);
        println!("  成功: {} 個", style(result.successful).green());

        if result.skipped > 0 {
            println!("  跳過: {} 個", style(result.skipped).yellow());
        }

        if result.failed > 0 {
            println!("  失敗: {} 個", style(result.failed).red());
        }

        info!(
            "網格預覽圖完成 - 成功: {}, 跳過: {}, 失敗: {}",
            result.successful, result.skipped, result.failed
        );
    }
}
