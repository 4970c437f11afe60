use super::thumbnail_generator::{ThumbnailOptions, default_thumbnail_path, generate_thumbnail};
use crate::config::Config;
use crate::tools::{normalize_input_path, validate_file_exists};
use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 影片封面縮圖
pub struct VideoThumbnailGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl VideoThumbnailGenerator {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影片封面縮圖 ===").cyan().bold());

        let theme = ColorfulTheme::default();
        let video: String = Input::with_theme(&theme)
            .with_prompt("請輸入影片檔案路徑")
            .interact_text()?;
        let video = normalize_input_path(&video);
        validate_file_exists(&video)?;

        let output: String = Input::with_theme(&theme)
            .with_prompt("輸出檔案路徑")
            .default(default_thumbnail_path(&video).to_string_lossy().to_string())
            .interact_text()?;
        let output = normalize_input_path(&output);

        let options = ThumbnailOptions::from_config(&self.config);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let report = runtime
            .block_on(generate_thumbnail(
                &video,
                Some(&output),
                &options,
                Arc::clone(&self.shutdown_signal),
            ))
            .with_context(|| format!("無法產生封面縮圖: {}", video.display()))?;

        println!(
            "\n{} {} (取自 {:.1} 秒，嘗試 {} 次)",
            style("✓").green(),
            report.output_path.display(),
            report.timestamp,
            report.attempts
        );
        Ok(())
    }
}
