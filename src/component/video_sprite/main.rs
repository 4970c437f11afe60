use super::sprite_generator::{SpriteOptions, generate_sprites};
use crate::config::Config;
use crate::tools::{normalize_input_path, validate_file_exists};
use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 預設輸出資料夾：影片旁的 `<stem>_sprites/`
#[must_use]
pub fn default_sprite_dir(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
    video_path.with_file_name(format!("{stem}_sprites"))
}

/// 影片縮圖表（播放器拖曳預覽用）
pub struct VideoSpriteGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl VideoSpriteGenerator {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影片縮圖表 ===").cyan().bold());

        let video: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("請輸入影片檔案路徑")
            .interact_text()?;
        let video = normalize_input_path(&video);
        validate_file_exists(&video)?;

        let default_dir = default_sprite_dir(&video);
        let output: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("輸出資料夾路徑")
            .default(default_dir.to_string_lossy().to_string())
            .interact_text()?;
        let output_dir = normalize_input_path(&output);

        let options = SpriteOptions::from_config(&self.config);
        println!(
            "{}",
            style(format!(
                "每 {} 秒一張，{}x{} 網格",
                options.interval, options.grid_size, options.grid_size
            ))
            .dim()
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let report = runtime
            .block_on(generate_sprites(
                &video,
                &output_dir,
                &options,
                Arc::clone(&self.shutdown_signal),
            ))
            .with_context(|| format!("無法產生縮圖表: {}", video.display()))?;

        println!(
            "\n{} {} 張縮圖表，{} 筆時間軸",
            style("✓").green(),
            report.sheets.len(),
            report.cue_count
        );
        for sheet in &report.sheets {
            println!("  {}", sheet.display());
        }
        println!("  {}", report.cue_document.display());

        let failed = report.generation.failed_count();
        if failed > 0 {
            println!(
                "  {} {failed} 張縮圖表產生失敗，未列入時間軸",
                style("!").yellow()
            );
        }
        Ok(())
    }
}
