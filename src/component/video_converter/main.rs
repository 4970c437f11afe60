use super::converter::{ConversionKind, ConversionOptions, convert_folder, convert_video};
use crate::config::Config;
use crate::outcome::Outcome;
use crate::tools::normalize_input_path;
use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 影片轉檔（H.264 / MP4）
pub struct VideoConverter {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl VideoConverter {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影片轉檔 ===").cyan().bold());

        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("請輸入影片檔案或資料夾路徑")
            .interact_text()?;
        let path = normalize_input_path(&path);

        let options = ConversionOptions::from_config(&self.config);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        if path.is_dir() {
            self.run_folder(&runtime, &path, &options)
        } else if path.is_file() {
            self.run_single(&runtime, &path, &options)
        } else {
            bail!("路徑不存在: {}", path.display())
        }
    }

    fn run_single(
        &self,
        runtime: &tokio::runtime::Runtime,
        video: &Path,
        options: &ConversionOptions,
    ) -> Result<()> {
        let report = runtime
            .block_on(convert_video(
                video,
                None,
                options,
                Arc::clone(&self.shutdown_signal),
            ))
            .with_context(|| format!("無法轉檔: {}", video.display()))?;

        if report.kind == ConversionKind::Unchanged {
            println!("\n{} 編碼與容器皆相容，不需轉檔", style("✓").green());
        } else {
            println!(
                "\n{} {} ({})",
                style("✓ 已轉檔:").green(),
                report.output_path.display(),
                report.kind
            );
        }
        Ok(())
    }

    fn run_folder(
        &self,
        runtime: &tokio::runtime::Runtime,
        folder: &Path,
        options: &ConversionOptions,
    ) -> Result<()> {
        let report = runtime
            .block_on(convert_folder(
                folder,
                &self.config.file_type_table,
                options,
                Arc::clone(&self.shutdown_signal),
            ))
            .with_context(|| format!("無法轉檔: {}", folder.display()))?;

        println!("\n{}", style("=== 轉檔結果 ===").cyan().bold());
        println!("  總計: {}", report.batch.total());
        println!("  {} {}", style("已轉檔:").green(), report.converted);
        println!("  {} {}", style("略過:").dim(), report.skipped);
        println!("  {} {}", style("失敗:").red(), report.batch.failed_count());
        for outcome in &report.batch.outcomes {
            if let Outcome::Failed { reason, .. } = outcome {
                println!("    {} {reason}", style("✗").red());
            }
        }
        Ok(())
    }
}
