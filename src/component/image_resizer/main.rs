use super::resize_pool::{ResizeOptions, ResizePool};
use super::set_resizer::{SetResizeReport, resize_set};
use super::tier::QualityTier;
use crate::config::save::{add_recent_path, save_settings};
use crate::config::{Config, SETTINGS_FILE};
use crate::error::MediaError;
use crate::outcome::{BatchResult, Outcome};
use crate::tools::{normalize_input_path, validate_directory_exists};
use anyhow::{Result, bail};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, MultiSelect};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 影像集批次縮圖
///
/// 輸入資料夾本身含有影像時視為一個影像集；否則把每個子資料夾各自視為一個影像集。
pub struct ImageResizer {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl ImageResizer {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影像集批次縮圖 ===").cyan().bold());

        let input_dir = self.prompt_input_path()?;
        validate_directory_exists(&input_dir)?;

        // 更新路徑歷史並儲存
        {
            let mut settings = self.config.settings.clone();
            add_recent_path(&mut settings, &input_dir.to_string_lossy());
            if let Err(e) = save_settings(&settings, Path::new(SETTINGS_FILE)) {
                warn!("無法儲存路徑歷史: {e}");
            }
        }

        let tiers = self.prompt_tiers()?;
        if tiers.is_empty() {
            bail!("至少需要選擇一個縮圖等級");
        }

        let sets = self.collect_sets(&input_dir)?;
        if sets.is_empty() {
            println!("{}", style("找不到任何影像集").yellow());
            return Ok(());
        }
        println!("{}", style(format!("找到 {} 個影像集", sets.len())).green());

        let pool = ResizePool::new(
            ResizeOptions::from_config(&self.config),
            Arc::clone(&self.shutdown_signal),
        );

        let mut summary = ResizeSummary::default();
        for (index, set_dir) in sets.iter().enumerate() {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("收到中斷訊號，停止處理");
                break;
            }

            println!(
                "\n{} [{}/{}] {}",
                style("處理中").cyan(),
                index + 1,
                sets.len(),
                style(set_dir.display()).bold()
            );

            match resize_set(&pool, set_dir, &tiers, &self.config.file_type_table) {
                Ok(SetResizeReport::AlreadyResized) => {
                    println!("  {} 已縮圖，跳過", style("⤳").dim());
                    summary.skipped_sets += 1;
                }
                Ok(SetResizeReport::Processed(result)) => {
                    Self::print_batch(&result);
                    summary.add(&result);
                }
                Err(MediaError::InsufficientInput(reason)) => {
                    println!("  {} {reason}", style("⤳").dim());
                    summary.skipped_sets += 1;
                }
                Err(e) => {
                    error!("影像集處理失敗 {}: {e}", set_dir.display());
                    println!("  {} 處理失敗: {e}", style("✗").red());
                    summary.failed_sets += 1;
                }
            }
        }

        summary.print();
        Ok(())
    }

    fn prompt_input_path(&self) -> Result<PathBuf> {
        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme).with_prompt("請輸入影像集資料夾路徑");
        if let Some(recent) = self.config.settings.recent_paths.first() {
            input = input.default(recent.clone());
        }
        let path = input.interact_text()?;
        Ok(normalize_input_path(&path))
    }

    fn prompt_tiers(&self) -> Result<Vec<QualityTier>> {
        let labels: Vec<&str> = QualityTier::ALL.iter().map(|t| t.label()).collect();
        let defaults: Vec<bool> = QualityTier::ALL
            .iter()
            .map(|t| self.config.settings.resize.tiers.contains(t))
            .collect();

        let selection = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt("選擇縮圖等級（空白鍵切換）")
            .items(&labels)
            .defaults(&defaults)
            .interact()?;

        Ok(selection.into_iter().map(|i| QualityTier::ALL[i]).collect())
    }

    fn collect_sets(&self, input_dir: &Path) -> Result<Vec<PathBuf>> {
        let table = &self.config.file_type_table;
        let has_images = fs::read_dir(input_dir)?
            .filter_map(std::result::Result::ok)
            .any(|entry| table.is_image_file(&entry.path()));
        if has_images {
            return Ok(vec![input_dir.to_path_buf()]);
        }

        let tier_folders: Vec<&str> = QualityTier::ALL.iter().map(|t| t.folder_name()).collect();
        let mut sets: Vec<PathBuf> = fs::read_dir(input_dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|n| !tier_folders.contains(&n.to_string_lossy().as_ref()))
            })
            .collect();
        sets.sort();
        Ok(sets)
    }

    fn print_batch(result: &BatchResult) {
        println!(
            "  {} 成功 {}，修復 {}，失敗 {}（{:.1} 張/秒）",
            style("✓").green(),
            result.success_count(),
            result.repaired_count(),
            result.failed_count(),
            result.items_per_second()
        );
        for outcome in &result.outcomes {
            if let Outcome::Failed { reason, .. } = outcome {
                println!("    {} {reason}", style("✗").red());
            }
        }
    }
}

#[derive(Debug, Default)]
struct ResizeSummary {
    images: usize,
    repaired: usize,
    failed: usize,
    skipped_sets: usize,
    failed_sets: usize,
}

impl ResizeSummary {
    fn add(&mut self, result: &BatchResult) {
        self.images += result.total();
        self.repaired += result.repaired_count();
        self.failed += result.failed_count();
    }

    fn print(&self) {
        println!();
        println!("{}", style("=== 縮圖摘要 ===").cyan().bold());
        println!("  影像: {} 張", self.images);
        if self.repaired > 0 {
            println!("  修復: {} 張", style(self.repaired).yellow());
        }
        if self.failed > 0 {
            println!("  失敗: {} 張", style(self.failed).red());
        }
        if self.skipped_sets > 0 {
            println!("  跳過影像集: {} 個", style(self.skipped_sets).yellow());
        }
        if self.failed_sets > 0 {
            println!("  失敗影像集: {} 個", style(self.failed_sets).red());
        }

        info!(
            "縮圖完成 - 影像: {}, 修復: {}, 失敗: {}, 跳過影像集: {}",
            self.images, self.repaired, self.failed, self.skipped_sets
        );
    }
}
