use super::generator::{ImagePreviewOptions, generate_folder_preview};
use super::selector::SelectionStrategy;
use crate::config::Config;
use crate::tools::{normalize_input_path, validate_directory_exists};
use anyhow::{Context, Result};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;

/// 影像集網格預覽
pub struct ImagePreviewGenerator {
    config: Config,
}

impl ImagePreviewGenerator {
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影像集預覽圖 ===").cyan().bold());

        let folder = self.prompt_folder()?;
        validate_directory_exists(&folder)?;

        let mut options = ImagePreviewOptions::from_config(&self.config);
        options.strategy = self.prompt_strategy(options.strategy)?;
        options.recursive = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("是否包含子資料夾？（略過 m、x、xl、.previews、.covers）")
            .default(options.recursive)
            .interact()?;
        options.randomize = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("挑選前是否打亂順序？")
            .default(options.randomize)
            .interact()?;

        let output: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("輸出檔案路徑（留空使用預設位置）")
            .allow_empty(true)
            .interact_text()?;
        let output = (!output.trim().is_empty()).then(|| normalize_input_path(&output));

        let report = generate_folder_preview(
            &folder,
            output.as_deref(),
            &options,
            &self.config.file_type_table,
        )
        .with_context(|| format!("無法產生預覽圖: {}", folder.display()))?;

        println!(
            "\n{} {}",
            style("✓ 預覽圖已建立:").green(),
            report.output_path.display()
        );
        println!(
            "  版面: {}x{}，使用 {}/{} 張",
            report.rows, report.cols, report.selected, report.total
        );
        if report.compose.skipped > 0 {
            println!(
                "  {} {} 張影像無法讀取，保留空白",
                style("!").yellow(),
                report.compose.skipped
            );
        }
        Ok(())
    }

    fn prompt_folder(&self) -> Result<PathBuf> {
        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("請輸入影像集資料夾路徑")
            .interact_text()?;
        Ok(normalize_input_path(&path))
    }

    fn prompt_strategy(&self, current: SelectionStrategy) -> Result<SelectionStrategy> {
        let items: Vec<String> = SelectionStrategy::ALL.iter().map(ToString::to_string).collect();
        let default_index = SelectionStrategy::ALL
            .iter()
            .position(|s| *s == current)
            .unwrap_or(0);

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("選擇挑選方式")
            .items(&items)
            .default(default_index)
            .interact()?;
        Ok(SelectionStrategy::ALL[selection])
    }
}
