use crate::component::image_preview::SelectionStrategy;
use crate::component::image_resizer::QualityTier;
use crate::config::save::save_settings;
use crate::config::{Config, SETTINGS_FILE};
use crate::menu::handlers::{
    run_image_preview, run_image_resizer, run_video_converter, run_video_grid, run_video_sprite,
    run_video_thumbnail,
};
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{MultiSelect, Select};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const ESC_HINT: &str = "（按 ESC 返回）";

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 媒體衍生檔產生工具 ===").cyan().bold());
    println!("{}", style(ESC_HINT).dim());

    let options = [
        "影像集批次縮圖",
        "影像集預覽圖",
        "影片網格預覽圖",
        "影片縮圖表（WebVTT）",
        "影片封面縮圖",
        "影片轉檔（H.264 / MP4）",
        "設定",
        "離開",
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => run_image_resizer(term, shutdown_signal, config)?,
        Some(1) => run_image_preview(term, config)?,
        Some(2) => run_video_grid(term, shutdown_signal, config)?,
        Some(3) => run_video_sprite(term, shutdown_signal, config)?,
        Some(4) => run_video_thumbnail(term, shutdown_signal, config)?,
        Some(5) => run_video_converter(term, shutdown_signal, config)?,
        Some(6) => show_settings_menu(term, config)?,
        _ => return Ok(false), // 離開或 ESC
    }
    Ok(true)
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== 設定 ===").cyan().bold());
        println!("{}", style(ESC_HINT).dim());

        let options = ["預設縮圖等級", "預覽圖選圖方式", "返回"];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇要調整的設定")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => show_tier_settings_menu(term, config)?,
            Some(1) => show_strategy_settings_menu(term, config)?,
            _ => break,
        }
    }

    Ok(())
}

/// 預設縮圖等級
fn show_tier_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style("=== 預設縮圖等級 ===").cyan().bold());
    println!("{}", style(ESC_HINT).dim());

    let labels: Vec<&str> = QualityTier::ALL.iter().map(|t| t.label()).collect();
    let defaults: Vec<bool> = QualityTier::ALL
        .iter()
        .map(|t| config.settings.resize.tiers.contains(t))
        .collect();

    let selection = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("選擇預設等級（空白鍵切換）")
        .items(&labels)
        .defaults(&defaults)
        .interact_on_opt(term)?;

    let Some(selection) = selection else {
        return Ok(());
    };
    if selection.is_empty() {
        println!("\n{}", style("至少需要選擇一個等級，設定未變更").yellow());
        std::thread::sleep(Duration::from_secs(1));
        return Ok(());
    }

    let tiers: Vec<QualityTier> = selection.into_iter().map(|i| QualityTier::ALL[i]).collect();
    if tiers != config.settings.resize.tiers {
        config.settings.resize.tiers = tiers;
        persist(config)?;
    }

    Ok(())
}

/// 預覽圖選圖方式
fn show_strategy_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style("=== 預覽圖選圖方式 ===").cyan().bold());
    println!(
        "\n{} {}\n",
        style("目前設定:").dim(),
        config.settings.image_preview.strategy
    );

    let items: Vec<String> = SelectionStrategy::ALL.iter().map(ToString::to_string).collect();
    let default_index = SelectionStrategy::ALL
        .iter()
        .position(|&s| s == config.settings.image_preview.strategy)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇")
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    let Some(selection) = selection else {
        return Ok(());
    };

    let strategy = SelectionStrategy::ALL[selection];
    if strategy != config.settings.image_preview.strategy {
        config.settings.image_preview.strategy = strategy;
        persist(config)?;
    }

    Ok(())
}

fn persist(config: &Config) -> Result<()> {
    save_settings(&config.settings, Path::new(SETTINGS_FILE))?;
    println!("\n{}", style("設定已儲存").green());
    std::thread::sleep(Duration::from_secs(1));
    Ok(())
}
