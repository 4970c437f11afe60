use crate::component::{
    ImagePreviewGenerator, ImageResizer, VideoConverter, VideoGridGenerator, VideoSpriteGenerator,
    VideoThumbnailGenerator,
};
use crate::config::Config;
use crate::pause;
use crate::signal::reset_shutdown_signal;
use anyhow::Result;
use console::{Term, style};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn report_error(e: &anyhow::Error) {
    eprintln!("{} {:#}", style("錯誤:").red().bold(), e);
}

pub fn run_image_resizer(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<()> {
    reset_shutdown_signal(shutdown_signal);
    let resizer = ImageResizer::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = resizer.run() {
        report_error(&e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_image_preview(term: &Term, config: &Config) -> Result<()> {
    let generator = ImagePreviewGenerator::new(config.clone());

    if let Err(e) = generator.run() {
        report_error(&e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_video_grid(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<()> {
    reset_shutdown_signal(shutdown_signal);
    let generator = VideoGridGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        report_error(&e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_video_sprite(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<()> {
    reset_shutdown_signal(shutdown_signal);
    let generator = VideoSpriteGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        report_error(&e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_video_thumbnail(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<()> {
    reset_shutdown_signal(shutdown_signal);
    let generator = VideoThumbnailGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        report_error(&e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_video_converter(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<()> {
    reset_shutdown_signal(shutdown_signal);
    let converter = VideoConverter::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = converter.run() {
        report_error(&e);
    }

    pause(term)?;
    Ok(())
}
