use super::selector::{SelectionStrategy, shuffle_in_place};
use crate::config::{Config, FileTypeTable};
use crate::error::{MediaError, MediaResult};
use crate::pipeline::{PipelineState, RunSupervisor};
use crate::tools::composer::WHITE;
use crate::tools::sampling::image_preview_layout;
use crate::tools::{ComposeReport, GridLayout, SheetSpec, TileSource, compose_sheet, scan_media};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_ROWS: u32 = 4;
const DEFAULT_COLS: u32 = 3;

/// 預覽圖預設存放的子資料夾（不會被非遞迴掃描讀到）
pub const PREVIEW_DIR: &str = ".previews";

/// 遞迴掃描時略過的子資料夾：縮圖等級輸出與預覽／封面
pub const IGNORED_FOLDERS: [&str; 5] = ["m", "x", "xl", PREVIEW_DIR, ".covers"];

#[derive(Debug, Clone)]
pub struct ImagePreviewOptions {
    pub rows: u32,
    pub cols: u32,
    pub cell_size: u32,
    pub strategy: SelectionStrategy,
    pub quality: u8,
    /// 挑選前先打亂順序
    pub randomize: bool,
    /// 連同子資料夾一起掃描（略過 [`IGNORED_FOLDERS`]）
    pub recursive: bool,
}

impl Default for ImagePreviewOptions {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            cell_size: 400,
            strategy: SelectionStrategy::Distributed,
            quality: 85,
            randomize: false,
            recursive: false,
        }
    }
}

impl ImagePreviewOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let settings = &config.settings.image_preview;
        Self {
            rows: settings.rows,
            cols: settings.cols,
            cell_size: settings.cell_size,
            strategy: settings.strategy,
            quality: settings.quality,
            randomize: settings.randomize,
            recursive: settings.recursive,
        }
    }

    /// 使用預設 4x3 時依張數自動調整，其他設定照用
    #[must_use]
    pub fn layout_for(&self, total_images: usize) -> (u32, u32) {
        if self.rows == DEFAULT_ROWS && self.cols == DEFAULT_COLS {
            image_preview_layout(total_images)
        } else {
            (self.rows.max(1), self.cols.max(1))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImagePreviewReport {
    pub output_path: PathBuf,
    pub rows: u32,
    pub cols: u32,
    pub selected: usize,
    pub total: usize,
    pub compose: ComposeReport,
}

/// 由指定的影像清單產生網格預覽圖
pub fn generate_image_preview(
    images: &[PathBuf],
    output_path: &Path,
    options: &ImagePreviewOptions,
) -> MediaResult<ImagePreviewReport> {
    let mut supervisor = RunSupervisor::new("image-preview");
    supervisor.advance(PipelineState::Sampling);

    if images.is_empty() {
        return Err(supervisor.fail(MediaError::InsufficientInput("沒有可用的影像".to_string())));
    }

    let (rows, cols) = options.layout_for(images.len());
    let selected = if options.randomize {
        let mut shuffled = images.to_vec();
        shuffle_in_place(&mut shuffled);
        options.strategy.select(&shuffled, (rows * cols) as usize)
    } else {
        options.strategy.select(images, (rows * cols) as usize)
    };
    let tiles: Vec<Option<PathBuf>> = selected.into_iter().map(Some).collect();

    supervisor.advance(PipelineState::Composing);
    let spec = SheetSpec {
        layout: GridLayout::new(rows, cols, options.cell_size, options.cell_size),
        background: WHITE,
        quality: options.quality,
        source: TileSource::SquareCrop,
    };
    let compose = compose_sheet(&tiles, &spec, output_path).map_err(|e| supervisor.fail(e))?;

    supervisor.advance(PipelineState::Finalizing);
    supervisor.advance(PipelineState::Done);

    info!(
        "預覽圖已建立: {} ({rows}x{cols}, {}/{} 張)",
        output_path.display(),
        tiles.len(),
        images.len()
    );
    Ok(ImagePreviewReport {
        output_path: output_path.to_path_buf(),
        rows,
        cols,
        selected: tiles.len(),
        total: images.len(),
        compose,
    })
}

/// 掃描資料夾並產生預覽圖
///
/// 未指定輸出路徑時寫到 `<folder>/.previews/preview.jpg`。
pub fn generate_folder_preview(
    folder: &Path,
    output_path: Option<&Path>,
    options: &ImagePreviewOptions,
    file_types: &FileTypeTable,
) -> MediaResult<ImagePreviewReport> {
    let images = collect_images(folder, options.recursive, file_types)?;
    if images.is_empty() {
        return Err(MediaError::InsufficientInput(format!(
            "資料夾中沒有影像: {}",
            folder.display()
        )));
    }

    let output_path = match output_path {
        Some(path) => path.to_path_buf(),
        None => {
            let dir = folder.join(PREVIEW_DIR);
            fs::create_dir_all(&dir).map_err(|e| MediaError::io(&dir, e))?;
            dir.join("preview.jpg")
        }
    };

    generate_image_preview(&images, &output_path, options)
}

/// 列出資料夾中的影像；遞迴時略過 [`IGNORED_FOLDERS`] 底下的檔案
pub fn collect_images(
    folder: &Path,
    recursive: bool,
    file_types: &FileTypeTable,
) -> MediaResult<Vec<PathBuf>> {
    scan_media(folder, recursive, |path| {
        file_types.is_image_file(path) && !in_ignored_folder(folder, path)
    })
}

fn in_ignored_folder(folder: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(folder).unwrap_or(path);
    relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .any(|component| {
            IGNORED_FOLDERS
                .iter()
                .any(|ignored| component.as_os_str() == *ignored)
        })
}
