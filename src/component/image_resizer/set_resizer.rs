use super::resize_pool::{ResizePool, get_max_dimensions};
use super::tier::{QualityTier, filter_tiers};
use crate::config::FileTypeTable;
use crate::error::{MediaError, MediaResult};
use crate::outcome::BatchResult;
use crate::pipeline::{PipelineState, RunSupervisor};
use crate::tools::scan_media;
use log::info;
use std::fs;
use std::path::Path;

/// 單一資料夾（影像集）的縮圖結果
#[derive(Debug)]
pub enum SetResizeReport {
    /// 所有要求的等級資料夾都已存在
    AlreadyResized,
    Processed(BatchResult),
}

/// 縮圖整個影像集資料夾
///
/// 等級資料夾依影像集中最大的尺寸建立；每張影像再依自身尺寸決定實際輸出。
pub fn resize_set(
    pool: &ResizePool,
    folder: &Path,
    tiers: &[QualityTier],
    file_types: &FileTypeTable,
) -> MediaResult<SetResizeReport> {
    let label = folder
        .file_name()
        .map_or_else(|| "resize".to_string(), |n| n.to_string_lossy().to_string());
    let mut supervisor = RunSupervisor::new(label);

    if tiers
        .iter()
        .all(|tier| tier.output_dir(folder).is_dir())
    {
        info!("影像集已縮圖，跳過: {}", folder.display());
        return Ok(SetResizeReport::AlreadyResized);
    }

    supervisor.advance(PipelineState::Sampling);
    let images = scan_media(folder, false, |path| file_types.is_image_file(path))
        .map_err(|e| supervisor.fail(e))?;
    if images.is_empty() {
        return Err(supervisor.fail(MediaError::InsufficientInput(format!(
            "資料夾中沒有影像: {}",
            folder.display()
        ))));
    }

    let dimensions = get_max_dimensions(&images);
    for tier in filter_tiers(tiers, dimensions) {
        let dir = tier.output_dir(folder);
        fs::create_dir_all(&dir).map_err(|e| supervisor.fail(MediaError::io(&dir, e)))?;
        info!("建立 {}/ ({}px)", tier.folder_name(), tier.max_dimension());
    }

    supervisor.advance(PipelineState::Dispatching);
    supervisor.advance(PipelineState::Collecting);
    let result = pool.resize_batch(&images, tiers);

    supervisor.advance(PipelineState::Finalizing);
    supervisor.advance(PipelineState::Done);
    Ok(SetResizeReport::Processed(result))
}
