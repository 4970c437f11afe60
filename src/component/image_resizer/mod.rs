//! 影像集批次縮圖元件
//!
//! 固定大小的工作池平行處理影像；損毀影像會呼叫外部工具修復一次後重試。

mod main;
mod repair;
mod resize_pool;
mod set_resizer;
mod tier;

pub use main::ImageResizer;
pub use repair::{RepairTool, corrupt_aside_path, is_corruption};
pub use resize_pool::{ResizeOptions, ResizePool, get_max_dimensions};
pub use set_resizer::{SetResizeReport, resize_set};
pub use tier::{
    ImageDimensions, QualityTier, assign_output_names, filter_tiers, output_file_name,
};
