//! 影像集網格預覽元件
//!
//! 從影像集挑選圖塊、裁成正方形後合成為單張預覽圖。

mod generator;
mod main;
mod selector;

pub use generator::{
    IGNORED_FOLDERS, ImagePreviewOptions, ImagePreviewReport, PREVIEW_DIR, collect_images,
    generate_folder_preview, generate_image_preview,
};
pub use main::ImagePreviewGenerator;
pub use selector::SelectionStrategy;
