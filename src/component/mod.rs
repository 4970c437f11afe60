//! 功能元件模組
//!
//! 每個子模組實現一個獨立的功能，包含主要邏輯和互動介面

pub mod image_preview;
pub mod image_resizer;
pub mod video_converter;
pub mod video_grid;
pub mod video_sprite;
pub mod video_thumbnail;

pub use image_preview::ImagePreviewGenerator;
pub use image_resizer::ImageResizer;
pub use video_converter::VideoConverter;
pub use video_grid::VideoGridGenerator;
pub use video_sprite::VideoSpriteGenerator;
pub use video_thumbnail::VideoThumbnailGenerator;
