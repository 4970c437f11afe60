//! 影片縮圖表元件
//!
//! 固定間隔取樣，每張縮圖表由一次 ffmpeg `tile` 呼叫產生，
//! 完成後依成功的縮圖表寫出 WebVTT 時間軸。

mod main;
mod sprite_generator;

pub use main::{VideoSpriteGenerator, default_sprite_dir};
pub use sprite_generator::{SpriteOptions, SpriteReport, generate_sprites};
