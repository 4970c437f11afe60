pub mod load;
pub mod save;
pub mod types;

pub use load::SETTINGS_FILE;
pub use types::{
    Config, ConversionSettings, FileTypeTable, ImagePreviewSettings, MAX_RECENT_PATHS,
    ResizeSettings, SpriteSettings, ToolSettings, UserSettings, VideoGridSettings,
};
