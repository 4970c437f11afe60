//! 影片轉檔元件
//!
//! 不相容的視訊編碼重新編碼為 H.264，不相容的容器改封裝為 MP4，
//! 並保留最早的建立時間。

mod converter;
mod main;

pub use converter::{
    ConversionKind, ConversionOptions, ConversionPlan, ConversionReport, FolderConversionReport,
    conversion_kind, convert_folder, convert_video, format_creation_time, plan_conversion,
    preset_for_duration, unique_target,
};
pub use main::VideoConverter;
