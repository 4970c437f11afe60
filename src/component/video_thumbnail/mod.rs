//! 影片封面縮圖元件
//!
//! 逐步擷取影格，取第一張不是整片單色的影格作為封面。

mod main;
mod thumbnail_generator;

pub use main::VideoThumbnailGenerator;
pub use thumbnail_generator::{
    BLANK_STDDEV_THRESHOLD, ThumbnailOptions, ThumbnailReport, candidate_instants, channel_stddev,
    default_thumbnail_path, generate_thumbnail, is_valid_frame,
};
