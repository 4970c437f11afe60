pub mod composer;
mod ffmpeg_command;
mod ffprobe_info;
mod gated_scheduler;
mod media_scanner;
mod path_validator;
pub mod sampling;
mod staging_area;
pub mod timeline;
mod tool_command;

pub use composer::{ComposeReport, SheetSpec, TileSource, compose_sheet};
pub use ffmpeg_command::{ConvertRequest, FfmpegCommand, TileSheetRequest, VideoEncoder};
pub use ffprobe_info::{VideoInfo, normalize_rotation, parse_video_info, probe_video};
pub use gated_scheduler::{GatedJob, run_gated};
pub use media_scanner::{natural_path_cmp, scan_media};
pub use path_validator::{
    ensure_directory_exists, normalize_input_path, validate_directory_exists,
    validate_file_exists,
};
pub use sampling::{GridLayout, SampleSet, SheetRange, SpritePlan};
pub use staging_area::{RunDirectory, StagingArea, move_all, move_file};
pub use tool_command::{DEFAULT_TIMEOUT, ToolCommand, ToolOutput, wait_for_shutdown};
