//! 影片網格預覽元件
//!
//! 流程：
//! A. 取得影片資訊（ffprobe）
//! B. 依長度決定網格大小並選取時間點
//! C. 有上限的並行擷取影格（暫存區）
//! D. 整批完成後移入本次執行目錄並合成
//! E. 移到最終位置並清除暫存區

mod frame_extractor;
mod grid_generator;
mod main;

pub use frame_extractor::{artifact_slots, extract_frames, extraction_jobs, frame_file_name};
pub use grid_generator::{GridOptions, GridReport, default_grid_path, generate_grid};
pub use main::{GridGenerationResult, VideoGridGenerator};
