use crate::component::image_preview::SelectionStrategy;
use crate::component::image_resizer::QualityTier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 最近使用路徑的保留數量
pub const MAX_RECENT_PATHS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeTable {
    #[serde(rename = "VIDEO_FILE")]
    pub video_file: Vec<String>,
    #[serde(rename = "IMAGE_FILE")]
    pub image_file: Vec<String>,
}

impl FileTypeTable {
    fn matches(extensions: &[String], path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let dotted = format!(".{}", ext.to_lowercase());
        extensions.iter().any(|e| e.to_lowercase() == dotted)
    }

    #[must_use]
    pub fn is_video_file(&self, path: &Path) -> bool {
        Self::matches(&self.video_file, path)
    }

    #[must_use]
    pub fn is_image_file(&self, path: &Path) -> bool {
        Self::matches(&self.image_file, path)
    }
}

/// 外部工具設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg: String,
    pub ffprobe: String,
    /// ImageMagick 相容的修復工具
    pub repair: String,
    pub timeout_secs: u64,
    pub repair_timeout_secs: u64,
}

impl ToolSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn repair_timeout(&self) -> Duration {
        Duration::from_secs(self.repair_timeout_secs)
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            repair: "convert".to_string(),
            timeout_secs: 120,
            repair_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeSettings {
    pub tiers: Vec<QualityTier>,
    /// 未設定時使用 CPU 數量減一
    pub max_workers: Option<usize>,
    pub jpeg_quality: u8,
    /// 每處理多少張記錄一次進度
    pub progress_every: usize,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            tiers: vec![QualityTier::Small],
            max_workers: None,
            jpeg_quality: 90,
            progress_every: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoGridSettings {
    /// 未設定時依影片長度決定
    pub grid_size: Option<u32>,
    pub max_tile_size: u32,
    pub max_parallel: usize,
    pub quality: u8,
}

impl Default for VideoGridSettings {
    fn default() -> Self {
        Self {
            grid_size: None,
            max_tile_size: 480,
            max_parallel: 2,
            quality: 70,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteSettings {
    pub grid_size: u32,
    pub interval: f64,
    pub max_tile_size: u32,
    /// ffmpeg `-q:v`（1-31，數字越小品質越高）
    pub quality: u8,
    pub output_prefix: String,
    pub max_parallel: usize,
}

impl Default for SpriteSettings {
    fn default() -> Self {
        Self {
            grid_size: 10,
            interval: 5.0,
            max_tile_size: 320,
            quality: 3,
            output_prefix: "sprite_".to_string(),
            max_parallel: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePreviewSettings {
    pub rows: u32,
    pub cols: u32,
    pub cell_size: u32,
    pub strategy: SelectionStrategy,
    pub quality: u8,
    pub randomize: bool,
    pub recursive: bool,
}

impl Default for ImagePreviewSettings {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 3,
            cell_size: 400,
            strategy: SelectionStrategy::Distributed,
            quality: 85,
            randomize: false,
            recursive: false,
        }
    }
}

/// 影片轉檔設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub video_codec: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// 不需要重新編碼的視訊編碼
    pub supported_codecs: Vec<String>,
    /// 不需要更換容器的副檔名
    pub supported_extensions: Vec<String>,
    /// 資料夾批次時同時執行的 ffmpeg 數量
    pub max_parallel: usize,
    /// 單次轉檔的逾時秒數
    pub timeout_secs: u64,
}

impl ConversionSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 18,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            supported_codecs: ["h264", "hevc", "vp9", "av1"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            supported_extensions: [".mp4", ".mov"].iter().map(ToString::to_string).collect(),
            max_parallel: 1,
            timeout_secs: 6 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub tools: ToolSettings,
    pub resize: ResizeSettings,
    pub video_grid: VideoGridSettings,
    pub sprite: SpriteSettings,
    pub image_preview: ImagePreviewSettings,
    pub conversion: ConversionSettings,
    pub recent_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub file_type_table: FileTypeTable,
    pub settings: UserSettings,
}
