//! WebVTT 時間軸
//!
//! 每個取樣點對應縮圖表上的一個矩形。只有成功產生的縮圖表會出現在文件中。

use crate::error::{MediaError, MediaResult};
use crate::tools::sampling::SheetRange;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const CUE_HEADER: &str = "WEBVTT";

/// 一筆時間軸項目，時間以毫秒表示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub sheet: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Cue {
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{} --> {}\n{}#xywh={},{},{},{}\n",
            format_timestamp(self.start_ms),
            format_timestamp(self.end_ms),
            self.sheet,
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}

/// 縮圖表的共同幾何設定
#[derive(Debug, Clone)]
pub struct SpriteGeometry {
    pub interval: f64,
    pub tile_width: u32,
    pub tile_height: u32,
    pub grid_size: u32,
    pub prefix: String,
    pub total_duration: f64,
}

/// `HH:MM:SS.mmm`
#[must_use]
pub fn format_timestamp(millis: u64) -> String {
    let hours = millis / 3_600_000;
    let minutes = millis % 3_600_000 / 60_000;
    let seconds = millis % 60_000 / 1000;
    let ms = millis % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{ms:03}")
}

/// 第 `sheet_index` 張縮圖表的檔名（序號從 001 開始）
#[must_use]
pub fn sheet_file_name(prefix: &str, sheet_index: usize) -> String {
    format!("{prefix}{:03}.jpg", sheet_index + 1)
}

/// 時間軸文件的檔名：`<prefix>.vtt`，前綴為空時用 `sprite.vtt`
#[must_use]
pub fn cue_document_name(prefix: &str) -> String {
    if prefix.is_empty() {
        "sprite.vtt".to_string()
    } else {
        format!("{prefix}.vtt")
    }
}

fn instant_ms(index: usize, interval: f64) -> u64 {
    (index as f64 * interval * 1000.0).round() as u64
}

/// 由成功產生的縮圖表建立時間軸
///
/// 相鄰項目首尾相接；最後一項的結束時間不超過影片長度。
#[must_use]
pub fn build_cues(produced: &[SheetRange], geometry: &SpriteGeometry) -> Vec<Cue> {
    let grid = geometry.grid_size.max(1) as usize;
    let duration_ms = (geometry.total_duration.max(0.0) * 1000.0).round() as u64;
    let mut sheets: Vec<&SheetRange> = produced.iter().collect();
    sheets.sort_by_key(|range| range.first_instant);

    let mut cues = Vec::new();
    for range in sheets {
        let sheet = sheet_file_name(&geometry.prefix, range.sheet_index);
        for instant in range.first_instant..range.end_instant {
            let start_ms = instant_ms(instant, geometry.interval);
            let end_ms = instant_ms(instant + 1, geometry.interval).min(duration_ms.max(start_ms));
            if end_ms <= start_ms {
                continue;
            }

            let offset = instant - range.first_instant;
            cues.push(Cue {
                start_ms,
                end_ms,
                sheet: sheet.clone(),
                x: (offset % grid) as u32 * geometry.tile_width,
                y: (offset / grid) as u32 * geometry.tile_height,
                width: geometry.tile_width,
                height: geometry.tile_height,
            });
        }
    }
    cues
}

/// 組出完整文件內容
#[must_use]
pub fn render(cues: &[Cue]) -> String {
    let mut document = format!("{CUE_HEADER}\n\n");
    for cue in cues {
        let _ = writeln!(document, "{}", cue.render());
    }
    document
}

/// 寫出時間軸文件
pub fn write_cue_document(output_dir: &Path, prefix: &str, cues: &[Cue]) -> MediaResult<PathBuf> {
    let path = output_dir.join(cue_document_name(prefix));
    fs::write(&path, render(cues)).map_err(|e| MediaError::io(&path, e))?;
    Ok(path)
}
