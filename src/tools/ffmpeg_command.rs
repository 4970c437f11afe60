use crate::tools::ToolCommand;
use std::path::Path;
use std::time::Duration;

/// 兩段式 seek 的前置緩衝時間（秒）
const SEEK_MARGIN: f64 = 2.0;

/// 擷取影格的 JPEG 品質（ffmpeg `-q:v`，1-31，數字越小品質越高）
const FRAME_QUALITY: u8 = 3;

/// 整張縮圖表的請求參數
#[derive(Debug, Clone)]
pub struct TileSheetRequest<'a> {
    pub video_path: &'a Path,
    pub output_path: &'a Path,
    pub start_time: f64,
    pub interval: f64,
    pub tile_count: usize,
    pub tile_width: u32,
    pub tile_height: u32,
    pub grid_size: u32,
    pub quality: u8,
}

/// 視訊重新編碼參數
#[derive(Debug, Clone, Copy)]
pub struct VideoEncoder<'a> {
    pub codec: &'a str,
    pub preset: &'a str,
    pub crf: u8,
}

/// 轉檔請求參數
#[derive(Debug, Clone)]
pub struct ConvertRequest<'a> {
    pub input_path: &'a Path,
    pub output_path: &'a Path,
    /// 寫入容器與第一條視訊／音訊串流的 `creation_time`
    pub creation_time: Option<&'a str>,
    /// `(編碼, 位元率)`；`None` 時直接複製音訊串流
    pub audio_encoder: Option<(&'a str, &'a str)>,
    /// `None` 時直接複製視訊串流，只更換容器
    pub video_encoder: Option<VideoEncoder<'a>>,
}

/// ffmpeg 參數組裝
///
/// 每個方法只組出一次呼叫所需的參數，輸出路徑由呼叫端提供。
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    program: String,
    timeout: Duration,
}

impl FfmpegCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn base(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.program);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error"])
            .timeout(self.timeout);
        cmd
    }

    /// 擷取單一影格並縮放（兩段式 seek）
    ///
    /// 1. `-ss` 在 `-i` 前：快速跳轉到最近的關鍵幀
    /// 2. `-ss` 在 `-i` 後：精準解碼到目標時間點
    #[must_use]
    pub fn extract_frame(
        &self,
        video_path: &Path,
        timestamp: f64,
        width: u32,
        height: u32,
        output_path: &Path,
    ) -> ToolCommand {
        let t0 = (timestamp - SEEK_MARGIN).max(0.0);
        let delta = timestamp - t0;

        let mut cmd = self.base();
        if t0 > 0.0 {
            cmd.arg("-ss").arg(format!("{t0:.3}"));
        }
        cmd.arg("-i").arg(video_path.to_string_lossy());
        if delta > 0.0 {
            cmd.arg("-ss").arg(format!("{delta:.3}"));
        }
        cmd.args([
            "-frames:v".to_string(),
            "1".to_string(),
            "-an".to_string(),
            "-sn".to_string(),
            "-dn".to_string(),
            "-threads".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={width}:{height}"),
            "-q:v".to_string(),
            FRAME_QUALITY.to_string(),
            "-y".to_string(),
            output_path.to_string_lossy().to_string(),
        ]);
        cmd
    }

    /// 擷取原始尺寸的單一影格（封面縮圖用）
    #[must_use]
    pub fn capture_frame(&self, video_path: &Path, timestamp: f64, output_path: &Path) -> ToolCommand {
        let mut cmd = self.base();
        cmd.arg("-ss")
            .arg(format!("{timestamp:.3}"))
            .arg("-i")
            .arg(video_path.to_string_lossy())
            .args(["-frames:v", "1", "-an", "-sn", "-dn", "-q:v", "2", "-y"])
            .arg(output_path.to_string_lossy());
        cmd
    }

    /// 以 fps + tile 濾鏡一次產生一整張縮圖表
    #[must_use]
    pub fn tile_sheet(&self, request: &TileSheetRequest<'_>) -> ToolCommand {
        let span = request.tile_count as f64 * request.interval;
        let filter = format!(
            "fps=1/{interval},scale={w}:{h},tile={g}x{g}",
            interval = request.interval,
            w = request.tile_width,
            h = request.tile_height,
            g = request.grid_size,
        );

        let mut cmd = self.base();
        cmd.arg("-ss")
            .arg(format!("{:.3}", request.start_time))
            .arg("-t")
            .arg(format!("{span:.3}"))
            .arg("-i")
            .arg(request.video_path.to_string_lossy())
            .arg("-vf")
            .arg(filter)
            .args(["-frames:v", "1", "-an", "-sn", "-dn"])
            .arg("-q:v")
            .arg(request.quality.to_string())
            .args(["-avoid_negative_ts", "make_zero", "-y"])
            .arg(request.output_path.to_string_lossy());
        cmd
    }

    /// 轉為 MP4：保留原有中繼資料，`faststart` 便於串流播放
    ///
    /// 重新編碼時把寬高修正為偶數。
    #[must_use]
    pub fn convert(&self, request: &ConvertRequest<'_>) -> ToolCommand {
        let mut cmd = self.base();
        cmd.arg("-i")
            .arg(request.input_path.to_string_lossy())
            .args(["-y", "-map_metadata", "0", "-movflags", "faststart"]);

        if let Some(time) = request.creation_time {
            let tag = format!("creation_time={time}");
            cmd.arg("-metadata")
                .arg(tag.clone())
                .arg("-metadata:s:v:0")
                .arg(tag.clone())
                .arg("-metadata:s:a:0")
                .arg(tag);
        }

        match request.audio_encoder {
            Some((codec, bitrate)) => {
                cmd.args(["-c:a", codec, "-b:a", bitrate]);
            }
            None => {
                cmd.args(["-c:a", "copy"]);
            }
        }

        match request.video_encoder {
            Some(encoder) => {
                cmd.args(["-c:v", encoder.codec, "-preset", encoder.preset])
                    .arg("-crf")
                    .arg(encoder.crf.to_string())
                    .args(["-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2"]);
            }
            None => {
                cmd.args(["-c:v", "copy"]);
            }
        }

        cmd.arg(request.output_path.to_string_lossy());
        cmd
    }
}
