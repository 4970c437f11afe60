use crate::error::{MediaError, MediaResult};
use crate::tools::ToolCommand;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 影片資訊
///
/// `width` 已套用 SAR 修正；`rotation` 一律為順時針角度，正規化為 0/90/180/270。
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub rotation: u32,
    pub codec: String,
    pub sample_aspect_ratio: (u32, u32),
    pub frame_rate: f64,
    /// 第一條音訊串流的編碼，沒有音訊時為 `None`
    pub audio_codec: Option<String>,
    /// format 與各串流 `creation_time` 標籤中最早的時間
    pub creation_time: Option<DateTime<Utc>>,
}

impl VideoInfo {
    #[must_use]
    pub const fn is_sideways(&self) -> bool {
        matches!(self.rotation, 90 | 270)
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
    tags: Option<StreamTags>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    sample_aspect_ratio: Option<String>,
    tags: Option<StreamTags>,
    side_data_list: Option<Vec<SideData>>,
}

#[derive(Deserialize)]
struct StreamTags {
    rotate: Option<String>,
    creation_time: Option<String>,
}

#[derive(Deserialize)]
struct SideData {
    side_data_type: Option<String>,
    rotation: Option<f64>,
}

/// 使用 ffprobe 取得影片資訊
pub async fn probe_video(ffprobe: &str, path: &Path, timeout: Duration) -> MediaResult<VideoInfo> {
    if !path.is_file() {
        return Err(MediaError::InputMissing(path.to_path_buf()));
    }

    let output = ToolCommand::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path.to_string_lossy())
        .timeout(timeout)
        .execute(None)
        .await
        .map_err(|e| MediaError::decode(path, format!("ffprobe 失敗: {e}")))?;

    parse_video_info(&output.stdout).map_err(|message| MediaError::decode(path, message))
}

/// 解析 ffprobe 的 JSON 輸出
pub fn parse_video_info(json: &str) -> Result<VideoInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| format!("無法解析 ffprobe 輸出: {e}"))?;

    let video_stream = probe
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .ok_or_else(|| "找不到視訊串流".to_string())?;

    let raw_width = video_stream
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| "無法取得影片寬度".to_string())?;
    let height = video_stream
        .height
        .filter(|h| *h > 0)
        .ok_or_else(|| "無法取得影片高度".to_string())?;

    // 影片長度優先從 format 取得，其次從 stream
    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .or(video_stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| "無法取得影片長度".to_string())?;

    let sample_aspect_ratio = video_stream
        .sample_aspect_ratio
        .as_deref()
        .and_then(parse_sample_aspect_ratio)
        .unwrap_or((1, 1));

    let frame_rate = video_stream
        .r_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration_seconds,
        width: apply_sample_aspect_ratio(raw_width, sample_aspect_ratio),
        height,
        rotation: stream_rotation(video_stream),
        codec: video_stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        sample_aspect_ratio,
        frame_rate,
        audio_codec: probe.streams.as_ref().and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("audio"))
                .and_then(|s| s.codec_name.as_ref())
                .map(|codec| codec.to_lowercase())
        }),
        creation_time: earliest_creation_time(&probe),
    })
}

/// 所有 `creation_time` 標籤中最早的一個；無法解析的值略過
fn earliest_creation_time(probe: &FfprobeOutput) -> Option<DateTime<Utc>> {
    let format_tag = probe.format.as_ref().and_then(|f| f.tags.as_ref());
    let stream_tags = probe
        .streams
        .iter()
        .flatten()
        .filter_map(|s| s.tags.as_ref());

    format_tag
        .into_iter()
        .chain(stream_tags)
        .filter_map(|tags| tags.creation_time.as_deref())
        .filter_map(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|time| time.with_timezone(&Utc))
        .min()
}

/// 取得順時針旋轉角度
///
/// Display Matrix 的角度是逆時針，需要取負值；舊式 `rotate` 標籤本身就是順時針。
/// 兩者同時存在時以 Display Matrix 為準。
fn stream_rotation(stream: &StreamInfo) -> u32 {
    let from_matrix = stream.side_data_list.as_ref().and_then(|list| {
        list.iter()
            .find(|entry| entry.side_data_type.as_deref() == Some("Display Matrix"))
            .and_then(|entry| entry.rotation)
            .map(|r| normalize_rotation(-(r.round() as i64)))
    });

    from_matrix
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<i64>().ok())
                .map(normalize_rotation)
        })
        .unwrap_or(0)
}

/// 正規化為 0/90/180/270
#[must_use]
pub fn normalize_rotation(degrees: i64) -> u32 {
    let wrapped = degrees.rem_euclid(360);
    let snapped = ((wrapped + 45) / 90 * 90).rem_euclid(360);
    snapped as u32
}

fn parse_sample_aspect_ratio(sar: &str) -> Option<(u32, u32)> {
    let (w, h) = sar.split_once(':')?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h.parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

fn apply_sample_aspect_ratio(width: u32, (sar_w, sar_h): (u32, u32)) -> u32 {
    if sar_w == sar_h {
        return width;
    }
    (u64::from(width) * u64::from(sar_w) / u64::from(sar_h)) as u32
}

/// 解析幀率字串（例如 "30/1" 或 "30000/1001"）
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.parse().ok()?;
        let den: f64 = den_str.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDSCAPE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "aac"},
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "r_frame_rate": "30000/1001", "sample_aspect_ratio": "1:1"}
        ],
        "format": {"duration": "600.500000"}
    }"#;

    #[test]
    fn test_parse_video_info_basic() {
        let info = parse_video_info(LANDSCAPE_JSON).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.codec, "h264");
        assert_eq!(info.rotation, 0);
        assert!((info.duration_seconds - 600.5).abs() < 0.001);
        assert!((info.frame_rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_video_info_applies_sar() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 720, "height": 576,
                         "sample_aspect_ratio": "16:15"}],
            "format": {"duration": "10"}
        }"#;
        let info = parse_video_info(json).unwrap();
        assert_eq!(info.width, 768);
        assert_eq!(info.sample_aspect_ratio, (16, 15));
    }

    #[test]
    fn test_rotation_from_display_matrix_is_negated() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}],
                         "tags": {"rotate": "180"}}],
            "format": {"duration": "10"}
        }"#;
        let info = parse_video_info(json).unwrap();
        assert_eq!(info.rotation, 90);
        assert!(info.is_sideways());
    }

    #[test]
    fn test_rotation_from_tag_is_verbatim() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "tags": {"rotate": "270"}}],
            "format": {"duration": "10"}
        }"#;
        assert_eq!(parse_video_info(json).unwrap().rotation, 270);
    }

    #[test]
    fn test_duration_falls_back_to_stream() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360, "duration": "42.0"}]
        }"#;
        let info = parse_video_info(json).unwrap();
        assert!((info.duration_seconds - 42.0).abs() < 0.001);
    }

    #[test]
    fn test_missing_video_stream_is_error() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3"}}"#;
        assert!(parse_video_info(json).is_err());
        assert!(parse_video_info("not json").is_err());
    }

    #[test]
    fn test_audio_codec_and_earliest_creation_time() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "hevc", "width": 640, "height": 360,
                 "tags": {"creation_time": "2021-05-02T10:00:00.000000Z"}},
                {"codec_type": "audio", "codec_name": "MP3",
                 "tags": {"creation_time": "not a time"}}
            ],
            "format": {"duration": "10", "tags": {"creation_time": "2021-05-01T08:30:00.000000Z"}}
        }"#;
        let info = parse_video_info(json).unwrap();
        assert_eq!(info.audio_codec.as_deref(), Some("mp3"));
        assert_eq!(
            info.creation_time.unwrap().to_rfc3339(),
            "2021-05-01T08:30:00+00:00"
        );

        let plain = parse_video_info(LANDSCAPE_JSON).unwrap();
        assert_eq!(plain.audio_codec.as_deref(), Some("aac"));
        assert!(plain.creation_time.is_none());
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(90), 90);
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-180), 180);
        assert_eq!(normalize_rotation(359), 0);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("30/0").is_none());
        assert!(parse_frame_rate("invalid").is_none());
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_input_missing() {
        let result = probe_video(
            "ffprobe",
            Path::new("/nonexistent/video.mp4"),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(MediaError::InputMissing(_))));
    }
}
