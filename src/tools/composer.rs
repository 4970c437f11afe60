//! 合成器
//!
//! 把多張小圖依序貼到一張畫布上，最後只編碼一次。
//! 影像集預覽與影片網格／縮圖表共用，差別只在圖塊來源。

use crate::error::{MediaError, MediaResult};
use crate::tools::sampling::GridLayout;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageReader, ImageResult, Rgb, RgbImage};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// 圖塊來源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSource {
    /// 已擷取的影格，縮放到格子大小
    Frame,
    /// 一般影像，先裁成正方形再縮放
    SquareCrop,
}

impl TileSource {
    fn load(self, path: &Path, width: u32, height: u32, background: Rgb<u8>) -> ImageResult<RgbImage> {
        let image = decode_oriented(path)?;
        let image = match self {
            Self::Frame => image,
            Self::SquareCrop => smart_crop_square(&image),
        };

        let image = if image.width() == width && image.height() == height {
            image
        } else {
            image.resize_exact(width, height, FilterType::Lanczos3)
        };
        Ok(flatten_to_rgb(&image, background))
    }
}

/// 一張合成圖的參數
#[derive(Debug, Clone, Copy)]
pub struct SheetSpec {
    pub layout: GridLayout,
    pub background: Rgb<u8>,
    pub quality: u8,
    pub source: TileSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComposeReport {
    pub placed: usize,
    pub skipped: usize,
}

/// 依序合成圖塊
///
/// 第 `i` 個圖塊放在 `(i / cols, i % cols)`；缺少或無法讀取的圖塊保留背景色。
/// 超出版面容量的圖塊會被忽略。
pub fn compose_sheet(
    tiles: &[Option<PathBuf>],
    spec: &SheetSpec,
    output_path: &Path,
) -> MediaResult<ComposeReport> {
    let layout = spec.layout;
    let (canvas_width, canvas_height) = layout.canvas_size();
    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, spec.background);
    let mut report = ComposeReport::default();

    if tiles.len() > layout.capacity() {
        warn!(
            "圖塊數量 {} 超過版面容量 {}，多餘的將被忽略",
            tiles.len(),
            layout.capacity()
        );
    }

    for (index, tile) in tiles.iter().take(layout.capacity()).enumerate() {
        let Some(path) = tile else {
            report.skipped += 1;
            continue;
        };

        match spec
            .source
            .load(path, layout.cell_width, layout.cell_height, spec.background)
        {
            Ok(cell) => {
                let (x, y) = layout.origin(index);
                imageops::replace(&mut canvas, &cell, i64::from(x), i64::from(y));
                report.placed += 1;
            }
            Err(e) => {
                warn!("無法讀取圖塊 {}: {e}", path.display());
                report.skipped += 1;
            }
        }
    }

    write_jpeg(&canvas, spec.quality, output_path)?;
    debug!(
        "合成完成 {} ({} 張，略過 {})",
        output_path.display(),
        report.placed,
        report.skipped
    );
    Ok(report)
}

/// 解碼並套用 EXIF 方向
pub fn decode_oriented(path: &Path) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// 裁成正方形：橫圖取中央，直圖從上方四分之一處開始
#[must_use]
pub fn smart_crop_square(image: &DynamicImage) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width == height {
        return image.clone();
    }

    if width > height {
        image.crop_imm((width - height) / 2, 0, height, height)
    } else {
        image.crop_imm(0, (height - width) / 4, width, width)
    }
}

/// 轉為三通道；有透明度時以背景色合成
#[must_use]
pub fn flatten_to_rgb(image: &DynamicImage, background: Rgb<u8>) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |fg: u8, bg: u8| -> u8 {
            ((u16::from(fg) * alpha + u16::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([
            blend(r, background[0]),
            blend(g, background[1]),
            blend(b, background[2]),
        ])
    })
}

/// 以 JPEG 寫出
///
/// 先寫到同目錄下的暫存檔再改名，不會留下寫到一半的輸出。
pub fn write_jpeg(image: &RgbImage, quality: u8, output_path: &Path) -> MediaResult<()> {
    let partial = partial_path(output_path);

    let encoded = File::create(&partial)
        .map_err(|e| MediaError::io(&partial, e))
        .and_then(|file| {
            let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality.clamp(1, 100));
            encoder
                .encode_image(image)
                .map_err(|e| MediaError::decode(output_path, format!("JPEG 編碼失敗: {e}")))
        });

    if let Err(e) = encoded {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::rename(&partial, output_path).map_err(|e| {
        let _ = fs::remove_file(&partial);
        MediaError::io(output_path, e)
    })
}

fn partial_path(output_path: &Path) -> PathBuf {
    let name = output_path
        .file_name()
        .map_or_else(|| "output".to_string(), |n| n.to_string_lossy().to_string());
    output_path.with_file_name(format!(".{name}.part"))
}
