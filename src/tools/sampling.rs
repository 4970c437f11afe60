//! 取樣策略
//!
//! 純函式：只依影片長度與目標版面決定取樣時間點，不做任何 I/O。

/// 小於此長度（秒）的影片不產生網格預覽
pub const MIN_DURATION_FOR_GRID: f64 = 5.0;
/// 短片上限（秒），超過改用中型網格
pub const SHORT_VIDEO_THRESHOLD: f64 = 180.0;
/// 中長片上限（秒），超過改用大型網格
pub const MEDIUM_VIDEO_THRESHOLD: f64 = 1800.0;

pub const SHORT_GRID_SIZE: u32 = 3;
pub const MEDIUM_GRID_SIZE: u32 = 4;
pub const LONG_GRID_SIZE: u32 = 5;

/// 網格預覽的第一個與最後一個取樣點距離片頭片尾的秒數
const GRID_EDGE_MARGIN: f64 = 1.0;

/// 影像集預覽：張數達到此值改用 5 列
const LARGE_IMAGE_SET: usize = 50;

/// 依影片長度決定網格邊長
///
/// 單調不遞減的階梯函式；長度不足時回傳 `None`。
#[must_use]
pub fn grid_size_for_duration(duration: f64) -> Option<u32> {
    if !duration.is_finite() || duration < MIN_DURATION_FOR_GRID {
        return None;
    }

    if duration > MEDIUM_VIDEO_THRESHOLD {
        Some(LONG_GRID_SIZE)
    } else if duration > SHORT_VIDEO_THRESHOLD {
        Some(MEDIUM_GRID_SIZE)
    } else {
        Some(SHORT_GRID_SIZE)
    }
}

/// 有序的取樣時間點（秒）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleSet {
    instants: Vec<f64>,
}

impl SampleSet {
    #[must_use]
    pub const fn new(instants: Vec<f64>) -> Self {
        Self { instants }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.instants
    }
}

/// 網格預覽的取樣點
///
/// 在 `[1, duration - 1]` 之間均勻分布 `grid_size²` 個點，第一個點永遠不是 `t = 0`。
#[must_use]
pub fn grid_instants(duration: f64, grid_size: u32) -> SampleSet {
    let count = (grid_size as usize).pow(2);
    if count == 0 || !duration.is_finite() || duration < MIN_DURATION_FOR_GRID {
        return SampleSet::default();
    }

    let start = GRID_EDGE_MARGIN;
    let end = duration - GRID_EDGE_MARGIN;
    if count == 1 {
        return SampleSet::new(vec![(start + end) / 2.0]);
    }

    let step = (end - start) / (count - 1) as f64;
    SampleSet::new((0..count).map(|i| start + step * i as f64).collect())
}

/// 單張縮圖表涵蓋的取樣區間（`end_instant` 不含）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet_index: usize,
    pub first_instant: usize,
    pub end_instant: usize,
}

impl SheetRange {
    #[must_use]
    pub const fn tile_count(&self) -> usize {
        self.end_instant - self.first_instant
    }

    #[must_use]
    pub fn start_time(&self, interval: f64) -> f64 {
        self.first_instant as f64 * interval
    }
}

/// 縮圖表（sprite）計畫
#[derive(Debug, Clone, PartialEq)]
pub struct SpritePlan {
    pub total_instants: usize,
    pub tiles_per_sheet: usize,
    pub sheets: Vec<SheetRange>,
}

impl SpritePlan {
    #[must_use]
    pub fn samples(&self, interval: f64) -> SampleSet {
        SampleSet::new(
            (0..self.total_instants)
                .map(|i| i as f64 * interval)
                .collect(),
        )
    }
}

/// 固定間隔取樣：`ceil(duration / interval)` 個點，每 `grid_size²` 個一張表，最後一張可不滿
#[must_use]
pub fn sprite_plan(duration: f64, interval: f64, grid_size: u32) -> SpritePlan {
    let tiles_per_sheet = (grid_size as usize).pow(2);
    if tiles_per_sheet == 0 || !(interval > 0.0) || !(duration > 0.0) || !duration.is_finite() {
        return SpritePlan {
            total_instants: 0,
            tiles_per_sheet,
            sheets: Vec::new(),
        };
    }

    let total_instants = (duration / interval).ceil() as usize;
    let sheets = (0..total_instants.div_ceil(tiles_per_sheet))
        .map(|sheet_index| {
            let first_instant = sheet_index * tiles_per_sheet;
            SheetRange {
                sheet_index,
                first_instant,
                end_instant: (first_instant + tiles_per_sheet).min(total_instants),
            }
        })
        .collect();

    SpritePlan {
        total_instants,
        tiles_per_sheet,
        sheets,
    }
}

/// 網格版面；保證 `rows * cols >= 需要的格數`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl GridLayout {
    #[must_use]
    pub const fn new(rows: u32, cols: u32, cell_width: u32, cell_height: u32) -> Self {
        Self {
            rows,
            cols,
            cell_width,
            cell_height,
        }
    }

    #[must_use]
    pub const fn square(grid_size: u32, cell_width: u32, cell_height: u32) -> Self {
        Self::new(grid_size, grid_size, cell_width, cell_height)
    }

    /// 從目標畫布大小與格數推導版面（欄數取平方根向上取整）
    #[must_use]
    pub fn fit(tile_count: usize, canvas_width: u32, canvas_height: u32) -> Self {
        let tile_count = tile_count.max(1) as u32;
        let cols = (f64::from(tile_count).sqrt().ceil() as u32).max(1);
        let rows = tile_count.div_ceil(cols);
        Self::new(
            rows,
            cols,
            (canvas_width / cols).max(1),
            (canvas_height / rows).max(1),
        )
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    /// 第 `index` 格的 (列, 欄)
    #[must_use]
    pub const fn position(&self, index: usize) -> (u32, u32) {
        let cols = self.cols as usize;
        ((index / cols) as u32, (index % cols) as u32)
    }

    /// 第 `index` 格左上角的像素座標
    #[must_use]
    pub const fn origin(&self, index: usize) -> (u32, u32) {
        let (row, col) = self.position(index);
        (col * self.cell_width, row * self.cell_height)
    }

    #[must_use]
    pub const fn canvas_size(&self) -> (u32, u32) {
        (self.cols * self.cell_width, self.rows * self.cell_height)
    }
}

/// 影像集預覽的 (列, 欄)
#[must_use]
pub const fn image_preview_layout(total_images: usize) -> (u32, u32) {
    if total_images < LARGE_IMAGE_SET {
        (4, 3)
    } else {
        (5, 3)
    }
}

fn even_at_least_two(value: u64) -> u32 {
    let value = u32::try_from(value).unwrap_or(u32::MAX);
    (value - value % 2).max(2)
}

/// 依短邊縮放：短邊等於 `max_size`
#[must_use]
pub fn scale_short_edge(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let (w, h, max) = (u64::from(width.max(1)), u64::from(height.max(1)), u64::from(max_size));
    if w <= h {
        (even_at_least_two(max), even_at_least_two(h * max / w))
    } else {
        (even_at_least_two(w * max / h), even_at_least_two(max))
    }
}

/// 依長邊縮放：長邊等於 `max_size`
#[must_use]
pub fn scale_long_edge(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let (w, h, max) = (u64::from(width.max(1)), u64::from(height.max(1)), u64::from(max_size));
    if w >= h {
        (even_at_least_two(max), even_at_least_two(h * max / w))
    } else {
        (even_at_least_two(w * max / h), even_at_least_two(max))
    }
}

/// 旋轉 90/270 度時交換寬高
#[must_use]
pub const fn orient(size: (u32, u32), sideways: bool) -> (u32, u32) {
    if sideways { (size.1, size.0) } else { size }
}

/// 尋找封面影格時的步進秒數
#[must_use]
pub fn thumbnail_step(duration: f64) -> f64 {
    if duration < 10.0 {
        1.0
    } else if duration < 60.0 {
        2.0
    } else {
        10.0
    }
}
