use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// 縮圖品質等級：固定的最大邊長與輸出子資料夾
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityTier {
    Small,
    Medium,
    Large,
}

impl QualityTier {
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    #[must_use]
    pub const fn max_dimension(self) -> u32 {
        match self {
            Self::Small => 320,
            Self::Medium => 1280,
            Self::Large => 2048,
        }
    }

    #[must_use]
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::Small => "m",
            Self::Medium => "x",
            Self::Large => "xl",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Small => "小 (320px)",
            Self::Medium => "中 (1280px)",
            Self::Large => "大 (2048px)",
        }
    }

    /// 此等級在 `set_dir` 下的輸出資料夾
    #[must_use]
    pub fn output_dir(self, set_dir: &Path) -> PathBuf {
        set_dir.join(self.folder_name())
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn min_dimension(&self) -> u32 {
        self.width.min(self.height)
    }

    /// 長邊縮到 `max_dimension` 以內的尺寸，不放大
    #[must_use]
    pub fn fit_within(&self, max_dimension: u32) -> Self {
        let longest = self.width.max(self.height);
        if longest <= max_dimension || longest == 0 {
            return *self;
        }

        let scale = |side: u32| -> u32 {
            ((u64::from(side) * u64::from(max_dimension) + u64::from(longest) / 2)
                / u64::from(longest))
            .max(1) as u32
        };
        Self::new(scale(self.width), scale(self.height))
    }
}

/// 決定要輸出的等級
///
/// 等級的最大邊長必須小於來源短邊，否則略過；最小的等級永遠保留。
#[must_use]
pub fn filter_tiers(tiers: &[QualityTier], source: ImageDimensions) -> Vec<QualityTier> {
    let Some(smallest) = tiers.iter().copied().min() else {
        return Vec::new();
    };

    let mut selected: Vec<QualityTier> = tiers
        .iter()
        .copied()
        .filter(|tier| *tier == smallest || source.min_dimension() > tier.max_dimension())
        .collect();
    selected.sort();
    selected.dedup();
    selected
}

/// 輸出檔名：`.png`/`.webp` 轉為 `.jpg`，其他保留原檔名
#[must_use]
pub fn output_file_name(source: &Path) -> String {
    let name = source
        .file_name()
        .map_or_else(|| "image.jpg".to_string(), |n| n.to_string_lossy().to_string());
    if converts_to_jpeg(source) {
        let stem = source
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().to_string());
        format!("{stem}.jpg")
    } else {
        name
    }
}

fn converts_to_jpeg(source: &Path) -> bool {
    source
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "png" | "webp"))
}

/// 為整批來源分配輸出檔名，同一資料夾內不會重複
///
/// 保留原檔名的來源優先；轉檔後與其他輸出同名的來源改用 `<stem>_<ext>.jpg`，
/// 仍重複時再加上序號。結果與 `sources` 一一對應，與處理順序無關。
#[must_use]
pub fn assign_output_names(sources: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<Option<String>> = vec![None; sources.len()];
    let mut taken: HashSet<(PathBuf, String)> = HashSet::new();
    let parent = |source: &Path| source.parent().map(Path::to_path_buf).unwrap_or_default();

    for (index, source) in sources.iter().enumerate() {
        if !converts_to_jpeg(source) {
            let name = output_file_name(source);
            taken.insert((parent(source), name.clone()));
            names[index] = Some(name);
        }
    }

    for (index, source) in sources.iter().enumerate() {
        if names[index].is_some() {
            continue;
        }
        let dir = parent(source);
        let mut name = output_file_name(source);
        if taken.contains(&(dir.clone(), name.clone())) {
            let stem = source
                .file_stem()
                .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().to_string());
            let ext = source
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            name = format!("{stem}_{ext}.jpg");
            let mut counter = 2;
            while taken.contains(&(dir.clone(), name.clone())) {
                name = format!("{stem}_{ext}_{counter}.jpg");
                counter += 1;
            }
            warn!("輸出檔名重複，{} 改存為 {name}", source.display());
        }
        taken.insert((dir, name.clone()));
        names[index] = Some(name);
    }

    names.into_iter().map(Option::unwrap_or_default).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_constants() {
        assert_eq!(QualityTier::Small.max_dimension(), 320);
        assert_eq!(QualityTier::Medium.folder_name(), "x");
        assert_eq!(QualityTier::Large.folder_name(), "xl");
        assert_eq!(QualityTier::Small.to_string(), "m");
    }

    #[test]
    fn test_small_tier_always_kept() {
        let tiers = filter_tiers(&QualityTier::ALL, ImageDimensions::new(100, 100));
        assert_eq!(tiers, vec![QualityTier::Small]);
    }

    #[test]
    fn test_medium_requires_larger_short_edge() {
        let all = QualityTier::ALL;
        assert_eq!(
            filter_tiers(&all, ImageDimensions::new(4000, 1280)),
            vec![QualityTier::Small]
        );
        assert_eq!(
            filter_tiers(&all, ImageDimensions::new(4000, 1281)),
            vec![QualityTier::Small, QualityTier::Medium]
        );
        assert_eq!(filter_tiers(&all, ImageDimensions::new(3000, 2049)), all.to_vec());
    }

    #[test]
    fn test_smallest_requested_tier_is_baseline() {
        let tiers = filter_tiers(
            &[QualityTier::Large, QualityTier::Medium],
            ImageDimensions::new(800, 600),
        );
        assert_eq!(tiers, vec![QualityTier::Medium]);
        assert!(filter_tiers(&[], ImageDimensions::new(800, 600)).is_empty());
    }

    #[test]
    fn test_fit_within_never_upscales() {
        let source = ImageDimensions::new(200, 100);
        assert_eq!(source.fit_within(320), source);
        assert_eq!(
            ImageDimensions::new(4000, 3000).fit_within(320),
            ImageDimensions::new(320, 240)
        );
        assert_eq!(
            ImageDimensions::new(1000, 3000).fit_within(1280),
            ImageDimensions::new(427, 1280)
        );
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name(Path::new("/a/photo.png")), "photo.jpg");
        assert_eq!(output_file_name(Path::new("/a/photo.WEBP")), "photo.jpg");
        assert_eq!(output_file_name(Path::new("/a/photo.jpeg")), "photo.jpeg");
        assert_eq!(output_file_name(Path::new("/a/scan.tiff")), "scan.tiff");
    }

    #[test]
    fn test_assign_output_names_disambiguates_collisions() {
        let sources = vec![
            PathBuf::from("/set/a.png"),
            PathBuf::from("/set/a.jpg"),
            PathBuf::from("/set/a.webp"),
            PathBuf::from("/set/b.png"),
            PathBuf::from("/other/a.png"),
        ];
        let names = assign_output_names(&sources);
        assert_eq!(
            names,
            vec!["a_png.jpg", "a.jpg", "a_webp.jpg", "b.jpg", "a.jpg"]
        );
    }

    #[test]
    fn test_assign_output_names_independent_of_order() {
        let forward = assign_output_names(&[
            PathBuf::from("/set/a.jpg"),
            PathBuf::from("/set/a.png"),
        ]);
        let backward = assign_output_names(&[
            PathBuf::from("/set/a.png"),
            PathBuf::from("/set/a.jpg"),
        ]);
        assert_eq!(forward, vec!["a.jpg", "a_png.jpg"]);
        assert_eq!(backward, vec!["a_png.jpg", "a.jpg"]);
    }

    #[test]
    fn test_assign_output_names_counter_fallback() {
        let names = assign_output_names(&[
            PathBuf::from("/set/a_png.jpg"),
            PathBuf::from("/set/a.jpg"),
            PathBuf::from("/set/a.png"),
        ]);
        assert_eq!(names, vec!["a_png.jpg", "a.jpg", "a_png_2.jpg"]);
    }
}
