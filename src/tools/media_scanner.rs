use crate::error::{MediaError, MediaResult};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 掃描目錄下符合條件的檔案，依相對路徑自然排序（`img_2` 在 `img_10` 之前）
///
/// `recursive` 為 `false` 時只看第一層。隱藏檔（以 `.` 開頭）一律略過。
pub fn scan_media(
    directory: &Path,
    recursive: bool,
    accept: impl Fn(&Path) -> bool,
) -> MediaResult<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(MediaError::InputMissing(directory.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(walkdir::DirEntry::into_path)
        .filter(|path| accept(path))
        .collect();

    files.sort_by(|a, b| natural_path_cmp(directory, a, b));
    Ok(files)
}

/// 以相對於 `base` 的路徑做自然排序比較
#[must_use]
pub fn natural_path_cmp(base: &Path, a: &Path, b: &Path) -> Ordering {
    let relative = |path: &Path| {
        path.strip_prefix(base)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    };
    natord::compare(&relative(a), &relative(b)).then_with(|| a.cmp(b))
}
