//! 損毀影像修復
//!
//! 每張損毀影像最多呼叫一次外部修復工具，修復後再重試一次。
//! 任何一步失敗都會把原始檔案放回原位，原始檔案不會遺失。

use crate::error::{MediaError, MediaResult};
use crate::tools::{ToolCommand, move_file};
use image::ImageError;
use log::{debug, error, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::Builder;

/// 判斷解碼錯誤是否為檔案損毀
///
/// 格式不支援或檔案不存在不算損毀。
#[must_use]
pub fn is_corruption(error: &ImageError) -> bool {
    match error {
        ImageError::Decoding(_) => true,
        ImageError::IoError(e) => e.kind() != ErrorKind::NotFound,
        _ => false,
    }
}

/// `<stem>_corrupt<ext>`
#[must_use]
pub fn corrupt_aside_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().to_string());
    let name = match source.extension() {
        Some(ext) => format!("{stem}_corrupt.{}", ext.to_string_lossy()),
        None => format!("{stem}_corrupt"),
    };
    source.with_file_name(name)
}

/// ImageMagick 相容的修復工具
#[derive(Debug, Clone)]
pub struct RepairTool {
    program: String,
    timeout: Duration,
}

impl RepairTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn command(&self, corrupt: &Path, output: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.program);
        cmd.arg(corrupt.to_string_lossy())
            .args(["-strip", "-interlace", "none", "-colorspace", "sRGB"])
            .arg(output.to_string_lossy())
            .timeout(self.timeout);
        cmd
    }

    /// 修復 `source` 並以修復後的檔案重試 `retry`
    ///
    /// 修復期間原始檔改名為 `<stem>_corrupt<ext>`。成功後刪除改名的原始檔；
    /// 失敗時（包含重試失敗）刪除修復檔並把原始檔改回原名。
    pub fn repair_and_retry<T>(
        &self,
        source: &Path,
        retry: impl FnOnce(&Path) -> MediaResult<T>,
    ) -> MediaResult<T> {
        let aside = corrupt_aside_path(source);
        fs::rename(source, &aside).map_err(|e| MediaError::io(source, e))?;
        debug!("已暫時改名 {} -> {}", source.display(), aside.display());

        let result = self
            .replace_with_repaired(&aside, source)
            .and_then(|()| retry(source));

        match result {
            Ok(value) => {
                if let Err(e) = fs::remove_file(&aside) {
                    warn!("無法刪除損毀的原始檔 {}: {e}", aside.display());
                }
                Ok(value)
            }
            Err(e) => {
                restore_original(&aside, source);
                Err(e)
            }
        }
    }

    fn replace_with_repaired(&self, corrupt: &Path, source: &Path) -> MediaResult<()> {
        let workspace = Builder::new()
            .prefix("repair_")
            .tempdir()
            .map_err(|e| MediaError::io(&std::env::temp_dir(), e))?;

        let file_name = match source.extension() {
            Some(ext) => format!("repaired.{}", ext.to_string_lossy()),
            None => "repaired".to_string(),
        };
        let repaired = workspace.path().join(file_name);

        self.command(corrupt, &repaired).execute_blocking()?;

        if !repaired.is_file() {
            return Err(MediaError::decode(source, "修復工具沒有產生輸出檔"));
        }

        move_file(&repaired, source)
    }
}

fn restore_original(aside: &Path, source: &Path) {
    if !aside.exists() {
        return;
    }

    if source.exists()
        && let Err(e) = fs::remove_file(source)
    {
        error!("無法移除修復檔 {}: {e}", source.display());
        return;
    }

    match fs::rename(aside, source) {
        Ok(()) => debug!("已還原原始檔 {}", source.display()),
        Err(e) => error!(
            "無法還原原始檔 {} -> {}: {e}",
            aside.display(),
            source.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::error::{DecodingError, ImageFormatHint};
    use std::io;
    use tempfile::tempdir;

    #[test]
    fn test_corruption_signature() {
        let decoding = ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Unknown,
            "broken data",
        ));
        assert!(is_corruption(&decoding));
        assert!(is_corruption(&ImageError::IoError(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "eof"
        ))));
        assert!(!is_corruption(&ImageError::IoError(io::Error::new(
            io::ErrorKind::NotFound,
            "gone"
        ))));
    }

    #[test]
    fn test_corrupt_aside_path() {
        assert_eq!(
            corrupt_aside_path(Path::new("/set/IMG_01.jpg")),
            PathBuf::from("/set/IMG_01_corrupt.jpg")
        );
    }

    #[test]
    fn test_command_arguments() {
        let tool = RepairTool::new("convert", Duration::from_secs(30));
        let cmd = tool.command(Path::new("/a/x_corrupt.jpg"), Path::new("/tmp/repaired.jpg"));
        assert_eq!(
            cmd.arg_list(),
            [
                "/a/x_corrupt.jpg",
                "-strip",
                "-interlace",
                "none",
                "-colorspace",
                "sRGB",
                "/tmp/repaired.jpg"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_repair_restores_original() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.jpg");
        fs::write(&source, b"original bytes").unwrap();

        let tool = RepairTool::new("false", Duration::from_secs(5));
        let result: MediaResult<()> = tool.repair_and_retry(&source, |_| Ok(()));

        assert!(matches!(result, Err(MediaError::CodecProcessFailure(_))));
        assert_eq!(fs::read(&source).unwrap(), b"original bytes");
        assert!(!corrupt_aside_path(&source).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_retry_restores_original() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.jpg");
        fs::write(&source, b"original bytes").unwrap();

        // cp <corrupt> ... <output>：把損毀檔原樣複製當作修復結果
        let script = dir.path().join("fake_repair.sh");
        fs::write(&script, "#!/bin/sh\ncp \"$1\" \"$7\"\n").unwrap();
        let tool = RepairTool::new(
            format!("{}", script.display()),
            Duration::from_secs(5),
        );
        make_executable(&script);

        let result: MediaResult<()> = tool.repair_and_retry(&source, |path| {
            Err(MediaError::decode(path, "still broken"))
        });

        assert!(matches!(result, Err(MediaError::DecodeFailure { .. })));
        assert_eq!(fs::read(&source).unwrap(), b"original bytes");
        assert!(!corrupt_aside_path(&source).exists());
    }

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
