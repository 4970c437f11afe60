//! 暫存區
//!
//! 一次執行專屬的暫存目錄，所有中間檔（影格、修復檔、尚未完成的輸出）都寫在這裡。
//! 不論成功、部分失敗或中斷，`Drop` 時整個目錄都會被移除。

use crate::error::{MediaError, MediaResult};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use uuid::Uuid;

/// 暫存區
///
/// 只由建立它的那一次執行寫入，結束後其他元件不得再參照其中的檔案。
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    run_id: Uuid,
}

impl StagingArea {
    /// 建立暫存區；`parent` 為 `None` 時使用系統暫存目錄
    pub fn create(parent: Option<&Path>, label: &str) -> MediaResult<Self> {
        let run_id = Uuid::new_v4();
        let prefix = format!(".{label}_");
        let mut builder = Builder::new();
        builder.prefix(&prefix);

        let dir = match parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .map_err(|e| MediaError::io(parent, e))?,
            None => builder
                .tempdir()
                .map_err(|e| MediaError::io(&std::env::temp_dir(), e))?,
        };

        debug!("建立暫存區 {} ({run_id})", dir.path().display());
        Ok(Self { dir, run_id })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// 把整批已完成的產物移到第二個目錄
    ///
    /// 只能在整批收集完成後呼叫；缺少的項目保持 `None`，順序不變。
    pub fn promote(
        &self,
        artifacts: &[Option<PathBuf>],
        destination: &RunDirectory,
    ) -> Vec<Option<PathBuf>> {
        artifacts
            .iter()
            .map(|artifact| {
                let source = artifact.as_ref()?;
                let name = source.file_name()?;
                let target = destination.path().join(name);
                match move_file(source, &target) {
                    Ok(()) => Some(target),
                    Err(e) => {
                        warn!("無法移動 {}: {e}", source.display());
                        None
                    }
                }
            })
            .collect()
    }

    /// 明確移除暫存區並回報錯誤（`Drop` 會靜默移除）
    pub fn close(self) -> MediaResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| MediaError::io(&path, e))?;
        debug!("已移除暫存區 {}", path.display());
        Ok(())
    }
}

/// 整批完成後存放影格的目錄，與暫存區分開命名
///
/// 存活到本次執行結束（合成完成）為止。
#[derive(Debug)]
pub struct RunDirectory {
    dir: TempDir,
}

impl RunDirectory {
    pub fn create(parent: Option<&Path>, run_id: Uuid) -> MediaResult<Self> {
        let prefix = format!("grid_frames_{}_", run_id.simple());
        let mut builder = Builder::new();
        builder.prefix(&prefix);

        let dir = match parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .map_err(|e| MediaError::io(parent, e))?,
            None => builder
                .tempdir()
                .map_err(|e| MediaError::io(&std::env::temp_dir(), e))?,
        };
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// 移動檔案；跨檔案系統時改用複製後刪除
pub fn move_file(source: &Path, destination: &Path) -> MediaResult<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    fs::copy(source, destination).map_err(|e| MediaError::io(destination, e))?;
    if let Err(e) = fs::remove_file(source) {
        warn!("已複製但無法刪除來源 {}: {e}", source.display());
    }
    Ok(())
}

/// 依序搬移一組檔案，全部成功或全部不留
///
/// 任何一個搬移失敗時，已搬到目的地的檔案會被移除，再回傳該錯誤。
pub fn move_all(moves: &[(PathBuf, PathBuf)]) -> MediaResult<Vec<PathBuf>> {
    let mut moved: Vec<PathBuf> = Vec::with_capacity(moves.len());
    for (source, destination) in moves {
        if let Err(e) = move_file(source, destination) {
            for path in &moved {
                if let Err(remove_err) = fs::remove_file(path) {
                    warn!("無法移除已搬移的檔案 {}: {remove_err}", path.display());
                }
            }
            return Err(e);
        }
        moved.push(destination.clone());
    }
    Ok(moved)
}
