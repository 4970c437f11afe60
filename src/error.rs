//! 錯誤分類
//!
//! 單一項目的失敗會轉成 [`crate::outcome::Outcome::Failed`]，
//! 只有執行前置條件失敗（無法 probe、沒有輸入）才會以 `Err` 回傳。

use crate::outcome::FailureKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// 外部工具呼叫失敗
#[derive(Debug, Clone, Error)]
#[error("{tool} 執行失敗 ({}): {message}", describe_exit_code(.exit_code))]
pub struct CodecError {
    pub tool: String,
    pub exit_code: Option<i32>,
    pub message: String,
}

fn describe_exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "無結束代碼".to_string(), |c| format!("exit code {c}"))
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("來源檔案不存在: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("無法解碼 {}: {message}", .path.display())]
    DecodeFailure { path: PathBuf, message: String },

    #[error(transparent)]
    CodecProcessFailure(#[from] CodecError),

    #[error("{tool} 執行逾時（{:.1} 秒）", .after.as_secs_f64())]
    Timeout { tool: String, after: Duration },

    #[error("輸入不足: {0}")]
    InsufficientInput(String),

    #[error("操作已取消")]
    Cancelled,

    #[error("檔案操作失敗 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MediaError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn decode(path: &Path, message: impl ToString) -> Self {
        Self::DecodeFailure {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InputMissing(_) => FailureKind::InputMissing,
            Self::DecodeFailure { .. } => FailureKind::DecodeFailure,
            Self::CodecProcessFailure(_) => FailureKind::CodecProcessFailure,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::InsufficientInput(_) => FailureKind::InsufficientInput,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Io { .. } => FailureKind::Io,
        }
    }
}
