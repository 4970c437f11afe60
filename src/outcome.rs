use crate::error::MediaError;
use std::path::PathBuf;
use std::time::Duration;

/// 失敗種類（純資料，可跨執行緒複製）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InputMissing,
    DecodeFailure,
    CodecProcessFailure,
    Timeout,
    InsufficientInput,
    Cancelled,
    Io,
}

/// 單一工作項目的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Vec<PathBuf>),
    Repaired(Vec<PathBuf>),
    Failed { kind: FailureKind, reason: String },
}

impl Outcome {
    #[must_use]
    pub fn failed(error: &MediaError) -> Self {
        Self::Failed {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Repaired(_))
    }

    /// 成功時寫出的檔案；失敗時為空
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Self::Success(paths) | Self::Repaired(paths) => paths,
            Self::Failed { .. } => &[],
        }
    }

    #[must_use]
    pub fn first_path(&self) -> Option<PathBuf> {
        self.paths().first().cloned()
    }
}

/// 一次批次呼叫的彙總結果
///
/// `outcomes` 永遠與輸入工作項目一一對應且維持原始順序。
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub outcomes: Vec<Outcome>,
    pub elapsed: Duration,
}

impl BatchResult {
    #[must_use]
    pub const fn new(outcomes: Vec<Outcome>, elapsed: Duration) -> Self {
        Self { outcomes, elapsed }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Success(_)))
            .count()
    }

    #[must_use]
    pub fn repaired_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Repaired(_)))
            .count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Failed { .. }))
            .count()
    }

    #[must_use]
    pub fn items_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total() as f64 / secs
        } else {
            0.0
        }
    }
}
