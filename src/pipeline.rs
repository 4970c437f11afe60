//! 管線監督狀態機
//!
//! `Idle → Sampling → Dispatching → Collecting → Composing → Finalizing → Done`，
//! 任何非終止狀態都可能進入 `Failed`。暫存區的清理由 [`crate::tools::StagingArea`]
//! 的 `Drop` 負責，與最終狀態無關。

use crate::error::MediaError;
use log::{debug, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Sampling,
    Dispatching,
    Collecting,
    Composing,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// 合法的狀態轉換
    ///
    /// 沒有合成步驟的批次（例如影像縮圖）可以從 `Collecting` 直接進入 `Finalizing`，
    /// 影像預覽則不需要派送步驟，可以從 `Sampling` 直接進入 `Composing`。
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        use PipelineState::{
            Collecting, Composing, Dispatching, Done, Failed, Finalizing, Idle, Sampling,
        };

        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, next),
            (_, Failed)
                | (Idle, Sampling)
                | (Sampling, Dispatching)
                | (Sampling, Composing)
                | (Dispatching, Collecting)
                | (Collecting, Composing)
                | (Collecting, Finalizing)
                | (Composing, Finalizing)
                | (Finalizing, Done)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Sampling => "sampling",
            Self::Dispatching => "dispatching",
            Self::Collecting => "collecting",
            Self::Composing => "composing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 追蹤一次執行的階段
#[derive(Debug)]
pub struct RunSupervisor {
    label: String,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl RunSupervisor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// 進入下一個階段，非法轉換會被忽略並記錄警告
    pub fn advance(&mut self, next: PipelineState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(
                "[{}] 忽略非法的狀態轉換: {} -> {}",
                self.label, self.state, next
            );
            return false;
        }

        debug!("[{}] {} -> {}", self.label, self.state, next);
        self.state = next;
        self.history.push(next);
        true
    }

    /// 進入 `Failed` 並把錯誤原封不動地傳回，方便搭配 `map_err`
    pub fn fail(&mut self, error: MediaError) -> MediaError {
        if !self.state.is_terminal() {
            debug!("[{}] {} -> failed: {error}", self.label, self.state);
            self.state = PipelineState::Failed;
            self.history.push(PipelineState::Failed);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_video_run() {
        let mut supervisor = RunSupervisor::new("grid");
        for next in [
            PipelineState::Sampling,
            PipelineState::Dispatching,
            PipelineState::Collecting,
            PipelineState::Composing,
            PipelineState::Finalizing,
            PipelineState::Done,
        ] {
            assert!(supervisor.advance(next), "無法進入 {next}");
        }
        assert_eq!(supervisor.state(), PipelineState::Done);
        assert_eq!(supervisor.history().len(), 7);
    }

    #[test]
    fn test_resize_run_skips_composing() {
        let mut supervisor = RunSupervisor::new("resize");
        assert!(supervisor.advance(PipelineState::Sampling));
        assert!(supervisor.advance(PipelineState::Dispatching));
        assert!(supervisor.advance(PipelineState::Collecting));
        assert!(supervisor.advance(PipelineState::Finalizing));
        assert!(supervisor.advance(PipelineState::Done));
    }

    #[test]
    fn test_illegal_transition_is_ignored() {
        let mut supervisor = RunSupervisor::new("grid");
        assert!(!supervisor.advance(PipelineState::Composing));
        assert_eq!(supervisor.state(), PipelineState::Idle);
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut supervisor = RunSupervisor::new("grid");
        supervisor.advance(PipelineState::Sampling);
        let err = supervisor.fail(MediaError::InsufficientInput("影片太短".to_string()));
        assert!(matches!(err, MediaError::InsufficientInput(_)));
        assert_eq!(supervisor.state(), PipelineState::Failed);

        assert!(!supervisor.advance(PipelineState::Dispatching));
        assert!(!supervisor.advance(PipelineState::Done));
        assert_eq!(supervisor.state(), PipelineState::Failed);
    }

    #[test]
    fn test_done_is_terminal() {
        assert!(!PipelineState::Done.can_advance_to(PipelineState::Failed));
        assert!(PipelineState::Collecting.can_advance_to(PipelineState::Failed));
    }
}
