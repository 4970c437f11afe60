//! 有上限的外部程式排程器
//!
//! 以單一 [`Semaphore`] 控制同時執行的外部程式數量，這是唯一限制並行度的地方。
//! 結果依完成順序收集後再排回輸入順序。

use crate::error::{CodecError, MediaError};
use crate::outcome::{FailureKind, Outcome};
use crate::tools::ToolCommand;
use log::{debug, error, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// 一個待執行的外部程式呼叫，成功時應產生 `artifact`
#[derive(Debug, Clone)]
pub struct GatedJob {
    pub command: ToolCommand,
    pub artifact: PathBuf,
}

impl GatedJob {
    #[must_use]
    pub const fn new(command: ToolCommand, artifact: PathBuf) -> Self {
        Self { command, artifact }
    }
}

/// 執行全部工作，最多同時 `max_parallel` 個
///
/// 回傳的 `Outcome` 與 `jobs` 一一對應；所有工作結束前不會回傳。
pub async fn run_gated(
    jobs: Vec<GatedJob>,
    max_parallel: usize,
    shutdown_signal: Arc<AtomicBool>,
) -> Vec<Outcome> {
    let total = jobs.len();
    let gate = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks = JoinSet::new();

    for (index, job) in jobs.into_iter().enumerate() {
        let gate = Arc::clone(&gate);
        let shutdown_signal = Arc::clone(&shutdown_signal);
        tasks.spawn(async move {
            let outcome = match gate.acquire_owned().await {
                Ok(_permit) => run_one(&job, &shutdown_signal).await,
                Err(_) => Outcome::failed(&MediaError::Cancelled),
            };
            (index, outcome)
        });
    }

    // 任務 panic 時該格維持失敗，長度不變
    let mut outcomes = vec![
        Outcome::Failed {
            kind: FailureKind::CodecProcessFailure,
            reason: "工作未回報結果".to_string(),
        };
        total
    ];

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = outcome,
            Err(e) => error!("擷取工作異常結束: {e}"),
        }
    }

    debug!(
        "排程完成: {}/{} 成功",
        outcomes.iter().filter(|o| o.is_usable()).count(),
        total
    );
    outcomes
}

async fn run_one(job: &GatedJob, shutdown_signal: &AtomicBool) -> Outcome {
    if shutdown_signal.load(Ordering::SeqCst) {
        return Outcome::failed(&MediaError::Cancelled);
    }

    match job.command.execute(Some(shutdown_signal)).await {
        Ok(_) if job.artifact.is_file() => Outcome::Success(vec![job.artifact.clone()]),
        Ok(_) => {
            let err = MediaError::from(CodecError {
                tool: job.command.program_name(),
                exit_code: Some(0),
                message: format!("未產生輸出檔 {}", job.artifact.display()),
            });
            warn!("{err}");
            Outcome::failed(&err)
        }
        Err(MediaError::Cancelled) => Outcome::failed(&MediaError::Cancelled),
        Err(e) => {
            warn!("{} 失敗: {e}", job.artifact.display());
            Outcome::failed(&e)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn touch_job(artifact: PathBuf, delay: &str) -> GatedJob {
        let mut command = ToolCommand::new("sh");
        command.args([
            "-c".to_string(),
            format!("sleep {delay}; touch \"$0\""),
            artifact.to_string_lossy().to_string(),
        ]);
        GatedJob::new(command, artifact)
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let dir = tempdir().unwrap();
        let delays = ["0.3", "0.0", "0.2", "0.1"];
        let jobs = delays
            .iter()
            .enumerate()
            .map(|(i, d)| touch_job(dir.path().join(format!("frame_{i:03}.jpg")), d))
            .collect();

        let outcomes = run_gated(jobs, 4, Arc::new(AtomicBool::new(false))).await;

        assert_eq!(outcomes.len(), 4);
        for (i, outcome) in outcomes.iter().enumerate() {
            let expected = dir.path().join(format!("frame_{i:03}.jpg"));
            assert_eq!(outcome.first_path(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_batch() {
        let dir = tempdir().unwrap();
        let mut failing = ToolCommand::new("sh");
        failing.args(["-c", "exit 1"]);

        let jobs = vec![
            touch_job(dir.path().join("a.jpg"), "0"),
            GatedJob::new(failing, dir.path().join("b.jpg")),
            GatedJob::new(ToolCommand::new("true"), dir.path().join("never.jpg")),
        ];

        let outcomes = run_gated(jobs, 2, Arc::new(AtomicBool::new(false))).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_usable());
        assert!(matches!(
            outcomes[1],
            Outcome::Failed {
                kind: FailureKind::CodecProcessFailure,
                ..
            }
        ));
        assert!(!outcomes[2].is_usable());
    }

    #[tokio::test]
    async fn test_gate_limits_concurrency() {
        let dir = tempdir().unwrap();
        let jobs = (0..4)
            .map(|i| touch_job(dir.path().join(format!("{i}.jpg")), "0.2"))
            .collect();

        let started = Instant::now();
        let outcomes = run_gated(jobs, 1, Arc::new(AtomicBool::new(false))).await;

        assert!(outcomes.iter().all(Outcome::is_usable));
        assert!(started.elapsed() >= Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempdir().unwrap();
        let jobs = (0..3)
            .map(|i| touch_job(dir.path().join(format!("{i}.jpg")), "0"))
            .collect();

        let outcomes = run_gated(jobs, 2, Arc::new(AtomicBool::new(true))).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| matches!(
            o,
            Outcome::Failed {
                kind: FailureKind::Cancelled,
                ..
            }
        )));
    }
}
