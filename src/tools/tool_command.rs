//! 外部程式閘道
//!
//! 每次呼叫只啟動一次外部程式，擷取結束代碼與輸出，逾時視為一般失敗。
//! 不在內部重試，重試策略由呼叫端決定。

use crate::error::{CodecError, MediaError, MediaResult};
use log::{debug, warn};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// 預設單次呼叫逾時
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// 同步等待時輪詢程序狀態的間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 非同步等待時檢查中斷訊號的間隔
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    #[must_use]
    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.file_name().map_or_else(
            || self.program.to_string_lossy().to_string(),
            |n| n.to_string_lossy().to_string(),
        )
    }

    fn spawn_failure(&self, e: &std::io::Error) -> MediaError {
        MediaError::CodecProcessFailure(CodecError {
            tool: self.program_name(),
            exit_code: None,
            message: format!("無法啟動: {e}"),
        })
    }

    fn timeout_failure(&self) -> MediaError {
        MediaError::Timeout {
            tool: self.program_name(),
            after: self.timeout,
        }
    }

    fn into_result(
        &self,
        status: std::process::ExitStatus,
        stdout: &[u8],
        stderr: &[u8],
    ) -> MediaResult<ToolOutput> {
        let output = ToolOutput {
            stdout: String::from_utf8_lossy(stdout).to_string(),
            stderr: String::from_utf8_lossy(stderr).to_string(),
        };

        if !status.success() {
            return Err(MediaError::CodecProcessFailure(CodecError {
                tool: self.program_name(),
                exit_code: status.code(),
                message: output.stderr.trim().to_string(),
            }));
        }

        Ok(output)
    }

    /// 非同步執行
    ///
    /// 收到中斷訊號時終止子程序並回傳 [`MediaError::Cancelled`]。
    pub async fn execute(&self, shutdown_signal: Option<&AtomicBool>) -> MediaResult<ToolOutput> {
        debug!("執行: {} {}", self.program.display(), self.args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| self.spawn_failure(&e))?;

        tokio::select! {
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => self.into_result(output.status, &output.stdout, &output.stderr),
                Ok(Err(e)) => Err(MediaError::CodecProcessFailure(CodecError {
                    tool: self.program_name(),
                    exit_code: None,
                    message: format!("等待程序時發生 I/O 錯誤: {e}"),
                })),
                Err(_elapsed) => {
                    warn!("{} 逾時，已終止程序", self.program_name());
                    Err(self.timeout_failure())
                }
            },
            () = wait_for_shutdown(shutdown_signal) => {
                warn!("收到中斷訊號，終止 {}", self.program_name());
                Err(MediaError::Cancelled)
            }
        }
    }

    /// 同步執行（供 rayon 工作執行緒使用）
    pub fn execute_blocking(&self) -> MediaResult<ToolOutput> {
        debug!("執行: {} {}", self.program.display(), self.args.join(" "));

        let mut child = StdCommand::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_failure(&e))?;

        // 背景讀取輸出，避免管線緩衝區塞滿導致子程序卡住
        let stdout_reader = child.stdout.take().map(drain_in_background);
        let stderr_reader = child.stderr.take().map(drain_in_background);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!("{} 逾時，終止程序", self.program_name());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.timeout_failure());
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(MediaError::CodecProcessFailure(CodecError {
                        tool: self.program_name(),
                        exit_code: None,
                        message: format!("無法檢查程序狀態: {e}"),
                    }));
                }
            }
        };

        let stdout = stdout_reader.map(join_reader).unwrap_or_default();
        let stderr = stderr_reader.map(join_reader).unwrap_or_default();

        self.into_result(status, &stdout, &stderr)
    }
}

fn drain_in_background<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = source.read_to_end(&mut buffer);
        buffer
    })
}

fn join_reader(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// 等到中斷訊號被設定；沒有訊號時永遠不會完成
pub async fn wait_for_shutdown(shutdown_signal: Option<&AtomicBool>) {
    let Some(signal) = shutdown_signal else {
        return std::future::pending().await;
    };

    while !signal.load(Ordering::SeqCst) {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
}
