use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 安裝 Ctrl-C 處理器，回傳共用的中斷旗標
///
/// 旗標設定後，尚未開始的工作會被標記為取消，執行中的外部程序會被終止。
#[must_use]
pub fn setup_shutdown_signal() -> Arc<AtomicBool> {
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let signal_clone = Arc::clone(&shutdown_signal);

    ctrlc::set_handler(move || {
        signal_clone.store(true, Ordering::SeqCst);
        warn!("收到中斷信號");
        eprintln!("\n收到中斷信號，正在安全關閉...");
    })
    .expect("無法設定 Ctrl-C 處理器");

    shutdown_signal
}

/// 每次執行元件前清除上一次的中斷狀態
pub fn reset_shutdown_signal(shutdown_signal: &AtomicBool) {
    shutdown_signal.store(false, Ordering::SeqCst);
}
