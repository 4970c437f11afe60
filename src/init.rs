use env_logger::{Env, Target};

/// 初始化日誌，預設等級 `info`，可用 `RUST_LOG` 覆寫
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .format_timestamp_secs()
        .try_init();
}
