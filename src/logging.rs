//! ログ初期化
//!
//! コンソールとログファイル（`classificacao_porcoes.log`）の両方へ出力する。
//! レベルは `LOG_LEVEL` → `RUST_LOG` → 既定値（info / --verbose 時 debug）の順で決まる。

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "classificacao_porcoes.log";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// ログを初期化（2回目以降の呼び出しは何もしない）
pub fn init_logging(verbose: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let level = resolve_log_level(verbose);

        let console = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(&level));

        let file_layer = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(Path::new(LOG_FILE_NAME))
        {
            Ok(file) => Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .with_filter(EnvFilter::new(&level)),
            ),
            Err(e) => {
                eprintln!("ログファイルを開けません ({}): {}", LOG_FILE_NAME, e);
                None
            }
        };

        let subscriber = tracing_subscriber::registry().with(console).with(file_layer);

        // 既にグローバルsubscriberがある場合（テスト等）はそのまま続行
        if subscriber.try_init().is_err() {
            tracing::debug!("tracing subscriber already initialized");
        }
    });
}

fn resolve_log_level(verbose: bool) -> String {
    std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_lowercase())
        .unwrap_or_else(|| if verbose { "debug".into() } else { "info".into() })
}
