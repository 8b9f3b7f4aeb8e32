//! 進捗通知と中断フラグ
//!
//! 通知は失敗しても処理を止めない（警告ログのみ）。
//! 中断は処理単位（エントリ/文書）の境界でのみ確認する。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// 進捗の通知先
pub trait ProgressSink: Send + Sync {
    /// `current` は処理済みの件数（1始まり）
    fn notify(&self, current: usize, total: usize, label: &str) -> std::result::Result<(), String>;
}

/// 通知の失敗を握りつぶして警告だけ残す
pub fn report_progress(sink: &dyn ProgressSink, current: usize, total: usize, label: &str) {
    if let Err(e) = sink.notify(current, total, label) {
        warn!(current, total, error = %e, "進捗通知に失敗");
    }
}

/// ログに出すだけの通知先
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn notify(&self, current: usize, total: usize, label: &str) -> std::result::Result<(), String> {
        info!(current, total, "{}", label);
        Ok(())
    }
}

/// 何もしない通知先
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn notify(&self, _current: usize, _total: usize, _label: &str) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// ターミナルのプログレスバー
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl Default for BarProgress {
    fn default() -> Self {
        Self { bar: Mutex::new(None) }
    }
}

impl BarProgress {
    pub fn finish(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl ProgressSink for BarProgress {
    fn notify(&self, current: usize, total: usize, label: &str) -> std::result::Result<(), String> {
        let mut guard = self.bar.lock().map_err(|e| e.to_string())?;
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} {msg}") {
                bar.set_style(style.progress_chars("█▓░"));
            }
            bar
        });
        bar.set_length(total as u64);
        bar.set_position(current as u64);
        bar.set_message(label.to_string());
        Ok(())
    }
}

/// 協調的な中断フラグ
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
