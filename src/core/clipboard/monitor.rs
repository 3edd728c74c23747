use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::history::ClipboardHistory;
use super::source::ClipboardSource;
use super::state::{MonitorState, MonitorStatus};
use super::storage::HistoryFile;
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::preview_text;

/// Default polling interval for clipboard changes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const MAX_CONSECUTIVE_ERRORS: u32 = 10;
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(5000);
const PREVIEW_GRAPHEMES: usize = 20;

/// Result of a single tick
#[derive(Debug)]
pub enum PollOutcome {
    /// Monitoring is disabled; the clipboard was not read
    Paused,
    Empty,
    /// Same text as the previous tick
    Unchanged,
    /// New text inserted at the front of the history
    Captured,
    /// Changed text that already exists somewhere in the history
    Duplicate,
    ReadFailed(AppError),
}

/// Clipboard monitor that polls for changes and records them in the history.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct ClipboardMonitor {
    state: Arc<MonitorState>,
    source: Arc<dyn ClipboardSource>,
    history: ClipboardHistory,
    file: Arc<HistoryFile>,
    interval: Duration,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ClipboardMonitor {
    /// Create a monitor in the `Running` state. Call [`start`](Self::start) to spawn the loop.
    pub fn new(
        source: Arc<dyn ClipboardSource>,
        history: ClipboardHistory,
        file: Arc<HistoryFile>,
        interval: Duration,
    ) -> Self {
        Self {
            state: Arc::new(MonitorState::new()),
            source,
            history,
            file,
            interval,
            task: Arc::new(Mutex::new(None)),
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Monitor task mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Spawn the polling loop on the current tokio runtime
    pub fn start(&self) {
        let mut task = self.lock_task();
        if task.is_some() {
            tracing::warn!("ClipboardMonitor already started");
            return;
        }
        if !self.state.is_running() {
            tracing::warn!("ClipboardMonitor was stopped and cannot be restarted");
            return;
        }

        let monitor = self.clone();
        *task = Some(tokio::spawn(async move { monitor.run().await }));
    }

    async fn run(self) {
        tracing::info!(interval = ?self.interval, "ClipboardMonitor started");
        let mut consecutive_errors = 0u32;

        // The stop flag is only consulted between ticks; an in-flight read finishes
        while self.state.is_running() {
            let delay = match self.poll_once().await {
                PollOutcome::ReadFailed(e) => {
                    consecutive_errors += 1;

                    if consecutive_errors == 1 || consecutive_errors % 10 == 0 {
                        tracing::warn!(consecutive_errors, error = %e, "Failed to read clipboard");
                    }
                    if consecutive_errors == MAX_CONSECUTIVE_ERRORS {
                        tracing::warn!("Too many consecutive clipboard errors, reducing polling frequency");
                    }
                    backoff_interval(self.interval, consecutive_errors)
                }
                _ => {
                    consecutive_errors = 0;
                    self.interval
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.state.stopped() => {}
            }
        }

        tracing::info!("ClipboardMonitor stopped");
    }

    /// Run one tick: read the clipboard and record it if it changed.
    pub async fn poll_once(&self) -> PollOutcome {
        if !self.state.is_enabled() {
            return PollOutcome::Paused;
        }

        let text = match self.source.read() {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => return PollOutcome::Empty,
            Err(e) => return PollOutcome::ReadFailed(e),
        };

        if !self.state.mark_if_new(&text) {
            return PollOutcome::Unchanged;
        }

        if self.history.add(&text) {
            tracing::info!(preview = %preview_text(&text, PREVIEW_GRAPHEMES), "Clipboard captured");
            self.persist().await;
            PollOutcome::Captured
        } else {
            tracing::debug!("Clipboard changed to text already in history");
            PollOutcome::Duplicate
        }
    }

    /// Flush the current history to disk off the async workers.
    ///
    /// Failures are logged; the in-memory history stays authoritative.
    pub async fn persist(&self) {
        let snapshot = self.history.snapshot();
        let file = Arc::clone(&self.file);

        let result = tokio::task::spawn_blocking(move || file.save(&snapshot))
            .await
            .map_err(AppError::from)
            .and_then(|saved| saved);

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to save clipboard history");
        }
    }

    /// Put `text` on the clipboard without the monitor capturing it as a new copy
    pub fn copy_to_clipboard(&self, text: &str) -> AppResult<()> {
        let previous = self.state.mark_seen(Some(text.to_string()));
        if let Err(e) = self.source.write(text) {
            self.state.mark_seen(previous);
            return Err(e);
        }
        Ok(())
    }

    /// Request the loop to stop; no tick starts after the request is observed
    pub fn stop(&self) {
        if self.state.request_stop() {
            tracing::info!("ClipboardMonitor stop requested");
        }
    }

    /// Stop and wait for the loop to exit
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.lock_task().take();
        if let Some(handle) = task {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "ClipboardMonitor task ended abnormally");
            }
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.state.status()
    }

    /// Enable clipboard monitoring
    pub fn enable(&self) {
        self.state.set_enabled(true);
        tracing::info!("ClipboardMonitor enabled");
    }

    /// Disable clipboard monitoring
    pub fn disable(&self) {
        self.state.set_enabled(false);
        tracing::info!("ClipboardMonitor disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    /// Toggle monitoring on/off
    pub fn toggle(&self) -> bool {
        let enabled = self.state.toggle();
        tracing::info!(enabled, "ClipboardMonitor toggled");
        enabled
    }

    pub fn last_seen(&self) -> Option<String> {
        self.state.last_seen()
    }

    pub fn history(&self) -> &ClipboardHistory {
        &self.history
    }
}

/// Exponential backoff once reads have failed `MAX_CONSECUTIVE_ERRORS` times in a row
fn backoff_interval(base: Duration, consecutive_errors: u32) -> Duration {
    if consecutive_errors < MAX_CONSECUTIVE_ERRORS {
        return base;
    }
    let exponent = (consecutive_errors - MAX_CONSECUTIVE_ERRORS).min(4);
    (base * 2u32.pow(exponent)).min(MAX_POLL_INTERVAL.max(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clipboard::source::testing::FakeClipboard;

    struct Fixture {
        _dir: tempfile::TempDir,
        clipboard: Arc<FakeClipboard>,
        history: ClipboardHistory,
        file: Arc<HistoryFile>,
        monitor: ClipboardMonitor,
    }

    fn fixture(interval: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clipboard = Arc::new(FakeClipboard::default());
        let history = ClipboardHistory::default();
        let file = Arc::new(HistoryFile::new(dir.path().join("history.json")));
        let monitor = ClipboardMonitor::new(clipboard.clone(), history.clone(), file.clone(), interval);
        Fixture {
            _dir: dir,
            clipboard,
            history,
            file,
            monitor,
        }
    }

    fn contents(history: &ClipboardHistory) -> Vec<String> {
        history.items().into_iter().map(|item| item.content).collect()
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_captures_new_text_and_persists() {
        let f = fixture(DEFAULT_POLL_INTERVAL);
        f.clipboard.set("hello");

        assert!(matches!(f.monitor.poll_once().await, PollOutcome::Captured));

        assert_eq!(contents(&f.history), vec!["hello"]);
        assert_eq!(f.monitor.last_seen().as_deref(), Some("hello"));
        let saved = f.file.load().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].content, "hello");
    }

    #[tokio::test]
    async fn test_static_clipboard_is_not_re_added() {
        let f = fixture(DEFAULT_POLL_INTERVAL);
        f.clipboard.set("same");
        f.monitor.poll_once().await;
        let revision = f.history.snapshot().revision;

        for _ in 0..3 {
            assert!(matches!(f.monitor.poll_once().await, PollOutcome::Unchanged));
        }
        assert_eq!(f.history.snapshot().revision, revision);
    }

    #[tokio::test]
    async fn test_empty_and_failed_reads_change_nothing() {
        let f = fixture(DEFAULT_POLL_INTERVAL);
        assert!(matches!(f.monitor.poll_once().await, PollOutcome::Empty));

        f.clipboard.set("text");
        f.clipboard.set_failing(true);
        assert!(matches!(f.monitor.poll_once().await, PollOutcome::ReadFailed(_)));

        assert!(f.history.is_empty());
        assert!(f.monitor.last_seen().is_none());
        assert!(!f.file.path().exists());
    }

    #[tokio::test]
    async fn test_paused_monitor_does_not_read() {
        let f = fixture(DEFAULT_POLL_INTERVAL);
        f.clipboard.set("ignored");
        f.monitor.disable();

        assert!(matches!(f.monitor.poll_once().await, PollOutcome::Paused));
        assert_eq!(f.clipboard.reads(), 0);

        f.monitor.enable();
        assert!(matches!(f.monitor.poll_once().await, PollOutcome::Captured));
    }

    #[tokio::test]
    async fn test_changed_to_existing_entry_keeps_order() {
        let f = fixture(DEFAULT_POLL_INTERVAL);
        for text in ["a", "b"] {
            f.clipboard.set(text);
            f.monitor.poll_once().await;
        }

        f.clipboard.set("a");
        assert!(matches!(f.monitor.poll_once().await, PollOutcome::Duplicate));

        assert_eq!(contents(&f.history), vec!["b", "a"]);
        assert_eq!(f.monitor.last_seen().as_deref(), Some("a"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ticks_capture_once() {
        let f = fixture(DEFAULT_POLL_INTERVAL);
        f.clipboard.set("racing");

        let ticks: Vec<_> = (0..8)
            .map(|_| {
                let monitor = f.monitor.clone();
                tokio::spawn(async move { monitor.poll_once().await })
            })
            .collect();
        let mut captured = 0;
        for tick in ticks {
            match tick.await.unwrap() {
                PollOutcome::Captured => captured += 1,
                PollOutcome::Unchanged => {}
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(captured, 1);
        assert_eq!(contents(&f.history), vec!["racing"]);
    }

    #[tokio::test]
    async fn test_own_copy_is_not_captured() {
        let f = fixture(DEFAULT_POLL_INTERVAL);

        f.monitor.copy_to_clipboard("pasted back").unwrap();

        assert_eq!(f.clipboard.current().as_deref(), Some("pasted back"));
        assert!(matches!(f.monitor.poll_once().await, PollOutcome::Unchanged));
        assert!(f.history.is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_history_and_polling() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let clipboard = Arc::new(FakeClipboard::default());
        let history = ClipboardHistory::default();
        let file = Arc::new(HistoryFile::new(blocker.join("history.json")));
        let monitor = ClipboardMonitor::new(clipboard.clone(), history.clone(), file, DEFAULT_POLL_INTERVAL);

        clipboard.set("first");
        assert!(matches!(monitor.poll_once().await, PollOutcome::Captured));
        clipboard.set("second");
        assert!(matches!(monitor.poll_once().await, PollOutcome::Captured));

        assert_eq!(contents(&history), vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_loop_lifecycle() {
        let f = fixture(Duration::from_millis(10));
        assert_eq!(f.monitor.status(), MonitorStatus::Running);

        f.monitor.start();
        f.clipboard.set("from loop");
        let history = f.history.clone();
        wait_until(|| history.len() == 1).await;

        f.monitor.shutdown().await;
        assert_eq!(f.monitor.status(), MonitorStatus::Stopped);

        let reads = f.clipboard.reads();
        f.clipboard.set("after stop");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.clipboard.reads(), reads);
        assert_eq!(contents(&f.history), vec!["from loop"]);
    }

    #[tokio::test]
    async fn test_stop_wakes_long_sleep_promptly() {
        let f = fixture(Duration::from_secs(60));
        f.monitor.start();
        let clipboard = f.clipboard.clone();
        wait_until(|| clipboard.reads() >= 1).await;

        tokio::time::timeout(Duration::from_secs(1), f.monitor.shutdown())
            .await
            .expect("shutdown should not wait for the full interval");
    }

    #[tokio::test]
    async fn test_start_after_stop_is_ignored() {
        let f = fixture(Duration::from_millis(10));
        f.monitor.stop();
        f.monitor.start();
        f.clipboard.set("never");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.clipboard.reads(), 0);
    }

    #[test]
    fn test_backoff_interval() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_interval(base, 1), base);
        assert_eq!(backoff_interval(base, 9), base);
        assert_eq!(backoff_interval(base, 10), base);
        assert_eq!(backoff_interval(base, 11), Duration::from_millis(1000));
        assert_eq!(backoff_interval(base, 13), Duration::from_millis(4000));
        assert_eq!(backoff_interval(base, 50), Duration::from_millis(5000));
    }
}
