use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Running,
    Stopped,
}

/// Flags shared between the monitor loop and its handles.
pub struct MonitorState {
    running: AtomicBool,
    /// Paused monitors keep ticking but skip clipboard reads
    enabled: AtomicBool,
    /// Last clipboard text the monitor observed or wrote itself
    last_seen: Mutex<Option<String>>,
    stop_signal: Notify,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
            last_seen: Mutex::new(None),
            stop_signal: Notify::new(),
        }
    }

    pub fn status(&self) -> MonitorStatus {
        if self.running.load(Ordering::SeqCst) {
            MonitorStatus::Running
        } else {
            MonitorStatus::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == MonitorStatus::Running
    }

    /// Returns false if a stop was already requested.
    pub fn request_stop(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        // notify_one keeps a permit if the loop is not currently waiting
        self.stop_signal.notify_one();
        was_running
    }

    pub async fn stopped(&self) {
        self.stop_signal.notified().await
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the enabled flag, returning the new value
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }

    fn lock_last_seen(&self) -> MutexGuard<'_, Option<String>> {
        match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("last_seen mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn last_seen(&self) -> Option<String> {
        self.lock_last_seen().clone()
    }

    /// Record `text` as seen unless it already is; returns whether it was new.
    /// Check and update happen under one lock so concurrent ticks agree.
    pub fn mark_if_new(&self, text: &str) -> bool {
        let mut last_seen = self.lock_last_seen();
        if last_seen.as_deref() == Some(text) {
            return false;
        }
        *last_seen = Some(text.to_string());
        true
    }

    /// Record `text` as seen, returning the previous value
    pub fn mark_seen(&self, text: Option<String>) -> Option<String> {
        std::mem::replace(&mut *self.lock_last_seen(), text)
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_running_and_enabled() {
        let state = MonitorState::new();
        assert_eq!(state.status(), MonitorStatus::Running);
        assert!(state.is_enabled());
        assert!(state.last_seen().is_none());
    }

    #[test]
    fn test_stop_is_terminal_and_idempotent() {
        let state = MonitorState::new();
        assert!(state.request_stop());
        assert!(!state.request_stop());
        assert_eq!(state.status(), MonitorStatus::Stopped);
    }

    #[test]
    fn test_toggle_returns_new_value() {
        let state = MonitorState::new();
        assert!(!state.toggle());
        assert!(!state.is_enabled());
        assert!(state.toggle());
        assert!(state.is_enabled());
    }

    #[test]
    fn test_last_seen_tracking() {
        let state = MonitorState::new();
        assert_eq!(state.mark_seen(Some("a".to_string())), None);

        assert!(!state.mark_if_new("a"));
        assert!(state.mark_if_new("b"));
        assert_eq!(state.last_seen().as_deref(), Some("b"));
    }

    #[test]
    fn test_only_one_thread_sees_text_as_new() {
        let state = std::sync::Arc::new(MonitorState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.mark_if_new("same"))
            })
            .collect();

        let new_count = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|was_new| *was_new)
            .count();
        assert_eq!(new_count, 1);
    }

    #[tokio::test]
    async fn test_stop_before_wait_still_wakes() {
        let state = MonitorState::new();
        state.request_stop();
        tokio::time::timeout(std::time::Duration::from_secs(1), state.stopped())
            .await
            .expect("stop permit should be stored");
    }
}
