use crate::shared::error::{AppError, AppResult};

/// Platform clipboard access.
///
/// `read` must return promptly; the monitor calls it once per tick.
/// `Ok(None)` means the clipboard holds no text.
pub trait ClipboardSource: Send + Sync {
    fn read(&self) -> AppResult<Option<String>>;

    fn write(&self, text: &str) -> AppResult<()>;
}

/// The OS clipboard via `cli-clipboard`, which reads without activating the app.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardSource for SystemClipboard {
    fn read(&self) -> AppResult<Option<String>> {
        let text = cli_clipboard::get_contents().map_err(|e| AppError::Clipboard(e.to_string()))?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    fn write(&self, text: &str) -> AppResult<()> {
        cli_clipboard::set_contents(text.to_string()).map_err(|e| AppError::Clipboard(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory clipboard whose reads can be made to fail.
    #[derive(Default)]
    pub struct FakeClipboard {
        text: Mutex<Option<String>>,
        failing: Mutex<bool>,
        reads: AtomicUsize,
    }

    impl FakeClipboard {
        pub fn set(&self, text: &str) {
            *self.text.lock().unwrap() = Some(text.to_string());
        }

        pub fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        pub fn current(&self) -> Option<String> {
            self.text.lock().unwrap().clone()
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl ClipboardSource for FakeClipboard {
        fn read(&self) -> AppResult<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if *self.failing.lock().unwrap() {
                return Err(AppError::Clipboard("clipboard unavailable".to_string()));
            }
            Ok(self.text.lock().unwrap().clone().filter(|t| !t.is_empty()))
        }

        fn write(&self, text: &str) -> AppResult<()> {
            self.set(text);
            Ok(())
        }
    }
}
