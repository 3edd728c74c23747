//! Clipboard history feature
//!
//! Foreground operations over the history: search, delete, clear, copy back,
//! pause/resume. Every mutation is followed by a flush of a fresh snapshot.

use std::sync::Arc;

use crate::core::clipboard::filter;
use crate::core::clipboard::{ClipboardHistory, ClipboardMonitor, HistoryFile, HistorySnapshot};
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::ClipboardHistoryItem;

pub const CLEAR_PROMPT: &str = "Clear all clipboard history?";

/// Asks the user a yes/no question before a destructive action
pub trait ConfirmationCapability {
    fn ask(&self, prompt: &str) -> bool;
}

impl<F> ConfirmationCapability for F
where
    F: Fn(&str) -> bool,
{
    fn ask(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Clone)]
pub struct ClipboardFeature {
    history: ClipboardHistory,
    file: Arc<HistoryFile>,
    monitor: ClipboardMonitor,
}

impl ClipboardFeature {
    pub fn new(monitor: ClipboardMonitor, file: Arc<HistoryFile>) -> Self {
        Self {
            history: monitor.history().clone(),
            file,
            monitor,
        }
    }

    /// Indices are only valid against the latest snapshot; re-fetch after any mutation.
    pub fn snapshot(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    pub fn search(&self, query: &str) -> Vec<ClipboardHistoryItem> {
        filter::apply(query, &self.history.snapshot().entries)
    }

    /// Delete the item at `index` (0 = most recent)
    pub fn delete(&self, index: usize) -> AppResult<ClipboardHistoryItem> {
        let removed = self.history.remove(index)?;
        self.flush();
        Ok(removed)
    }

    /// Clear all history if the user confirms. Returns whether it was cleared.
    pub fn clear_all(&self, confirm: &dyn ConfirmationCapability) -> bool {
        if !confirm.ask(CLEAR_PROMPT) {
            tracing::debug!("Clear history cancelled");
            return false;
        }
        self.history.clear();
        self.flush();
        tracing::info!("Clipboard history cleared");
        true
    }

    /// Put the item at `index` back on the clipboard
    pub fn copy(&self, index: usize) -> AppResult<ClipboardHistoryItem> {
        let item = self.history.get_item(index).ok_or_else(|| AppError::OutOfRange {
            index,
            len: self.history.len(),
        })?;
        self.monitor.copy_to_clipboard(&item.content)?;
        Ok(item)
    }

    pub fn pause(&self) {
        self.monitor.disable();
    }

    pub fn resume(&self) {
        self.monitor.enable();
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_enabled()
    }

    /// Blocking save of the current snapshot; failures are logged, never raised.
    pub fn flush(&self) {
        if let Err(e) = self.file.save(&self.history.snapshot()) {
            tracing::warn!(error = %e, "Failed to save clipboard history");
        }
    }
}
