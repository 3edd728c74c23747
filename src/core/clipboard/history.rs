use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::DEFAULT_MAX_HISTORY_SIZE;
use crate::shared::types::ClipboardHistoryItem;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Point-in-time copy of the history, newest first.
///
/// `revision` increases with every mutation of the store identified by
/// `store_id`, letting the file writer discard snapshots of that store
/// that lost a race. Revisions of different stores are not comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub store_id: u64,
    pub revision: u64,
    pub entries: Vec<ClipboardHistoryItem>,
}

#[derive(Debug, Default)]
struct Entries {
    items: Vec<ClipboardHistoryItem>,
    revision: u64,
}

/// Bounded, deduplicated clipboard history, newest first.
///
/// Cloning shares the same underlying history (all clones see every mutation).
#[derive(Debug, Clone)]
pub struct ClipboardHistory {
    id: u64,
    entries: Arc<Mutex<Entries>>,
    max_history_size: usize,
}

impl ClipboardHistory {
    /// Create an empty history holding at most `max_history_size` items (minimum 1)
    pub fn new(max_history_size: usize) -> Self {
        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            entries: Arc::new(Mutex::new(Entries::default())),
            max_history_size: max_history_size.max(1),
        }
    }

    /// Seed from persisted items, dropping anything that breaks the invariants:
    /// empty content, repeated content (first occurrence wins), overflow past capacity.
    pub fn from_items(items: Vec<ClipboardHistoryItem>, max_history_size: usize) -> Self {
        let history = Self::new(max_history_size);
        let loaded = items.len();

        let mut kept: Vec<ClipboardHistoryItem> = Vec::with_capacity(loaded.min(history.max_history_size));
        for item in items {
            if kept.len() == history.max_history_size {
                break;
            }
            if item.content.is_empty() || kept.iter().any(|k| k.content == item.content) {
                continue;
            }
            kept.push(item);
        }

        if kept.len() != loaded {
            tracing::warn!(loaded, kept = kept.len(), "Dropped persisted entries violating history invariants");
        }

        history.lock().items = kept;
        history
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("History mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Insert `content` at the front.
    ///
    /// Empty content and content already present anywhere in the history are
    /// ignored; an existing duplicate keeps its position. Returns whether the
    /// history changed.
    pub fn add(&self, content: &str) -> bool {
        if content.is_empty() {
            return false;
        }

        let mut entries = self.lock();
        if entries.items.iter().any(|item| item.content == content) {
            tracing::debug!("Skipping duplicate clipboard item");
            return false;
        }

        entries.items.insert(0, ClipboardHistoryItem::new_text(content.to_string()));
        if entries.items.len() > self.max_history_size {
            let evicted = entries.items.len() - self.max_history_size;
            entries.items.truncate(self.max_history_size);
            tracing::debug!(evicted, "Evicted oldest clipboard items");
        }
        entries.revision += 1;
        true
    }

    /// Remove the item at `index` (0 = most recent)
    pub fn remove(&self, index: usize) -> AppResult<ClipboardHistoryItem> {
        let mut entries = self.lock();
        let len = entries.items.len();
        if index >= len {
            return Err(AppError::OutOfRange { index, len });
        }
        let removed = entries.items.remove(index);
        entries.revision += 1;
        Ok(removed)
    }

    /// Empty the history unconditionally
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.items.clear();
        entries.revision += 1;
    }

    /// Consistent copy of all items; callers render and filter this, never the live list.
    pub fn snapshot(&self) -> HistorySnapshot {
        let entries = self.lock();
        HistorySnapshot {
            store_id: self.id,
            revision: entries.revision,
            entries: entries.items.clone(),
        }
    }

    pub fn items(&self) -> Vec<ClipboardHistoryItem> {
        self.lock().items.clone()
    }

    /// Get a specific item by index (0 = most recent)
    pub fn get_item(&self, index: usize) -> Option<ClipboardHistoryItem> {
        self.lock().items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClipboardHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_SIZE)
    }
}
