//! Clipboard module
//!
//! Provides clipboard history tracking and monitoring functionality.
//!
//! - `history`: bounded, deduplicated, newest-first history
//! - `storage`: atomic JSON persistence of the history
//! - `monitor`: background task that polls the clipboard for changes
//! - `filter`: case-insensitive search over a history snapshot
//! - `source`: platform clipboard access

pub mod filter;
pub mod history;
pub mod monitor;
pub mod source;
pub mod state;
pub mod storage;

pub use history::{ClipboardHistory, HistorySnapshot};
pub use monitor::{ClipboardMonitor, PollOutcome};
pub use source::{ClipboardSource, SystemClipboard};
pub use state::MonitorStatus;
pub use storage::HistoryFile;
