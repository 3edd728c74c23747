//! On-disk clipboard history.
//!
//! The whole history is rewritten on every mutation as a JSON array of
//! `{ "content", "timestamp" }` objects, newest first. Writes go to a
//! sibling temp file which is fsynced and renamed over the target, so a
//! crash mid-write leaves either the old or the new file, never a torn one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::core::clipboard::history::HistorySnapshot;
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::ClipboardHistoryItem;

#[derive(Debug, Default)]
struct WriterState {
    /// `(store_id, revision)` of the last snapshot written
    last_written: Option<(u64, u64)>,
    /// Set when the existing file could neither be read nor backed up
    blocked: bool,
}

pub struct HistoryFile {
    path: PathBuf,
    /// Also serializes writers
    writer: Mutex<WriterState>,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(WriterState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".bak");
        self.path.with_file_name(name)
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("History file mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Write the snapshot, replacing the file atomically.
    ///
    /// A snapshot older than one already written from the same store is
    /// skipped and reported as success. Snapshots from a different store
    /// always win. Fails without touching the file while an unreadable file
    /// is protected by [`load_or_default`](Self::load_or_default).
    pub fn save(&self, snapshot: &HistorySnapshot) -> AppResult<()> {
        let mut writer = self.lock_writer();
        if writer.blocked {
            return Err(AppError::Io(format!(
                "Refusing to overwrite unreadable history file {}",
                self.path.display()
            )));
        }
        if matches!(writer.last_written, Some((store_id, rev)) if store_id == snapshot.store_id && snapshot.revision < rev) {
            tracing::debug!(
                revision = snapshot.revision,
                last_written = ?writer.last_written,
                "Skipping stale history snapshot"
            );
            return Ok(());
        }

        self.write_atomically(&snapshot.entries)?;
        writer.last_written = Some((snapshot.store_id, snapshot.revision));
        tracing::debug!(entries = snapshot.entries.len(), path = %self.path.display(), "Saved clipboard history");
        Ok(())
    }

    fn write_atomically(&self, entries: &[ClipboardHistoryItem]) -> AppResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::Io(format!("Failed to create data directory: {}", e)))?;

        let json = serde_json::to_string_pretty(entries)?;

        let mut temp_name = self.path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(format!(".tmp.{}", std::process::id()));
        let temp_path = dir.join(temp_name);

        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(AppError::Io(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            )));
        }
        Ok(())
    }

    /// Read persisted items.
    ///
    /// A missing file is a first run and yields an empty list. A file that is
    /// present but not a valid history yields `AppError::Parse`. A successful
    /// load lifts any write block set by [`load_or_default`](Self::load_or_default).
    pub fn load(&self) -> AppResult<Vec<ClipboardHistoryItem>> {
        let items = self.read_items()?;
        self.lock_writer().blocked = false;
        Ok(items)
    }

    fn read_items(&self) -> AppResult<Vec<ClipboardHistoryItem>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(AppError::Parse(format!("History file is not UTF-8: {}", e)))
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map_err(|e| AppError::Parse(format!("Invalid history file {}: {}", self.path.display(), e)))
    }

    /// Like [`load`](Self::load), but never fails: problems are logged and an
    /// empty history is returned. An unreadable file is copied to `<file>.bak`
    /// first so the next save cannot destroy it; if even the copy fails,
    /// saves are refused until a later [`load`](Self::load) succeeds.
    pub fn load_or_default(&self) -> Vec<ClipboardHistoryItem> {
        let err = match self.load() {
            Ok(items) => {
                tracing::info!(count = items.len(), path = %self.path.display(), "Loaded clipboard history");
                return items;
            }
            Err(e) => e,
        };

        tracing::warn!(error = %err, "Failed to read clipboard history; starting empty");
        let backup = self.backup_path();
        match fs::copy(&self.path, &backup) {
            Ok(_) => tracing::warn!(backup = %backup.display(), "Preserved unreadable history file"),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to back up history file; saving disabled");
                self.lock_writer().blocked = true;
            }
        }
        Vec::new()
    }
}
