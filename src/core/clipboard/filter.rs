use crate::shared::types::ClipboardHistoryItem;

/// Case-insensitive substring search over a history snapshot.
///
/// The query is trimmed and lower-cased; an empty query keeps every entry.
/// Matches are returned in their original (newest-first) order.
pub fn apply(query: &str, entries: &[ClipboardHistoryItem]) -> Vec<ClipboardHistoryItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entries.to_vec();
    }

    entries
        .iter()
        .filter(|item| item.content.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
