use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// A single captured clipboard text.
///
/// Identity for deduplication is `content` alone (exact, case-sensitive).
/// On disk this is `{ "content": ..., "timestamp": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardHistoryItem {
    pub content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ClipboardHistoryItem {
    /// Create a new text item captured now
    pub fn new_text(content: String) -> Self {
        Self::with_timestamp(content, Utc::now())
    }

    pub fn with_timestamp(content: String, timestamp: DateTime<Utc>) -> Self {
        Self { content, timestamp }
    }

    /// Single-line preview of at most `max_graphemes` user-perceived characters.
    pub fn preview(&self, max_graphemes: usize) -> String {
        preview_text(&self.content, max_graphemes)
    }
}

/// Flatten line breaks and cut on a grapheme boundary, appending `...` when cut.
pub fn preview_text(text: &str, max_graphemes: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect();

    let mut graphemes = flat.graphemes(true);
    let head: String = graphemes.by_ref().take(max_graphemes).collect();
    if graphemes.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Timestamps written by older versions may be epoch seconds or naive local strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(f64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawTimestamp::deserialize(deserializer)?;
    let parsed = match &raw {
        RawTimestamp::Seconds(secs) => from_epoch_seconds(*secs),
        RawTimestamp::Text(text) => parse_timestamp_text(text),
    };
    parsed.ok_or_else(|| {
        serde::de::Error::custom(match raw {
            RawTimestamp::Seconds(secs) => format!("timestamp out of range: {}", secs),
            RawTimestamp::Text(text) => format!("unrecognised timestamp: {:?}", text),
        })
    })
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}
