//! Append-only event log for one request
//!
//! Hooks may fire from several threads while a request is handled (async
//! view rendering), so appends go through a mutex. Reads return a snapshot
//! taken under the same lock and never observe later appends.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::timer::TimerEntry;

/// A log message emitted by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub level: String,
    pub message: String,
    /// Offset from the session origin
    pub at: Duration,
}

/// Bounds applied when capturing view data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewLimits {
    pub max_keys: usize,
    pub max_preview_len: usize,
}

impl Default for ViewLimits {
    fn default() -> Self {
        Self {
            max_keys: 64,
            max_preview_len: 256,
        }
    }
}

/// Keys of the data handed to a view at the moment it started composing
///
/// Only names and a bounded preview are kept; the view data itself is not
/// referenced after capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewDataSnapshot {
    pub view: String,
    pub keys: BTreeSet<String>,
    /// Keys beyond `ViewLimits::max_keys` that were not recorded
    pub dropped_keys: usize,
    /// Serialized size of the view data in bytes, when data was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub at: Duration,
}

impl ViewDataSnapshot {
    /// Snapshot from a plain list of key names
    pub fn from_keys<I, S>(view: &str, keys: I, limits: ViewLimits, at: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let all: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let dropped_keys = all.len().saturating_sub(limits.max_keys);
        Self {
            view: view.to_string(),
            keys: all.into_iter().take(limits.max_keys).collect(),
            dropped_keys,
            data_size: None,
            preview: None,
            at,
        }
    }

    /// Snapshot from the view's data; object keys become the key set
    pub fn from_data(view: &str, data: &Value, limits: ViewLimits, at: Duration) -> Self {
        let keys: Vec<&str> = match data {
            Value::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        let mut snapshot = Self::from_keys(view, keys, limits, at);

        let serialized = data.to_string();
        snapshot.data_size = Some(serialized.len());
        snapshot.preview = Some(truncate(&serialized, limits.max_preview_len));
        snapshot
    }
}

/// Cut `text` to at most `max` bytes on a char boundary, marking the cut
fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

/// One event recorded during a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Log(LogEntry),
    View(ViewDataSnapshot),
    Timer(TimerEntry),
}

/// Insertion-ordered store of everything captured for a request
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Mutex<Vec<Entry>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Entry>> {
        // A panic in another hook must not hide what was already captured
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, entry: Entry) {
        self.guard().push(entry);
    }

    pub fn append_log(&self, level: &str, message: &str, at: Duration) {
        self.append(Entry::Log(LogEntry {
            level: level.to_string(),
            message: message.to_string(),
            at,
        }));
    }

    pub fn append_view_snapshot(&self, snapshot: ViewDataSnapshot) {
        self.append(Entry::View(snapshot));
    }

    pub fn append_timer(&self, entry: TimerEntry) {
        self.append(Entry::Timer(entry));
    }

    /// Snapshot of all entries in append order
    pub fn all_entries(&self) -> std::vec::IntoIter<Entry> {
        self.guard().clone().into_iter()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.all_entries()
            .filter_map(|entry| match entry {
                Entry::Log(log) => Some(log),
                _ => None,
            })
            .collect()
    }

    pub fn views(&self) -> Vec<ViewDataSnapshot> {
        self.all_entries()
            .filter_map(|entry| match entry {
                Entry::View(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn timers(&self) -> Vec<TimerEntry> {
        self.all_entries()
            .filter_map(|entry| match entry {
                Entry::Timer(timer) => Some(timer),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn log(level: &str, message: &str) -> Entry {
        Entry::Log(LogEntry {
            level: level.to_string(),
            message: message.to_string(),
            at: Duration::ZERO,
        })
    }

    #[test]
    fn test_preserves_insertion_order() {
        let events = EventLog::new();
        events.append(log("info", "A"));
        events.append(log("warning", "B"));
        events.append(log("error", "C"));

        let entries: Vec<_> = events.all_entries().collect();
        assert_eq!(
            entries,
            vec![log("info", "A"), log("warning", "B"), log("error", "C")]
        );
    }

    #[test]
    fn test_snapshot_does_not_see_later_appends() {
        let events = EventLog::new();
        events.append_log("info", "first", Duration::ZERO);
        let snapshot = events.all_entries();
        events.append_log("info", "second", Duration::ZERO);

        assert_eq!(snapshot.count(), 1);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_typed_accessors() {
        let events = EventLog::new();
        events.append_log("debug", "hello", Duration::from_millis(1));
        events.append_view_snapshot(ViewDataSnapshot::from_keys(
            "home",
            ["user"],
            ViewLimits::default(),
            Duration::from_millis(2),
        ));

        assert_eq!(events.logs().len(), 1);
        assert_eq!(events.views().len(), 1);
        assert!(events.timers().is_empty());
        assert!(!events.is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let events = Arc::new(EventLog::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let events = Arc::clone(&events);
                thread::spawn(move || {
                    for i in 0..100 {
                        events.append_log("info", &format!("{}-{}", t, i), Duration::ZERO);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(events.len(), 800);
        // Per-thread order survives interleaving
        let logs = events.logs();
        let thread_three: Vec<_> = logs
            .iter()
            .filter(|l| l.message.starts_with("3-"))
            .map(|l| l.message.clone())
            .collect();
        let expected: Vec<_> = (0..100).map(|i| format!("3-{}", i)).collect();
        assert_eq!(thread_three, expected);
    }

    #[test]
    fn test_view_snapshot_from_object() {
        let data = json!({"user": {"name": "ada"}, "items": [1, 2, 3], "title": "Home"});
        let snapshot =
            ViewDataSnapshot::from_data("pages.home", &data, ViewLimits::default(), Duration::ZERO);

        let keys: Vec<_> = snapshot.keys.iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["items", "title", "user"]);
        assert_eq!(snapshot.dropped_keys, 0);
        assert_eq!(snapshot.data_size, Some(data.to_string().len()));
    }

    #[test]
    fn test_view_snapshot_limits() {
        let limits = ViewLimits {
            max_keys: 2,
            max_preview_len: 10,
        };
        let data = json!({"a": 1, "b": 2, "c": "a long string value"});
        let snapshot = ViewDataSnapshot::from_data("v", &data, limits, Duration::ZERO);

        assert_eq!(snapshot.keys.len(), 2);
        assert_eq!(snapshot.dropped_keys, 1);
        let preview = snapshot.preview.unwrap();
        assert!(preview.ends_with('…'));
        assert!(preview.len() <= 10 + '…'.len_utf8());
    }

    #[test]
    fn test_view_snapshot_non_object_has_no_keys() {
        let snapshot = ViewDataSnapshot::from_data(
            "list",
            &json!([1, 2]),
            ViewLimits::default(),
            Duration::ZERO,
        );
        assert!(snapshot.keys.is_empty());
        assert_eq!(snapshot.preview.as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("héllo", 2), "h…");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_entry_serializes_with_kind_tag() {
        let json = serde_json::to_value(log("info", "x")).unwrap();
        assert_eq!(json["kind"], "log");
        assert_eq!(json["message"], "x");
    }
}
