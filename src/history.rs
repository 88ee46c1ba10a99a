//! Bounded recent-prompt history, persisted as a JSON array.

use serde::{Deserialize, Serialize};

use crate::storage::{Store, KEY_HISTORY};

/// Maximum number of entries kept.
pub const MAX_ENTRIES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptHistoryEntry {
    pub text: String,
    /// Epoch milliseconds at recording time.
    pub timestamp: i64,
}

/// Most-recent-first list of distinct prompt texts, capped at `MAX_ENTRIES`.
#[derive(Debug, Clone, Default)]
pub struct PromptHistory {
    entries: Vec<PromptHistoryEntry>,
}

impl PromptHistory {
    /// Read the persisted list. Absent or corrupt data yields an empty list.
    pub fn load(store: &dyn Store) -> Self {
        let entries = store
            .get(KEY_HISTORY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { entries }
    }

    /// Record a prompt: drop any entry with identical text, prepend, truncate
    /// to the cap, persist.
    pub fn record(&mut self, text: &str, now_ms: i64, store: &mut dyn Store) {
        self.entries.retain(|e| e.text != text);
        self.entries.insert(
            0,
            PromptHistoryEntry {
                text: text.to_string(),
                timestamp: now_ms,
            },
        );
        self.entries.truncate(MAX_ENTRIES);
        self.persist(store);
    }

    fn persist(&self, store: &mut dyn Store) {
        match serde_json::to_string(&self.entries) {
            Ok(raw) => store.set(KEY_HISTORY, &raw),
            Err(e) => tracing::warn!("Failed to serialize prompt history: {}", e),
        }
    }

    pub fn entries(&self) -> &[PromptHistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&PromptHistoryEntry> {
        self.entries.get(index)
    }
}

/// Relative-age label for a history entry.
pub fn relative_label(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed_s = (now_ms - timestamp_ms).max(0) / 1000;

    if elapsed_s < 60 {
        "just now".to_string()
    } else if elapsed_s < 60 * 60 {
        format!("{}m ago", elapsed_s / 60)
    } else if elapsed_s < 24 * 60 * 60 {
        format!("{}h ago", elapsed_s / (60 * 60))
    } else if elapsed_s < 7 * 24 * 60 * 60 {
        format!("{}d ago", elapsed_s / (24 * 60 * 60))
    } else {
        match chrono::DateTime::from_timestamp_millis(timestamp_ms) {
            Some(dt) => dt.with_timezone(&chrono::Local).format("%Y-%m-%d").to_string(),
            None => "long ago".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStore;

    fn texts(history: &PromptHistory) -> Vec<&str> {
        history.entries().iter().map(|e| e.text.as_str()).collect()
    }

    #[test]
    fn test_record_orders_by_recency_and_caps_at_five() {
        let mut store = MemStore::new();
        let mut history = PromptHistory::default();

        for (i, text) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
            history.record(text, i as i64 * 1000, &mut store);
        }

        assert_eq!(history.len(), MAX_ENTRIES);
        assert_eq!(texts(&history), vec!["g", "f", "e", "d", "c"]);
    }

    #[test]
    fn test_duplicate_moves_to_front_without_growing() {
        let mut store = MemStore::new();
        let mut history = PromptHistory::default();

        history.record("first", 1000, &mut store);
        history.record("second", 2000, &mut store);
        history.record("third", 3000, &mut store);
        history.record("first", 4000, &mut store);

        assert_eq!(history.len(), 3);
        assert_eq!(texts(&history), vec!["first", "third", "second"]);
        assert_eq!(history.get(0).unwrap().timestamp, 4000);
    }

    #[test]
    fn test_load_roundtrip_and_corrupt_data() {
        let mut store = MemStore::new();
        let mut history = PromptHistory::default();
        history.record("hello", 1000, &mut store);
        history.record("world", 2000, &mut store);

        let loaded = PromptHistory::load(&store);
        assert_eq!(texts(&loaded), vec!["world", "hello"]);

        store.set(KEY_HISTORY, "not json at all");
        let corrupt = PromptHistory::load(&store);
        assert!(corrupt.is_empty());

        store.remove(KEY_HISTORY);
        let absent = PromptHistory::load(&store);
        assert!(absent.is_empty());
    }

    #[test]
    fn test_relative_labels() {
        let now = 1_700_000_000_000i64;
        assert_eq!(relative_label(now - 5_000, now), "just now");
        assert_eq!(relative_label(now - 59_000, now), "just now");
        assert_eq!(relative_label(now - 60_000, now), "1m ago");
        assert_eq!(relative_label(now - 45 * 60_000, now), "45m ago");
        assert_eq!(relative_label(now - 3 * 60 * 60_000, now), "3h ago");
        assert_eq!(relative_label(now - 2 * 24 * 60 * 60_000, now), "2d ago");

        // Older than a week: absolute calendar date.
        let old = relative_label(now - 30 * 24 * 60 * 60_000, now);
        assert_eq!(old.len(), 10);
        assert!(old.chars().nth(4) == Some('-') && old.chars().nth(7) == Some('-'));
    }
}
