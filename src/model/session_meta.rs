//! Session metadata: active file, access history and tab order.
//!
//! All operations here are pure; `MetadataManager` adds persistence.

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Key of the singleton metadata record.
pub const META_ID: &str = "fileMeta";

fn meta_id() -> String {
    META_ID.to_string()
}

/// The singleton session record stored in the `meta` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default = "meta_id")]
    pub id: String,
    /// File bound to the editing surface
    #[serde(default)]
    pub active_file_id: Option<String>,
    /// Access history, most recent last
    #[serde(default)]
    pub history: Vec<String>,
    /// Tab display order
    #[serde(default)]
    pub file_order: Vec<String>,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            id: meta_id(),
            active_file_id: None,
            history: Vec::new(),
            file_order: Vec::new(),
        }
    }
}

impl SessionMetadata {
    /// Mark `id` as accessed and make it active.
    ///
    /// Moves `id` to the end of the history and evicts the oldest entries
    /// so the history never outgrows `limit` (the number of open files).
    pub fn record_access(&mut self, id: &str, limit: usize) {
        self.history.retain(|h| h != id);
        self.history.push(id.to_string());
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
        self.active_file_id = Some(id.to_string());
    }

    /// Move the tab at `from` to `to` (remove, then insert).
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.file_order.len();
        for index in [from, to] {
            if index >= len {
                return Err(Error::InvalidIndex { index, len });
            }
        }
        if from != to {
            let id = self.file_order.remove(from);
            self.file_order.insert(to, id);
        }
        Ok(())
    }

    /// Append `id` to the tab order unless it is already present.
    pub fn append_to_order(&mut self, id: &str) {
        if !self.file_order.iter().any(|o| o == id) {
            self.file_order.push(id.to_string());
        }
    }

    /// Drop every reference to `id`.
    pub fn remove(&mut self, id: &str) {
        self.history.retain(|h| h != id);
        self.file_order.retain(|o| o != id);
        if self.active_file_id.as_deref() == Some(id) {
            self.active_file_id = None;
        }
    }

    /// Pick the file to activate after the active file `deleted` goes away.
    ///
    /// 1. The entry just before `deleted` when `deleted` is the most recent one
    /// 2. Otherwise the most recent history entry still open
    /// 3. Otherwise the first of `remaining`
    ///
    /// Returns `None` only when `remaining` is empty.
    pub fn resolve_replacement_on_delete(
        &self,
        deleted: &str,
        remaining: &[String],
    ) -> Option<String> {
        let is_open = |id: &str| id != deleted && remaining.iter().any(|r| r == id);

        if let [.., previous, last] = self.history.as_slice() {
            if last == deleted && is_open(previous) {
                return Some(previous.clone());
            }
        }

        self.history
            .iter()
            .rev()
            .find(|h| is_open(h))
            .or_else(|| remaining.first())
            .cloned()
    }

    /// Repair the record against the ids actually present in the registry.
    ///
    /// Dangling ids are dropped, missing ids are appended to the tab order in
    /// registry order, the history is trimmed and a dangling active id is
    /// replaced by the most recent history entry or the first tab.
    ///
    /// Returns `true` if anything changed.
    pub fn reconcile(&mut self, ids: &[String]) -> bool {
        let before = self.clone();
        let present = |id: &String| ids.contains(id);

        self.id = meta_id();

        self.file_order.retain(present);
        let mut seen = Vec::with_capacity(self.file_order.len());
        self.file_order.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(id.clone());
                true
            }
        });
        for id in ids {
            self.append_to_order(id);
        }

        let mut history: Vec<String> = Vec::with_capacity(self.history.len());
        for id in self.history.iter().filter(|id| ids.contains(id)) {
            history.retain(|h| h != id);
            history.push(id.clone());
        }
        if history.len() > ids.len() {
            history.drain(..history.len() - ids.len());
        }
        self.history = history;

        let active_ok = self
            .active_file_id
            .as_ref()
            .map(|id| present(id))
            .unwrap_or(false);
        if !active_ok {
            self.active_file_id = self
                .history
                .last()
                .or_else(|| self.file_order.first())
                .cloned();
        }

        let changed = *self != before;
        if changed {
            debug!("Session metadata repaired: {:?} -> {:?}", before, self);
        }
        changed
    }

    /// Check the cross-record invariants against the registry's ids.
    pub fn is_consistent_with(&self, ids: &[String]) -> bool {
        let mut order = self.file_order.clone();
        order.sort();
        let mut expected = ids.to_vec();
        expected.sort();

        let active_ok = match &self.active_file_id {
            Some(id) => ids.contains(id),
            None => ids.is_empty(),
        };

        order == expected
            && active_ok
            && self.history.len() <= ids.len()
            && self.history.iter().all(|h| ids.contains(h))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn meta(active: Option<&str>, history: &[&str], order: &[&str]) -> SessionMetadata {
        SessionMetadata {
            active_file_id: active.map(str::to_string),
            history: ids(history),
            file_order: ids(order),
            ..SessionMetadata::default()
        }
    }

    #[test]
    fn test_default_has_singleton_id() {
        let meta = SessionMetadata::default();
        assert_eq!(meta.id, META_ID);
        assert!(meta.active_file_id.is_none());
    }

    #[test]
    fn test_record_access_moves_to_end() {
        let mut meta = SessionMetadata::default();
        for id in ["A", "B", "A", "B"] {
            meta.record_access(id, 2);
        }
        assert_eq!(meta.history, ids(&["A", "B"]));
        assert_eq!(meta.active_file_id.as_deref(), Some("B"));
    }

    #[test]
    fn test_record_access_evicts_oldest() {
        let mut meta = meta(None, &["A", "B", "C"], &[]);
        meta.record_access("D", 3);
        assert_eq!(meta.history, ids(&["B", "C", "D"]));
    }

    #[test]
    fn test_reorder_splice_semantics() {
        let mut meta = meta(None, &[], &["a", "b", "c", "d"]);
        meta.reorder(0, 2).unwrap();
        assert_eq!(meta.file_order, ids(&["b", "c", "a", "d"]));
        meta.reorder(3, 0).unwrap();
        assert_eq!(meta.file_order, ids(&["d", "b", "c", "a"]));
        meta.reorder(1, 1).unwrap();
        assert_eq!(meta.file_order, ids(&["d", "b", "c", "a"]));
    }

    #[test]
    fn test_reorder_rejects_out_of_range() {
        let mut meta = meta(None, &[], &["a", "b"]);
        assert!(matches!(
            meta.reorder(0, 2),
            Err(Error::InvalidIndex { index: 2, len: 2 })
        ));
        assert!(matches!(
            meta.reorder(5, 0),
            Err(Error::InvalidIndex { index: 5, .. })
        ));
        assert_eq!(meta.file_order, ids(&["a", "b"]));
    }

    #[test]
    fn test_replacement_prefers_previous_entry() {
        let meta = meta(Some("C"), &["A", "B", "C"], &[]);
        let next = meta.resolve_replacement_on_delete("C", &ids(&["A", "B"]));
        assert_eq!(next.as_deref(), Some("B"));
    }

    #[test]
    fn test_replacement_falls_back_to_most_recent_open() {
        // Deleted file is not the most recent entry
        let meta = meta(Some("A"), &["A", "B"], &[]);
        let next = meta.resolve_replacement_on_delete("A", &ids(&["B"]));
        assert_eq!(next.as_deref(), Some("B"));

        // Entry before the deleted one is stale
        let meta = SessionMetadata {
            history: ids(&["B", "X", "C"]),
            ..SessionMetadata::default()
        };
        let next = meta.resolve_replacement_on_delete("C", &ids(&["A", "B"]));
        assert_eq!(next.as_deref(), Some("B"));
    }

    #[test]
    fn test_replacement_falls_back_to_first_remaining() {
        let meta = meta(Some("C"), &["C"], &[]);
        let next = meta.resolve_replacement_on_delete("C", &ids(&["A", "B"]));
        assert_eq!(next.as_deref(), Some("A"));

        let empty = SessionMetadata::default();
        let next = empty.resolve_replacement_on_delete("C", &ids(&["B"]));
        assert_eq!(next.as_deref(), Some("B"));
    }

    #[test]
    fn test_replacement_none_without_remaining() {
        let meta = meta(Some("A"), &["A"], &["A"]);
        assert!(meta.resolve_replacement_on_delete("A", &[]).is_none());
    }

    #[test]
    fn test_remove_clears_references() {
        let mut meta = meta(Some("B"), &["A", "B"], &["B", "A"]);
        meta.remove("B");
        assert_eq!(meta.history, ids(&["A"]));
        assert_eq!(meta.file_order, ids(&["A"]));
        assert!(meta.active_file_id.is_none());
    }

    #[test]
    fn test_reconcile_repairs_dangling_and_missing() {
        let mut meta = meta(Some("gone"), &["A", "gone", "B", "A"], &["B", "gone", "B"]);
        let registry = ids(&["A", "B", "C"]);

        assert!(meta.reconcile(&registry));
        assert_eq!(meta.file_order, ids(&["B", "A", "C"]));
        assert_eq!(meta.history, ids(&["B", "A"]));
        assert_eq!(meta.active_file_id.as_deref(), Some("A"));
        assert!(meta.is_consistent_with(&registry));
    }

    #[test]
    fn test_reconcile_without_history_activates_first_tab() {
        let mut meta = SessionMetadata::default();
        let registry = ids(&["index.js", "style.css"]);
        assert!(meta.reconcile(&registry));
        assert_eq!(meta.active_file_id.as_deref(), Some("index.js"));
        assert_eq!(meta.file_order, registry);
    }

    #[test]
    fn test_reconcile_consistent_record_unchanged() {
        let mut meta = meta(Some("A"), &["B", "A"], &["A", "B"]);
        assert!(!meta.reconcile(&ids(&["A", "B"])));
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = meta(Some("A"), &["A"], &["A"]);
        let value: serde_json::Value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["id"], "fileMeta");
        assert_eq!(value["activeFileId"], "A");
        assert_eq!(value["fileOrder"][0], "A");

        let parsed: SessionMetadata = serde_json::from_str(r#"{"activeFileId":"A"}"#).unwrap();
        assert_eq!(parsed.id, META_ID);
        assert!(parsed.history.is_empty());
    }
}
