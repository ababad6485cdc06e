//! Column-visibility preferences.
//!
//! Unlike filter state, which dies with its bar instance, hidden-column
//! choices persist in a process-wide key-value store keyed by view, so a
//! re-mounted view comes back with the same columns hidden.

use std::collections::{HashMap, HashSet};
use std::sync::{OnceLock, RwLock};

static STORE: OnceLock<RwLock<HashMap<String, HashSet<String>>>> = OnceLock::new();

fn store() -> &'static RwLock<HashMap<String, HashSet<String>>> {
    STORE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Hidden-column set for one view key.
#[derive(Debug, Clone)]
pub struct ColumnPrefs {
    view_key: String,
}

impl ColumnPrefs {
    /// Attach to the stored preferences for a view, creating an empty entry
    /// on first use.
    pub fn for_view(view_key: impl Into<String>) -> Self {
        Self {
            view_key: view_key.into(),
        }
    }

    pub fn view_key(&self) -> &str {
        &self.view_key
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        store()
            .read()
            .unwrap()
            .get(&self.view_key)
            .is_some_and(|hidden| hidden.contains(column))
    }

    /// Snapshot of the hidden set.
    pub fn hidden(&self) -> HashSet<String> {
        store().read().unwrap().get(&self.view_key).cloned().unwrap_or_default()
    }

    /// Flip one column; returns the new hidden state.
    pub fn toggle(&self, column: &str) -> bool {
        let mut store = store().write().unwrap();
        let hidden = store.entry(self.view_key.clone()).or_default();
        if hidden.remove(column) {
            false
        } else {
            hidden.insert(column.to_string());
            true
        }
    }

    pub fn set_hidden(&self, column: &str, hide: bool) {
        let mut store = store().write().unwrap();
        let hidden = store.entry(self.view_key.clone()).or_default();
        if hide {
            hidden.insert(column.to_string());
        } else {
            hidden.remove(column);
        }
    }

    /// Forget every stored choice for this view.
    pub fn reset(&self) {
        store().write().unwrap().remove(&self.view_key);
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn prefs_survive_instance_drop() {
        let prefs = ColumnPrefs::for_view("orders.list.test");
        prefs.reset();
        prefs.toggle("amount_total");
        drop(prefs);

        let again = ColumnPrefs::for_view("orders.list.test");
        assert!(again.is_hidden("amount_total"));
        again.reset();
    }

    #[test]
    #[serial]
    fn toggle_round_trips() {
        let prefs = ColumnPrefs::for_view("invoices.list.test");
        prefs.reset();
        assert!(prefs.toggle("state"));
        assert!(!prefs.toggle("state"));
        assert!(prefs.hidden().is_empty());
        prefs.reset();
    }

    #[test]
    #[serial]
    fn views_do_not_bleed_into_each_other() {
        let a = ColumnPrefs::for_view("view.a.test");
        let b = ColumnPrefs::for_view("view.b.test");
        a.reset();
        b.reset();
        a.set_hidden("partner_id", true);
        assert!(!b.is_hidden("partner_id"));
        a.reset();
    }
}
