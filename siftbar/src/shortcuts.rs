//! Process-wide keyboard shortcut routing.
//!
//! Every mounted bar contends for the same global Enter/Escape/arrow
//! shortcuts, so dispatch is centralized: a bar only receives a key when the
//! tracked focus is inside its own scope, or when nothing foreign is focused
//! and the bar opted into [`ShortcutScope::Global`]. With several global
//! bars mounted at once, the most recently mounted one wins; a key is never
//! delivered twice.
//!
//! Mounting registers a scope, unmounting (or dropping) releases it. The
//! registry holds weak handles only, so a leaked entry can never keep a bar
//! alive.

use std::sync::{Arc, OnceLock, RwLock, Weak};

use crate::bar::FilterBar;
use crate::id::InstanceId;
use crate::schema::ShortcutScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    ArrowUp,
    ArrowDown,
}

/// Where the user's input focus currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Focus {
    /// No input element focused.
    #[default]
    None,
    /// Focus is inside the scope of the named bar.
    Scope(InstanceId),
    /// Focus is in some foreign input; bars must not steal keys.
    Foreign,
}

static SCOPES: OnceLock<RwLock<Vec<(InstanceId, Weak<FilterBar>)>>> = OnceLock::new();
static FOCUS: OnceLock<RwLock<Focus>> = OnceLock::new();

fn scopes() -> &'static RwLock<Vec<(InstanceId, Weak<FilterBar>)>> {
    SCOPES.get_or_init(|| RwLock::new(Vec::new()))
}

fn focus_cell() -> &'static RwLock<Focus> {
    FOCUS.get_or_init(|| RwLock::new(Focus::None))
}

pub(crate) fn register_scope(bar: &Arc<FilterBar>) {
    scopes().write().unwrap().push((bar.id().clone(), Arc::downgrade(bar)));
}

/// Remove a scope and any entries whose bar is gone. Safe to call twice
/// (unmount followed by drop).
pub(crate) fn release_scope(id: &InstanceId) {
    scopes()
        .write()
        .unwrap()
        .retain(|(scope, bar)| scope != id && bar.strong_count() > 0);
    let mut focus = focus_cell().write().unwrap();
    if matches!(&*focus, Focus::Scope(owner) if owner == id) {
        *focus = Focus::None;
    }
}

pub fn focus_bar(id: &InstanceId) {
    *focus_cell().write().unwrap() = Focus::Scope(id.clone());
}

/// Mark focus as being inside a foreign input element.
pub fn focus_foreign() {
    *focus_cell().write().unwrap() = Focus::Foreign;
}

pub fn clear_focus() {
    *focus_cell().write().unwrap() = Focus::None;
}

pub fn current_focus() -> Focus {
    focus_cell().read().unwrap().clone()
}

/// Route a global key press. Returns `true` when a bar consumed it.
pub async fn dispatch(key: Key) -> bool {
    let target = {
        let focus = current_focus();
        match focus {
            Focus::Foreign => None,
            Focus::Scope(id) => find(&id),
            Focus::None => last_global(),
        }
    };
    match target {
        Some(bar) => {
            bar.handle_key(key).await;
            true
        }
        None => false,
    }
}

fn find(id: &InstanceId) -> Option<Arc<FilterBar>> {
    scopes()
        .read()
        .unwrap()
        .iter()
        .find(|(scope, _)| scope == id)
        .and_then(|(_, bar)| bar.upgrade())
}

fn last_global() -> Option<Arc<FilterBar>> {
    scopes()
        .read()
        .unwrap()
        .iter()
        .rev()
        .filter_map(|(_, bar)| bar.upgrade())
        .find(|bar| bar.schema().shortcut_scope == ShortcutScope::Global)
}
