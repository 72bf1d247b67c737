use super::Context;
use crate::state::{ResourceState, SelectionValue};

/// Make `key` the only selected entity
pub(super) fn select(ctx: &mut Context<'_>, state: &mut ResourceState, key: &str, value: SelectionValue) {
    if !state.items.contains_key(key) {
        ctx.missing_item("select", key);
    }

    state.selection_map.clear();
    state.selection_map.insert(key.to_string(), value);
}

/// Add `key` to the current selection
pub(super) fn select_another(
    ctx: &mut Context<'_>,
    state: &mut ResourceState,
    key: &str,
    value: SelectionValue,
) {
    if !state.items.contains_key(key) {
        ctx.missing_item("select", key);
    }

    state.selection_map.insert(key.to_string(), value);
}

pub(super) fn deselect(state: &mut ResourceState, key: &str) {
    state.selection_map.remove(key);
}

pub(super) fn clear(state: &mut ResourceState) {
    state.selection_map.clear();
}
