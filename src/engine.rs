//! Pure state transitions of a single resource.
//!
//! [`reduce`] never mutates its input: it returns a new [`ResourceState`]
//! together with the warnings raised and the lifecycle events other
//! resources may react to.

mod action;
mod item;
mod list;
mod selection;

use serde_json::Value;

use crate::{
    key::Key,
    state::{ResourceState, Values},
    warning::Warning,
};

pub use action::{Action, ListOperations, ListSelector, Target};

/// Remote-confirmed (or optimistic create) change other resources observe
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Created {
        key: Key,
        /// Temporary key being promoted, if any
        replaces: Option<Key>,
        values: Values,
    },
    Updated {
        key: Key,
        values: Values,
        previous_values: Option<Values>,
    },
    Destroyed {
        key: Key,
        previous_values: Option<Values>,
    },
}

impl LifecycleEvent {
    pub fn key(&self) -> &str {
        match self {
            LifecycleEvent::Created { key, .. }
            | LifecycleEvent::Updated { key, .. }
            | LifecycleEvent::Destroyed { key, .. } => key,
        }
    }
}

/// Result of applying one action
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ResourceState,
    pub warnings: Vec<Warning>,
    pub events: Vec<LifecycleEvent>,
}

/// Accumulates side outputs while an action is applied
pub(crate) struct Context<'a> {
    pub resource: &'a str,
    pub warnings: Vec<Warning>,
    pub events: Vec<LifecycleEvent>,
}

impl<'a> Context<'a> {
    fn new(resource: &'a str) -> Self {
        Self {
            resource,
            warnings: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn missing_item(&mut self, operation: &'static str, key: &str) {
        self.warnings.push(Warning::MissingItem {
            resource: self.resource.to_string(),
            operation,
            key: key.to_string(),
        });
    }
}

/// Apply `action` to `state` for the resource named `resource`
pub fn reduce(resource: &str, state: &ResourceState, action: &Action) -> Transition {
    let mut next = state.clone();
    let mut ctx = Context::new(resource);

    tracing::debug!("{}: applying {}", resource, action.name());

    match action {
        Action::FetchItemStart { key, metadata, at } => {
            item::fetch_start(&mut next, key, metadata, *at)
        }
        Action::FetchItemSuccess {
            key,
            values,
            metadata,
            http_code,
            at,
        } => item::receive(&mut next, key, values, metadata, *http_code, *at),
        Action::FetchItemError { key, failure, at } => {
            item::fetch_error(&mut next, key, failure, *at)
        }
        Action::FetchListStart {
            list_key,
            metadata,
            at,
        } => list::fetch_start(&mut next, list_key, metadata, *at),
        Action::FetchListSuccess {
            list_key,
            items,
            metadata,
            item_metadata,
            http_code,
            at,
        } => list::fetch_success(
            &mut next,
            list_key,
            items,
            metadata,
            item_metadata,
            *http_code,
            *at,
        ),
        Action::FetchListError {
            list_key,
            failure,
            at,
        } => list::fetch_error(&mut next, list_key, failure, *at),
        Action::NewItem { key, values, lists } => {
            item::new_item(&mut next, key, values);
            list::apply_operations(&mut next, key, lists);
        }
        Action::EditNewItem { values } => item::edit_new_item(&mut ctx, &mut next, values),
        Action::ClearNewItem => item::clear_new_item(&mut next),
        Action::EditItem { key, values } => item::edit(&mut ctx, &mut next, key, values),
        Action::ClearItemEdit { key } => item::clear_edit(&mut ctx, &mut next, key),
        Action::CreateItemStart {
            key,
            values,
            metadata,
            lists,
            at,
        } => {
            item::create_start(&mut ctx, &mut next, key, values, metadata, *at);
            list::apply_operations(&mut next, key, lists);
        }
        Action::CreateItemSuccess {
            temporary_key,
            key,
            values,
            metadata,
            http_code,
            at,
        } => item::create_success(
            &mut ctx,
            &mut next,
            temporary_key,
            key,
            values,
            metadata,
            *http_code,
            *at,
        ),
        Action::CreateItemError { key, failure, at } => {
            item::create_error(&mut next, key, failure, *at)
        }
        Action::UpdateItemStart {
            key,
            values,
            metadata,
            at,
        } => item::update_start(&mut ctx, &mut next, key, values, metadata, *at),
        Action::UpdateItemSuccess {
            key,
            values,
            metadata,
            previous_values,
            http_code,
            at,
        } => item::update_success(
            &mut ctx,
            &mut next,
            key,
            values,
            metadata,
            previous_values.as_ref(),
            *http_code,
            *at,
        ),
        Action::UpdateItemError { key, failure, at } => {
            item::update_error(&mut next, key, failure, *at)
        }
        Action::DestroyItemStart {
            key,
            previous_values,
            at,
        } => item::destroy_start(&mut ctx, &mut next, key, previous_values.as_ref(), *at),
        Action::DestroyItemSuccess {
            key,
            previous_values,
        } => item::destroy_success(&mut ctx, &mut next, key, previous_values.as_ref()),
        Action::DestroyItemError {
            key,
            restore,
            failure,
            at,
        } => item::destroy_error(&mut next, key, restore.as_ref(), failure, *at),
        Action::ClearItem { key } => {
            next.remove_everywhere(key);
        }
        Action::ClearList { list_key } => {
            next.lists.remove(list_key);
        }
        Action::SelectItem { key, value } => {
            selection::select(&mut ctx, &mut next, key, value.clone())
        }
        Action::SelectAnotherItem { key, value } => {
            selection::select_another(&mut ctx, &mut next, key, value.clone())
        }
        Action::DeselectItem { key } => selection::deselect(&mut next, key),
        Action::ClearSelectedItems => selection::clear(&mut next),
        Action::Progress { target, event } => match target {
            Target::Item(key) => item::progress(&mut next, key, event),
            Target::List(list_key) => list::progress(&mut next, list_key, event),
        },
    }

    Transition {
        state: next,
        warnings: ctx.warnings,
        events: ctx.events,
    }
}

/// Default selection value when a caller does not supply one
pub fn selected() -> Value {
    Value::Bool(true)
}
