use chrono::{DateTime, Utc};

use crate::{
    key::Key,
    state::{Metadata, SelectionValue, Values},
    transport::{Failure, ProgressEvent},
};

/// A list addressed by a list-membership operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSelector {
    /// Every list of the resource
    All,
    Key(Key),
}

/// List-membership changes applied with an optimistic new/create transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOperations {
    pub push: Vec<Key>,
    pub unshift: Vec<Key>,
    pub invalidate: Vec<ListSelector>,
}

impl ListOperations {
    pub fn is_empty(&self) -> bool {
        self.push.is_empty() && self.unshift.is_empty() && self.invalidate.is_empty()
    }
}

/// What a progress event refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Item(Key),
    List(Key),
}

/// One state transition of a resource. Commands are resolved into actions
/// once, at the boundary; the reducer only ever sees these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchItemStart {
        key: Key,
        metadata: Metadata,
        at: DateTime<Utc>,
    },
    FetchItemSuccess {
        key: Key,
        values: Values,
        metadata: Metadata,
        http_code: u16,
        at: DateTime<Utc>,
    },
    FetchItemError {
        key: Key,
        failure: Failure,
        at: DateTime<Utc>,
    },
    FetchListStart {
        list_key: Key,
        metadata: Metadata,
        at: DateTime<Utc>,
    },
    FetchListSuccess {
        list_key: Key,
        items: Vec<(Key, Values)>,
        metadata: Metadata,
        item_metadata: Metadata,
        http_code: u16,
        at: DateTime<Utc>,
    },
    FetchListError {
        list_key: Key,
        failure: Failure,
        at: DateTime<Utc>,
    },
    NewItem {
        key: Key,
        values: Values,
        lists: ListOperations,
    },
    EditNewItem {
        values: Values,
    },
    ClearNewItem,
    EditItem {
        key: Key,
        values: Values,
    },
    ClearItemEdit {
        key: Key,
    },
    CreateItemStart {
        key: Key,
        values: Values,
        metadata: Metadata,
        lists: ListOperations,
        at: DateTime<Utc>,
    },
    CreateItemSuccess {
        temporary_key: Key,
        key: Key,
        values: Values,
        metadata: Metadata,
        http_code: u16,
        at: DateTime<Utc>,
    },
    CreateItemError {
        key: Key,
        failure: Failure,
        at: DateTime<Utc>,
    },
    UpdateItemStart {
        key: Key,
        values: Values,
        metadata: Metadata,
        at: DateTime<Utc>,
    },
    UpdateItemSuccess {
        key: Key,
        values: Values,
        metadata: Metadata,
        previous_values: Option<Values>,
        http_code: u16,
        at: DateTime<Utc>,
    },
    UpdateItemError {
        key: Key,
        failure: Failure,
        at: DateTime<Utc>,
    },
    DestroyItemStart {
        key: Key,
        previous_values: Option<Values>,
        at: DateTime<Utc>,
    },
    DestroyItemSuccess {
        key: Key,
        previous_values: Option<Values>,
    },
    DestroyItemError {
        key: Key,
        /// Values held before the destroy started
        restore: Option<Values>,
        failure: Failure,
        at: DateTime<Utc>,
    },
    ClearItem {
        key: Key,
    },
    ClearList {
        list_key: Key,
    },
    SelectItem {
        key: Key,
        value: SelectionValue,
    },
    SelectAnotherItem {
        key: Key,
        value: SelectionValue,
    },
    DeselectItem {
        key: Key,
    },
    ClearSelectedItems,
    Progress {
        target: Target,
        event: ProgressEvent,
    },
}

impl Action {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Action::FetchItemStart { .. } => "fetch_item_start",
            Action::FetchItemSuccess { .. } => "fetch_item_success",
            Action::FetchItemError { .. } => "fetch_item_error",
            Action::FetchListStart { .. } => "fetch_list_start",
            Action::FetchListSuccess { .. } => "fetch_list_success",
            Action::FetchListError { .. } => "fetch_list_error",
            Action::NewItem { .. } => "new_item",
            Action::EditNewItem { .. } => "edit_new_item",
            Action::ClearNewItem => "clear_new_item",
            Action::EditItem { .. } => "edit_item",
            Action::ClearItemEdit { .. } => "clear_item_edit",
            Action::CreateItemStart { .. } => "create_item_start",
            Action::CreateItemSuccess { .. } => "create_item_success",
            Action::CreateItemError { .. } => "create_item_error",
            Action::UpdateItemStart { .. } => "update_item_start",
            Action::UpdateItemSuccess { .. } => "update_item_success",
            Action::UpdateItemError { .. } => "update_item_error",
            Action::DestroyItemStart { .. } => "destroy_item_start",
            Action::DestroyItemSuccess { .. } => "destroy_item_success",
            Action::DestroyItemError { .. } => "destroy_item_error",
            Action::ClearItem { .. } => "clear_item",
            Action::ClearList { .. } => "clear_list",
            Action::SelectItem { .. } => "select_item",
            Action::SelectAnotherItem { .. } => "select_another_item",
            Action::DeselectItem { .. } => "deselect_item",
            Action::ClearSelectedItems => "clear_selected_items",
            Action::Progress { .. } => "progress",
        }
    }
}
