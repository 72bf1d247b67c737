use chrono::{DateTime, Utc};

use super::{item, ListOperations, ListSelector};
use crate::{
    key::Key,
    state::{merge_values, Metadata, ResourceState, Values},
    status::{merge_status, MergePolicy, Status, StatusField, StatusType},
    transport::{Direction, Failure, ProgressEvent},
};

/// Start a list fetch. Status and metadata are replaced, positions stay so
/// stale content remains displayable.
pub(super) fn fetch_start(state: &mut ResourceState, list_key: &str, metadata: &Metadata, at: DateTime<Utc>) {
    let list = state.lists.entry(list_key.to_string()).or_default();

    list.status = merge_status(
        &list.status,
        Status::requested(StatusType::Fetching, at),
        &MergePolicy::only_persist(&[StatusField::SyncedAt, StatusField::ItemsInLastResponse]),
    );
    list.metadata = metadata.clone();
}

pub(super) fn fetch_success(
    state: &mut ResourceState,
    list_key: &str,
    items: &[(Key, Values)],
    metadata: &Metadata,
    item_metadata: &Metadata,
    http_code: u16,
    at: DateTime<Utc>,
) {
    for (key, values) in items {
        item::receive(state, key, values, item_metadata, http_code, at);
    }

    let list = state.lists.entry(list_key.to_string()).or_default();
    list.positions = items.iter().map(|(key, _)| key.clone()).collect();
    list.status = Status {
        items_in_last_response: Some(items.len()),
        ..Status::synced(Some(http_code), at)
    };
    list.metadata = merge_values(&list.metadata, metadata);
}

/// Record a failed list fetch. Positions stay; the response item count of an
/// earlier fetch no longer describes anything and is dropped.
pub(super) fn fetch_error(state: &mut ResourceState, list_key: &str, failure: &Failure, at: DateTime<Utc>) {
    let list = state.lists.entry(list_key.to_string()).or_default();

    list.status = merge_status(
        &list.status,
        failure.to_status(StatusType::Error, at),
        &MergePolicy::only_persist(&[StatusField::SyncedAt, StatusField::RequestedAt])
            .excluding(&[StatusField::ItemsInLastResponse]),
    );
    list.metadata = merge_values(&list.metadata, &failure.metadata);
}

/// Apply push, unshift and invalidate for `key`. Invalidation runs last so
/// an invalidated list always ends up untouched.
pub(super) fn apply_operations(state: &mut ResourceState, key: &str, operations: &ListOperations) {
    for list_key in &operations.push {
        state
            .lists
            .entry(list_key.clone())
            .or_default()
            .positions
            .push(key.to_string());
    }

    for list_key in &operations.unshift {
        state
            .lists
            .entry(list_key.clone())
            .or_default()
            .positions
            .insert(0, key.to_string());
    }

    for selector in &operations.invalidate {
        match selector {
            ListSelector::All => state.lists.clear(),
            ListSelector::Key(list_key) => {
                state.lists.remove(list_key);
            }
        }
    }
}

pub(super) fn progress(state: &mut ResourceState, list_key: &str, event: &ProgressEvent) {
    if let Some(list) = state.lists.get_mut(list_key) {
        match event.direction {
            Direction::Up => list.status.progress_up = Some(event.clone()),
            Direction::Down => list.status.progress_down = Some(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::{
        engine::{reduce, Action, ListOperations, ListSelector},
        state::{Entity, EntityList, Metadata, ResourceState, Values},
        status::{Status, StatusType},
        transport::Failure,
        warning::Warning,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn values(value: Value) -> Values {
        serde_json::from_value(value).unwrap()
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn fetched(list_key: &str, rows: Vec<Value>) -> ResourceState {
        let state = reduce(
            "users",
            &ResourceState::default(),
            &Action::FetchListStart {
                list_key: list_key.to_string(),
                metadata: Metadata::new(),
                at: at(1),
            },
        )
        .state;

        reduce(
            "users",
            &state,
            &Action::FetchListSuccess {
                list_key: list_key.to_string(),
                items: rows
                    .into_iter()
                    .map(|row| (row["id"].to_string(), values(row)))
                    .collect(),
                metadata: Metadata::new(),
                item_metadata: Metadata::new(),
                http_code: 200,
                at: at(2),
            },
        )
        .state
    }

    #[test]
    fn test_fetch_success_replaces_positions() {
        let state = fetched("", vec![json!({"id": 1}), json!({"id": 2})]);

        assert_eq!(state.lists[""].positions, keys(&["1", "2"]));
        assert_eq!(state.lists[""].status.items_in_last_response, Some(2));
        assert_eq!(state.items["2"].status.kind, Some(StatusType::Success));

        let state = reduce(
            "users",
            &state,
            &Action::FetchListSuccess {
                list_key: String::new(),
                items: vec![("3".to_string(), values(json!({"id": 3})))],
                metadata: Metadata::new(),
                item_metadata: Metadata::new(),
                http_code: 200,
                at: at(3),
            },
        )
        .state;

        assert_eq!(state.lists[""].positions, keys(&["3"]));
        assert_eq!(state.items.len(), 3);
    }

    #[test]
    fn test_fetch_start_keeps_positions_and_replaces_metadata() {
        let mut state = fetched("", vec![json!({"id": 1})]);
        state
            .lists
            .get_mut("")
            .unwrap()
            .metadata
            .insert("page".to_string(), json!(1));

        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), json!("PREVIEW"));

        let state = reduce(
            "users",
            &state,
            &Action::FetchListStart {
                list_key: String::new(),
                metadata: metadata.clone(),
                at: at(10),
            },
        )
        .state;

        let list = &state.lists[""];
        assert_eq!(list.positions, keys(&["1"]));
        assert_eq!(list.metadata, metadata);
        assert_eq!(list.status.kind, Some(StatusType::Fetching));
        assert_eq!(list.status.synced_at, Some(at(2)));
        assert_eq!(list.status.requested_at, Some(at(10)));
    }

    #[test]
    fn test_fetch_error_drops_item_count() {
        let state = fetched("", vec![json!({"id": 1}), json!({"id": 2})]);
        let state = reduce(
            "users",
            &state,
            &Action::FetchListStart {
                list_key: String::new(),
                metadata: Metadata::new(),
                at: at(10),
            },
        )
        .state;
        assert_eq!(state.lists[""].status.items_in_last_response, Some(2));

        let state = reduce(
            "users",
            &state,
            &Action::FetchListError {
                list_key: String::new(),
                failure: Failure::http(500, Some(json!("boom")), Vec::new()),
                at: at(11),
            },
        )
        .state;

        let list = &state.lists[""];
        assert_eq!(list.positions, keys(&["1", "2"]));
        assert_eq!(list.status.kind, Some(StatusType::Error));
        assert_eq!(list.status.items_in_last_response, None);
        assert_eq!(list.status.synced_at, Some(at(2)));
    }

    #[test]
    fn test_push_and_unshift() {
        let state = fetched("", vec![json!({"id": 1})]);

        let state = reduce(
            "users",
            &state,
            &Action::CreateItemStart {
                key: "t".to_string(),
                values: Values::new(),
                metadata: Metadata::new(),
                lists: ListOperations {
                    push: vec![String::new()],
                    unshift: vec!["admins".to_string()],
                    invalidate: Vec::new(),
                },
                at: at(3),
            },
        )
        .state;

        assert_eq!(state.lists[""].positions, keys(&["1", "t"]));
        assert_eq!(state.lists["admins"].positions, keys(&["t"]));
        assert_eq!(state.lists["admins"].status.kind, None);
    }

    #[test]
    fn test_invalidate_resets_list() {
        let state = fetched("", vec![json!({"id": 1}), json!({"id": 2})]);

        let state = reduce(
            "users",
            &state,
            &Action::NewItem {
                key: "t".to_string(),
                values: Values::new(),
                lists: ListOperations {
                    push: vec![String::new()],
                    invalidate: vec![ListSelector::Key(String::new())],
                    ..Default::default()
                },
            },
        )
        .state;

        let untouched = state.lists.get("").cloned().unwrap_or_default();
        assert_eq!(untouched, EntityList::default());
        assert_eq!(state.items.len(), 3);
    }

    #[test]
    fn test_invalidate_all() {
        let mut state = fetched("", vec![json!({"id": 1})]);
        state.lists.insert("page=2".to_string(), EntityList::default());

        let state = reduce(
            "users",
            &state,
            &Action::NewItem {
                key: "t".to_string(),
                values: Values::new(),
                lists: ListOperations {
                    invalidate: vec![ListSelector::All],
                    ..Default::default()
                },
            },
        )
        .state;

        assert!(state.lists.is_empty());
    }

    #[test]
    fn test_promotion_rewrites_positions() {
        let mut state = ResourceState::default();
        state.items.insert("x".to_string(), Entity::default());
        state.lists.insert(
            "L".to_string(),
            EntityList {
                positions: keys(&["x"]),
                ..Default::default()
            },
        );

        let state = reduce(
            "users",
            &state,
            &Action::CreateItemStart {
                key: "temp".to_string(),
                values: values(json!({"name": "n"})),
                metadata: Metadata::new(),
                lists: ListOperations {
                    push: vec!["L".to_string()],
                    ..Default::default()
                },
                at: at(1),
            },
        )
        .state;
        assert_eq!(state.lists["L"].positions, keys(&["x", "temp"]));

        let transition = reduce(
            "users",
            &state,
            &Action::CreateItemSuccess {
                temporary_key: "temp".to_string(),
                key: "7".to_string(),
                values: values(json!({"id": 7})),
                metadata: Metadata::new(),
                http_code: 201,
                at: at(2),
            },
        );
        let state = transition.state;

        assert!(!state.items.contains_key("temp"));
        assert_eq!(state.items["7"].values, values(json!({"id": 7, "name": "n"})));
        assert_eq!(state.items["7"].status, Status::synced(Some(201), at(2)));
        assert_eq!(state.lists["L"].positions, keys(&["x", "7"]));
        assert_eq!(state.new_item_key.as_deref(), Some("7"));
    }

    #[test]
    fn test_promotion_onto_cached_key_merges_without_duplicates() {
        let mut state = ResourceState::default();
        state.items.insert(
            "7".to_string(),
            Entity {
                values: values(json!({"id": 7, "name": "old", "bio": "b"})),
                status: Status::synced(Some(200), at(1)),
                metadata: Metadata::new(),
            },
        );
        state.lists.insert(
            "L".to_string(),
            EntityList {
                positions: keys(&["7"]),
                ..Default::default()
            },
        );

        let state = reduce(
            "users",
            &state,
            &Action::CreateItemStart {
                key: "temp".to_string(),
                values: values(json!({"name": "new"})),
                metadata: Metadata::new(),
                lists: ListOperations {
                    push: vec!["L".to_string()],
                    ..Default::default()
                },
                at: at(2),
            },
        )
        .state;
        assert_eq!(state.lists["L"].positions, keys(&["7", "temp"]));

        let transition = reduce(
            "users",
            &state,
            &Action::CreateItemSuccess {
                temporary_key: "temp".to_string(),
                key: "7".to_string(),
                values: values(json!({"id": 7})),
                metadata: Metadata::new(),
                http_code: 201,
                at: at(3),
            },
        );
        let state = transition.state;

        assert!(matches!(
            transition.warnings.as_slice(),
            [Warning::KeyCollision { key, .. }] if key == "7"
        ));
        assert!(!state.items.contains_key("temp"));
        assert_eq!(
            state.items["7"].values,
            values(json!({"id": 7, "name": "new", "bio": "b"}))
        );
        assert_eq!(state.lists["L"].positions, keys(&["7"]));
    }

    #[test]
    fn test_clear_list() {
        let state = fetched("", vec![json!({"id": 1})]);
        let state = reduce(
            "users",
            &state,
            &Action::ClearList {
                list_key: String::new(),
            },
        )
        .state;

        assert!(state.lists.is_empty());
        assert_eq!(state.items.len(), 1);
    }
}
