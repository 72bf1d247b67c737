//! Read surface over resource snapshots

use std::borrow::Cow;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    key::Key,
    state::{Entity, EntityList, ResourceState},
    status::{
        can_fall_back_to_stale, is_edited, is_fetching, is_synced_with_remote,
        time_since_fetch_started, time_since_last_sync, Status,
    },
};

/// A list together with the entities it references, in position order
#[derive(Debug, Clone)]
pub struct ListView<'a> {
    pub key: &'a str,
    /// The stored list, or the untouched representation when absent
    pub list: Cow<'a, EntityList>,
    /// Referenced entities; positions whose entity is gone are skipped
    pub items: Vec<(&'a Key, &'a Entity)>,
}

impl ListView<'_> {
    pub fn status(&self) -> &Status {
        &self.list.status
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &crate::state::Values> {
        self.items.iter().map(|(_, entity)| &entity.values)
    }
}

pub fn item<'a>(state: &'a ResourceState, key: &str) -> Option<&'a Entity> {
    state.items.get(key)
}

pub fn list<'a>(state: &'a ResourceState, list_key: &'a str) -> ListView<'a> {
    let stored = state.lists.get(list_key);

    let items = stored
        .map(|list| {
            list.positions
                .iter()
                .filter_map(|key| state.items.get_key_value(key))
                .collect()
        })
        .unwrap_or_default();

    ListView {
        key: list_key,
        list: stored.map_or_else(|| Cow::Owned(EntityList::default()), Cow::Borrowed),
        items,
    }
}

/// The entity started by the latest new/create command
pub fn new_item(state: &ResourceState) -> Option<(&Key, &Entity)> {
    state
        .new_item_key
        .as_ref()
        .and_then(|key| state.items.get_key_value(key))
}

/// Selected entities in key order. Selected keys without an entity are
/// skipped.
pub fn selected_items(state: &ResourceState) -> Vec<(&Key, &Entity)> {
    state
        .selection_map
        .keys()
        .filter_map(|key| state.items.get_key_value(key))
        .collect()
}

/// Status predicates shared by entities and lists
pub trait Synced {
    fn status(&self) -> &Status;

    fn is_fetching(&self) -> bool {
        is_fetching(self.status())
    }

    fn is_synced_with_remote(&self) -> bool {
        is_synced_with_remote(self.status())
    }

    fn is_edited(&self) -> bool {
        is_edited(self.status())
    }

    fn can_fall_back_to_stale(&self) -> bool {
        can_fall_back_to_stale(self.status())
    }

    fn time_since_fetch_started(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        time_since_fetch_started(self.status(), now)
    }

    fn time_since_last_sync(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        time_since_last_sync(self.status(), now)
    }
}

impl Synced for Entity {
    fn status(&self) -> &Status {
        &self.status
    }
}

impl Synced for EntityList {
    fn status(&self) -> &Status {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::status::StatusType;

    fn state() -> ResourceState {
        let mut state = ResourceState::default();
        for id in [1, 2, 3] {
            state.items.insert(
                id.to_string(),
                Entity {
                    values: serde_json::from_value(json!({"id": id})).unwrap(),
                    ..Entity::default()
                },
            );
        }
        state.lists.insert(
            String::new(),
            EntityList {
                positions: vec!["3".to_string(), "9".to_string(), "1".to_string()],
                ..EntityList::default()
            },
        );
        state
    }

    #[test]
    fn test_list_resolves_in_position_order() {
        let state = state();
        let view = list(&state, "");

        let keys: Vec<&str> = view.items.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["3", "1"]);
        assert_eq!(view.list.positions.len(), 3);
        assert!(matches!(view.list, Cow::Borrowed(_)));
    }

    #[test]
    fn test_missing_list_is_untouched() {
        let state = state();
        let view = list(&state, "page=2");

        assert!(view.is_empty());
        assert_eq!(view.list.as_ref(), &EntityList::default());
        assert!(view.status().kind.is_none());
    }

    #[test]
    fn test_new_and_selected_items() {
        let mut state = state();
        state.new_item_key = Some("2".to_string());
        state.selection_map.insert("3".to_string(), json!(true));
        state.selection_map.insert("7".to_string(), json!(true));

        assert_eq!(new_item(&state).map(|(key, _)| key.as_str()), Some("2"));
        let selected: Vec<&str> = selected_items(&state)
            .into_iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(selected, vec!["3"]);
    }

    #[test]
    fn test_predicates_on_entity() {
        let synced_at = Utc.timestamp_opt(100, 0).unwrap();
        let entity = Entity {
            status: Status {
                synced_at: Some(synced_at),
                requested_at: Some(synced_at),
                ..Status::of(StatusType::Error)
            },
            ..Entity::default()
        };

        assert!(entity.can_fall_back_to_stale());
        assert!(!entity.is_synced_with_remote());
        assert!(!entity.is_fetching());
        assert_eq!(
            entity.time_since_last_sync(Utc.timestamp_opt(160, 0).unwrap()),
            Some(TimeDelta::seconds(60))
        );
    }
}
