use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{key::Key, status::Status};

/// Attribute map of an entity's domain payload
pub type Values = serde_json::Map<String, Value>;

/// Out-of-band descriptive data (pagination, projection markers)
pub type Metadata = serde_json::Map<String, Value>;

/// Value stored against a selected key
pub type SelectionValue = Value;

/// One cached record of a resource
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Entity {
    #[serde(default)]
    pub values: Values,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Named, ordered view over entity keys. Positions reference entities
/// without owning them.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct EntityList {
    #[serde(default)]
    pub positions: Vec<Key>,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Snapshot of everything cached for one resource type
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct ResourceState {
    #[serde(default)]
    pub items: BTreeMap<Key, Entity>,

    #[serde(default)]
    pub lists: BTreeMap<Key, EntityList>,

    #[serde(default)]
    pub selection_map: BTreeMap<Key, SelectionValue>,

    /// Key of the entity most recently started with new/create
    #[serde(default)]
    pub new_item_key: Option<Key>,
}

impl ResourceState {
    /// Remove an entity together with its selection entry and every list
    /// position referencing it
    pub fn remove_everywhere(&mut self, key: &str) -> Option<Entity> {
        let removed = self.items.remove(key);
        self.selection_map.remove(key);

        for list in self.lists.values_mut() {
            list.positions.retain(|position| position != key);
        }

        if self.new_item_key.as_deref() == Some(key) {
            self.new_item_key = None;
        }

        removed
    }

    /// Replace every occurrence of `from` with `to` in every list, keeping order.
    /// Lists that already hold `to` drop their `from` positions instead.
    pub fn rewrite_positions(&mut self, from: &str, to: &str) {
        for list in self.lists.values_mut() {
            if list.positions.iter().any(|position| position == to) {
                list.positions.retain(|position| position != from);
                continue;
            }
            for position in list.positions.iter_mut() {
                if position == from {
                    *position = to.to_string();
                }
            }
        }
    }
}

/// Shallow merge: attributes of `incoming` overwrite those of `base`
pub fn merge_values(base: &Values, incoming: &Values) -> Values {
    let mut merged = base.clone();
    for (name, value) in incoming {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
