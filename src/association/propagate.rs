use serde_json::Value;

use super::{AssociationDescriptor, Cardinality};
use crate::{
    engine::LifecycleEvent,
    key::{key_of_value, Key},
    state::{ResourceState, Values},
    warning::Warning,
};

/// Owner state after reacting to one lifecycle event of the associated
/// resource
#[derive(Debug, Clone)]
pub struct Propagation {
    pub state: ResourceState,
    pub warnings: Vec<Warning>,
    pub changed: bool,
}

/// Apply `event` of `descriptor.associated` to the owner resource's state.
///
/// `identity` is the value written into owner attributes for the event's key
/// (the raw identity attribute when known, the key string otherwise).
pub fn propagate(
    descriptor: &AssociationDescriptor,
    owner_state: &ResourceState,
    event: &LifecycleEvent,
    identity: &Value,
) -> Propagation {
    let mut state = owner_state.clone();
    let mut warnings = Vec::new();

    match event {
        LifecycleEvent::Created {
            key,
            replaces,
            values,
        } => {
            if let Some(owner) = owner_of(descriptor, values) {
                if let Some(temporary_key) = replaces {
                    detach(descriptor, &mut state, &owner, temporary_key);
                }
                attach(descriptor, &mut state, &owner, key, identity);
            }
        }
        LifecycleEvent::Updated {
            key,
            values,
            previous_values,
        } => {
            let new_owner = owner_of(descriptor, values);
            let previous_owner = previous_values
                .as_ref()
                .map(|previous| owner_of(descriptor, previous));

            match previous_owner {
                Some(previous_owner) => {
                    if previous_owner != new_owner {
                        if let Some(previous_owner) = previous_owner {
                            detach(descriptor, &mut state, &previous_owner, key);
                        }
                    }
                }
                None => {
                    warnings.push(scan_warning(descriptor, "update", key));
                    for owner in owners_referencing(descriptor, &state, key) {
                        detach(descriptor, &mut state, &owner, key);
                    }
                }
            }

            if let Some(owner) = new_owner {
                attach(descriptor, &mut state, &owner, key, identity);
            }
        }
        LifecycleEvent::Destroyed {
            key,
            previous_values,
        } => {
            let owners = match previous_values
                .as_ref()
                .and_then(|previous| owner_of(descriptor, previous))
            {
                Some(owner) => vec![owner],
                None => {
                    warnings.push(scan_warning(descriptor, "destroy", key));
                    owners_referencing(descriptor, &state, key)
                }
            };

            for owner in owners {
                if descriptor.dependent {
                    tracing::debug!(
                        "Removing dependent {} '{}' of destroyed {} '{}'",
                        descriptor.owner,
                        owner,
                        descriptor.associated,
                        key
                    );
                    state.remove_everywhere(&owner);
                } else {
                    detach(descriptor, &mut state, &owner, key);
                }
            }
        }
    }

    let changed = state != *owner_state;
    Propagation {
        state,
        warnings,
        changed,
    }
}

fn scan_warning(descriptor: &AssociationDescriptor, operation: &'static str, key: &str) -> Warning {
    Warning::MissingPreviousValues {
        owner: descriptor.owner.clone(),
        associated: descriptor.associated.clone(),
        operation,
        key: key.to_string(),
    }
}

/// Owner key named by the associated entity's foreign key
fn owner_of(descriptor: &AssociationDescriptor, values: &Values) -> Option<Key> {
    values
        .get(&descriptor.foreign_key)
        .filter(|value| !value.is_null())
        .map(key_of_value)
}

fn references(descriptor: &AssociationDescriptor, values: &Values, key: &str) -> bool {
    match (descriptor.cardinality, values.get(&descriptor.key)) {
        (Cardinality::One, Some(value)) => !value.is_null() && key_of_value(value) == key,
        (Cardinality::Many, Some(Value::Array(keys))) => {
            keys.iter().any(|value| key_of_value(value) == key)
        }
        _ => false,
    }
}

/// Full scan of the owner resource for entities referencing `key`
fn owners_referencing(descriptor: &AssociationDescriptor, state: &ResourceState, key: &str) -> Vec<Key> {
    state
        .items
        .iter()
        .filter(|(_, entity)| references(descriptor, &entity.values, key))
        .map(|(owner, _)| owner.clone())
        .collect()
}

fn attach(
    descriptor: &AssociationDescriptor,
    state: &mut ResourceState,
    owner: &str,
    key: &str,
    identity: &Value,
) {
    let Some(entity) = state.items.get_mut(owner) else {
        tracing::debug!(
            "{} '{}' is not cached; nothing to attach {} '{}' to",
            descriptor.owner,
            owner,
            descriptor.associated,
            key
        );
        return;
    };

    match descriptor.cardinality {
        Cardinality::One => {
            entity
                .values
                .insert(descriptor.key.clone(), identity.clone());
        }
        Cardinality::Many => {
            let slot = entity
                .values
                .entry(descriptor.key.clone())
                .or_insert_with(|| Value::Array(Vec::new()));

            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }

            if let Value::Array(keys) = slot {
                if !keys.iter().any(|value| key_of_value(value) == key) {
                    keys.push(identity.clone());
                }
            }
        }
    }
}

fn detach(descriptor: &AssociationDescriptor, state: &mut ResourceState, owner: &str, key: &str) {
    let Some(entity) = state.items.get_mut(owner) else {
        return;
    };

    if !references(descriptor, &entity.values, key) {
        return;
    }

    match descriptor.cardinality {
        Cardinality::One => {
            entity.values.insert(descriptor.key.clone(), Value::Null);
        }
        Cardinality::Many => {
            if let Some(Value::Array(keys)) = entity.values.get_mut(&descriptor.key) {
                keys.retain(|value| key_of_value(value) != key);
            }
        }
    }
}
