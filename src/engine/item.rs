use chrono::{DateTime, Utc};

use super::{Context, LifecycleEvent};
use crate::{
    state::{merge_values, Entity, Metadata, ResourceState, Values},
    status::{merge_status, MergePolicy, Status, StatusField, StatusType},
    transport::{Direction, Failure, ProgressEvent},
    warning::Warning,
};

/// Kept across a request that has not been confirmed yet
const IN_FLIGHT: &[StatusField] = &[
    StatusField::SyncedAt,
    StatusField::Dirty,
    StatusField::OriginalValues,
];

/// Kept when a request fails
const ON_FAILURE: &[StatusField] = &[
    StatusField::SyncedAt,
    StatusField::RequestedAt,
    StatusField::Dirty,
    StatusField::OriginalValues,
];

pub(super) fn fetch_start(state: &mut ResourceState, key: &str, metadata: &Metadata, at: DateTime<Utc>) {
    let entity = state.items.entry(key.to_string()).or_default();

    entity.status = merge_status(
        &entity.status,
        Status::requested(StatusType::Fetching, at),
        &MergePolicy::only_persist(IN_FLIGHT),
    );
    entity.metadata = merge_values(&entity.metadata, metadata);
}

/// Store values confirmed by the remote. Values already synced are shallow
/// merged rather than replaced so a lower-detail projection never erases
/// attributes known from a higher-detail one.
pub(super) fn receive(
    state: &mut ResourceState,
    key: &str,
    values: &Values,
    metadata: &Metadata,
    http_code: u16,
    at: DateTime<Utc>,
) {
    let entity = state.items.entry(key.to_string()).or_default();

    entity.values = if entity.status.synced_at.is_some() {
        merge_values(&entity.values, values)
    } else {
        values.clone()
    };
    entity.status = Status::synced(Some(http_code), at);
    entity.metadata = merge_values(&entity.metadata, metadata);
}

pub(super) fn fetch_error(state: &mut ResourceState, key: &str, failure: &Failure, at: DateTime<Utc>) {
    let entity = state.items.entry(key.to_string()).or_default();

    entity.status = merge_status(
        &entity.status,
        failure.to_status(StatusType::Error, at),
        &MergePolicy::only_persist(ON_FAILURE),
    );
    entity.metadata = merge_values(&entity.metadata, &failure.metadata);
}

pub(super) fn new_item(state: &mut ResourceState, key: &str, values: &Values) {
    // an abandoned new item is replaced by the next one
    if let Some(previous) = state.new_item_key.clone() {
        let still_new = state
            .items
            .get(&previous)
            .is_some_and(|entity| entity.status.is(StatusType::New));

        if previous != key && still_new {
            tracing::debug!("Discarding unsaved new item '{}'", previous);
            state.remove_everywhere(&previous);
        }
    }

    state.items.insert(
        key.to_string(),
        Entity {
            values: values.clone(),
            status: Status::of(StatusType::New),
            metadata: Metadata::new(),
        },
    );
    state.new_item_key = Some(key.to_string());
}

pub(super) fn edit_new_item(ctx: &mut Context<'_>, state: &mut ResourceState, values: &Values) {
    let Some(key) = state.new_item_key.clone() else {
        ctx.warnings.push(Warning::NoNewItem {
            resource: ctx.resource.to_string(),
        });
        return;
    };

    let Some(entity) = state.items.get_mut(&key) else {
        ctx.warnings.push(Warning::NoNewItem {
            resource: ctx.resource.to_string(),
        });
        return;
    };

    if !entity.status.is(StatusType::New) {
        ctx.warnings.push(Warning::NotNewItem {
            resource: ctx.resource.to_string(),
            key: key.clone(),
        });
    }

    entity.values = merge_values(&entity.values, values);
}

pub(super) fn clear_new_item(state: &mut ResourceState) {
    if let Some(key) = state.new_item_key.take() {
        let still_new = state
            .items
            .get(&key)
            .is_some_and(|entity| entity.status.is(StatusType::New));

        if still_new {
            state.remove_everywhere(&key);
        }
    }
}

pub(super) fn edit(ctx: &mut Context<'_>, state: &mut ResourceState, key: &str, values: &Values) {
    let Some(entity) = state.items.get_mut(key) else {
        ctx.missing_item("edit", key);
        return;
    };

    let mut status = merge_status(
        &entity.status,
        Status::of(StatusType::Editing),
        &MergePolicy::only_persist(&[
            StatusField::SyncedAt,
            StatusField::RequestedAt,
            StatusField::HttpCode,
            StatusField::Dirty,
            StatusField::OriginalValues,
        ]),
    );
    status.mark_dirty(&entity.values);

    entity.status = status;
    entity.values = merge_values(&entity.values, values);
}

pub(super) fn clear_edit(ctx: &mut Context<'_>, state: &mut ResourceState, key: &str) {
    let Some(entity) = state.items.get_mut(key) else {
        ctx.missing_item("clear edit", key);
        return;
    };

    let Some(original) = entity.status.original_values.clone() else {
        ctx.warnings.push(Warning::NothingToClear {
            resource: ctx.resource.to_string(),
            key: key.to_string(),
        });
        return;
    };

    entity.values = original;
    entity.status = merge_status(
        &entity.status,
        Status::of(StatusType::Success),
        &MergePolicy::only_persist(&[
            StatusField::SyncedAt,
            StatusField::RequestedAt,
            StatusField::HttpCode,
        ]),
    );
}

pub(super) fn create_start(
    ctx: &mut Context<'_>,
    state: &mut ResourceState,
    key: &str,
    values: &Values,
    metadata: &Metadata,
    at: DateTime<Utc>,
) {
    let collides = state
        .items
        .get(key)
        .is_some_and(|entity| entity.status.synced_at.is_some());

    if collides {
        ctx.warnings.push(Warning::KeyCollision {
            resource: ctx.resource.to_string(),
            key: key.to_string(),
        });
    }

    state.items.insert(
        key.to_string(),
        Entity {
            values: values.clone(),
            status: Status::requested(StatusType::Creating, at),
            metadata: metadata.clone(),
        },
    );
    state.new_item_key = Some(key.to_string());

    ctx.events.push(LifecycleEvent::Created {
        key: key.to_string(),
        replaces: None,
        values: values.clone(),
    });
}

/// Confirm a create and promote the entity from its temporary key to the
/// permanent one, rewriting every reference held by this resource
#[allow(clippy::too_many_arguments)]
pub(super) fn create_success(
    ctx: &mut Context<'_>,
    state: &mut ResourceState,
    temporary_key: &str,
    key: &str,
    values: &Values,
    metadata: &Metadata,
    http_code: u16,
    at: DateTime<Utc>,
) {
    let mut entity = state.items.remove(temporary_key).unwrap_or_default();

    entity.values = merge_values(&entity.values, values);
    entity.status = Status::synced(Some(http_code), at);
    entity.metadata = merge_values(&entity.metadata, metadata);

    if temporary_key != key {
        tracing::debug!(
            "{}: promoting '{}' to '{}'",
            ctx.resource,
            temporary_key,
            key
        );

        if let Some(existing) = state.items.get(key) {
            ctx.warnings.push(Warning::KeyCollision {
                resource: ctx.resource.to_string(),
                key: key.to_string(),
            });
            entity.values = merge_values(&existing.values, &entity.values);
            entity.metadata = merge_values(&existing.metadata, &entity.metadata);
        }

        state.rewrite_positions(temporary_key, key);

        if let Some(selection) = state.selection_map.remove(temporary_key) {
            state.selection_map.insert(key.to_string(), selection);
        }
    }

    let final_values = entity.values.clone();
    state.items.insert(key.to_string(), entity);

    if state.new_item_key.as_deref() == Some(temporary_key) {
        state.new_item_key = Some(key.to_string());
    }

    ctx.events.push(LifecycleEvent::Created {
        key: key.to_string(),
        replaces: Some(temporary_key.to_string()),
        values: final_values,
    });
}

pub(super) fn create_error(state: &mut ResourceState, key: &str, failure: &Failure, at: DateTime<Utc>) {
    let entity = state.items.entry(key.to_string()).or_default();

    entity.status = merge_status(
        &entity.status,
        failure.to_status(StatusType::Error, at),
        &MergePolicy::only_persist(&[StatusField::RequestedAt]),
    );
}

pub(super) fn update_start(
    ctx: &mut Context<'_>,
    state: &mut ResourceState,
    key: &str,
    values: &Values,
    metadata: &Metadata,
    at: DateTime<Utc>,
) {
    if !state.items.contains_key(key) {
        ctx.missing_item("update", key);
    }

    let entity = state.items.entry(key.to_string()).or_default();

    entity.values = merge_values(&entity.values, values);
    entity.status = merge_status(
        &entity.status,
        Status::requested(StatusType::Updating, at),
        &MergePolicy::only_persist(IN_FLIGHT),
    );
    entity.metadata = merge_values(&entity.metadata, metadata);
}

#[allow(clippy::too_many_arguments)]
pub(super) fn update_success(
    ctx: &mut Context<'_>,
    state: &mut ResourceState,
    key: &str,
    values: &Values,
    metadata: &Metadata,
    previous_values: Option<&Values>,
    http_code: u16,
    at: DateTime<Utc>,
) {
    let entity = state.items.entry(key.to_string()).or_default();

    entity.values = merge_values(&entity.values, values);
    entity.status = Status::synced(Some(http_code), at);
    entity.metadata = merge_values(&entity.metadata, metadata);

    ctx.events.push(LifecycleEvent::Updated {
        key: key.to_string(),
        values: entity.values.clone(),
        previous_values: previous_values.cloned(),
    });
}

/// Record a failed update. Optimistic values stay in place.
pub(super) fn update_error(state: &mut ResourceState, key: &str, failure: &Failure, at: DateTime<Utc>) {
    let entity = state.items.entry(key.to_string()).or_default();

    entity.status = merge_status(
        &entity.status,
        failure.to_status(StatusType::Error, at),
        &MergePolicy::only_persist(ON_FAILURE),
    );
}

pub(super) fn destroy_start(
    ctx: &mut Context<'_>,
    state: &mut ResourceState,
    key: &str,
    previous_values: Option<&Values>,
    at: DateTime<Utc>,
) {
    if !state.items.contains_key(key) {
        ctx.missing_item("destroy", key);
        state.items.insert(
            key.to_string(),
            Entity {
                values: previous_values.cloned().unwrap_or_default(),
                ..Entity::default()
            },
        );
    }

    if let Some(entity) = state.items.get_mut(key) {
        entity.status = merge_status(
            &entity.status,
            Status::requested(StatusType::Destroying, at),
            &MergePolicy::only_persist(IN_FLIGHT),
        );
    }
}

pub(super) fn destroy_success(
    ctx: &mut Context<'_>,
    state: &mut ResourceState,
    key: &str,
    previous_values: Option<&Values>,
) {
    state.remove_everywhere(key);

    ctx.events.push(LifecycleEvent::Destroyed {
        key: key.to_string(),
        previous_values: previous_values.cloned(),
    });
}

pub(super) fn destroy_error(
    state: &mut ResourceState,
    key: &str,
    restore: Option<&Values>,
    failure: &Failure,
    at: DateTime<Utc>,
) {
    let entity = state.items.entry(key.to_string()).or_default();

    if let Some(values) = restore {
        entity.values = values.clone();
    }
    entity.status = merge_status(
        &entity.status,
        failure.to_status(StatusType::DestroyError, at),
        &MergePolicy::only_persist(ON_FAILURE),
    );
}

pub(super) fn progress(state: &mut ResourceState, key: &str, event: &ProgressEvent) {
    if let Some(entity) = state.items.get_mut(key) {
        match event.direction {
            Direction::Up => entity.status.progress_up = Some(event.clone()),
            Direction::Down => entity.status.progress_down = Some(event.clone()),
        }
    }
}
