use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;
use serde_json::Value;

use crate::{
    association::{propagate, AssociationDescriptor, AssociationRegistry},
    config::SyncConfig,
    definition::ResourceDefinition,
    engine::{reduce, Action, LifecycleEvent},
    error::{Error, Result},
    guard::RequestGuard,
    key::{Key, TemporaryKeys},
    state::ResourceState,
    warning::WarningLog,
};

/// Holds the current snapshot of every resource and applies actions to them.
///
/// Every transition replaces the affected snapshots wholesale; readers keep
/// whatever `Arc` they were handed.
#[derive(Debug)]
pub struct Store {
    config: SyncConfig,
    states: RwLock<BTreeMap<String, Arc<ResourceState>>>,
    definitions: RwLock<BTreeMap<String, Arc<ResourceDefinition>>>,
    associations: RwLock<AssociationRegistry>,
    guard: RequestGuard,
    warnings: WarningLog,
    temporary_keys: TemporaryKeys,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl Store {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            warnings: WarningLog::new(config.developer_warnings),
            config,
            states: RwLock::new(BTreeMap::new()),
            definitions: RwLock::new(BTreeMap::new()),
            associations: RwLock::new(AssociationRegistry::new()),
            guard: RequestGuard::new(),
            temporary_keys: TemporaryKeys::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Register (or replace) a resource definition
    pub fn register(&self, definition: ResourceDefinition) -> Arc<ResourceDefinition> {
        let definition = Arc::new(definition);
        tracing::debug!(
            "Registering resource {} at {}",
            definition.name,
            definition.url.as_str()
        );
        self.definitions
            .write()
            .insert(definition.name.clone(), definition.clone());
        definition
    }

    pub fn definition(&self, name: &str) -> Result<Arc<ResourceDefinition>> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownResource(name.to_string()))
    }

    /// Declare an association. Either resource may be registered later.
    pub fn associate(&self, descriptor: AssociationDescriptor) {
        self.associations.write().register(descriptor);
    }

    /// Current snapshot of `resource`; an untouched resource is empty
    pub fn snapshot(&self, resource: &str) -> Arc<ResourceState> {
        self.states
            .read()
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshots of every resource touched so far
    pub fn snapshots(&self) -> BTreeMap<String, Arc<ResourceState>> {
        self.states.read().clone()
    }

    pub fn guard(&self) -> &RequestGuard {
        &self.guard
    }

    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    pub fn temporary_key(&self) -> Key {
        self.temporary_keys.next()
    }

    /// Apply `action` to `resource`, then propagate its lifecycle events to
    /// every owner resource associated with it. Returns the new snapshot.
    pub fn dispatch(&self, resource: &str, action: Action) -> Arc<ResourceState> {
        let mut states = self.states.write();

        let current = states.get(resource).cloned().unwrap_or_default();
        let transition = reduce(resource, &current, &action);
        let next = Arc::new(transition.state);
        states.insert(resource.to_string(), next.clone());

        for warning in transition.warnings {
            self.warnings.record(warning);
        }

        if transition.events.is_empty() {
            return next;
        }

        let descriptors: Vec<AssociationDescriptor> = self
            .associations
            .read()
            .for_associated(resource)
            .cloned()
            .collect();
        if descriptors.is_empty() {
            return next;
        }

        let definition = self.definitions.read().get(resource).cloned();

        for event in &transition.events {
            let identity = identity_of(definition.as_deref(), event);

            for descriptor in &descriptors {
                let owner_state = states.get(&descriptor.owner).cloned().unwrap_or_default();
                let propagation = propagate(descriptor, &owner_state, event, &identity);

                for warning in propagation.warnings {
                    self.warnings.record(warning);
                }

                if propagation.changed {
                    tracing::debug!(
                        "{} '{}' updated {}",
                        resource,
                        event.key(),
                        descriptor.owner
                    );
                    states.insert(descriptor.owner.clone(), Arc::new(propagation.state));
                }
            }
        }

        states.get(resource).cloned().unwrap_or(next)
    }
}

fn identity_of(definition: Option<&ResourceDefinition>, event: &LifecycleEvent) -> Value {
    let values = match event {
        LifecycleEvent::Created { values, .. } | LifecycleEvent::Updated { values, .. } => {
            Some(values)
        }
        LifecycleEvent::Destroyed { previous_values, .. } => previous_values.as_ref(),
    };

    match (definition, values) {
        (Some(definition), Some(values)) => definition.identity_value(values, event.key()),
        _ => Value::String(event.key().to_string()),
    }
}
