//! Command surface of a resource.
//!
//! Commands resolve their parameters once, consult the request guard, apply
//! the optimistic transition and hand the remote call to the transport on
//! the Tokio runtime. The completion is applied to whatever snapshot is
//! current when it arrives.

mod options;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{
    definition::ResourceDefinition,
    engine::{selected, Action, Target},
    error::{Error, Result},
    key::{key_from_values, Key, Params},
    state::{merge_values, ResourceState, SelectionValue, Values},
    status::StatusType,
    store::Store,
    transport::{Failure, Method, ProgressSink, Request, Response, Transport},
    warning::Warning,
};

pub use options::{
    CreateOptions, DestroyOptions, FetchOptions, ListHints, ListTarget, NewItemOptions,
    UpdateOptions,
};

/// Outcome of a command
#[must_use]
#[derive(Debug)]
pub enum Dispatch {
    /// Applied synchronously; nothing was sent
    Applied,
    /// An identical request is outstanding; nothing was applied or sent
    Suppressed,
    /// The optimistic transition was applied and a request is in flight
    Pending(JoinHandle<()>),
}

impl Dispatch {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Dispatch::Suppressed)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatch::Pending(_))
    }

    /// Wait until the completion (if any) has been applied
    pub async fn settled(self) {
        if let Dispatch::Pending(handle) = self {
            if let Err(e) = handle.await {
                tracing::error!("request task failed: {}", e);
            }
        }
    }
}

/// Binds a [`Store`] to a [`Transport`]
pub struct Client<T> {
    store: Arc<Store>,
    transport: Arc<T>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> Client<T> {
    pub fn new(store: Arc<Store>, transport: Arc<T>) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Register `definition` and return its command surface
    pub fn define(&self, definition: ResourceDefinition) -> Resource<T> {
        Resource {
            definition: self.store.register(definition),
            store: self.store.clone(),
            transport: self.transport.clone(),
        }
    }

    pub fn resource(&self, name: &str) -> Result<Resource<T>> {
        Ok(Resource {
            definition: self.store.definition(name)?,
            store: self.store.clone(),
            transport: self.transport.clone(),
        })
    }
}

/// Commands of one registered resource
pub struct Resource<T> {
    definition: Arc<ResourceDefinition>,
    store: Arc<Store>,
    transport: Arc<T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            store: self.store.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> Resource<T> {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    pub fn snapshot(&self) -> Arc<ResourceState> {
        self.store.snapshot(&self.definition.name)
    }

    pub fn item_key(&self, params: impl Into<Params>) -> Key {
        self.definition.item_key(&params.into())
    }

    pub fn list_key(&self, params: impl Into<Params>) -> Key {
        self.definition.list_key(&params.into())
    }

    fn apply(&self, action: Action) -> Arc<ResourceState> {
        self.store.dispatch(&self.definition.name, action)
    }

    /// Apply a start/error pair for a request that could not be built
    fn fail_locally(&self, start: Action, error: Error, fail: impl FnOnce(Failure) -> Action) -> Dispatch {
        tracing::debug!("{}: request not sent: {}", self.definition.name, error);
        self.apply(start);
        self.apply(fail(Failure::client(error)));
        Dispatch::Applied
    }

    /// Send `request` on the runtime and apply the action built from its
    /// outcome. The guard entry is released once the completion is applied.
    fn send(
        &self,
        method: Method,
        endpoint: String,
        body: Option<Value>,
        target: Target,
        complete: impl FnOnce(Result<Response, Failure>, DateTime<Utc>) -> Action + Send + 'static,
    ) -> Dispatch {
        let store = self.store.clone();
        let transport = self.transport.clone();
        let resource = self.definition.name.clone();
        let progress = progress_sink(store.clone(), resource.clone(), target);
        let request = Request {
            resource: resource.clone(),
            method,
            endpoint: endpoint.clone(),
            body,
        };

        let handle = tokio::spawn(async move {
            let outcome = transport
                .send(request, progress)
                .await
                .and_then(Response::into_result);

            if let Err(failure) = &outcome {
                tracing::debug!("{} {} failed: {}", method, endpoint, failure);
            }

            store.dispatch(&resource, complete(outcome, Utc::now()));
            store.guard().register_end(method, &endpoint);
        });

        Dispatch::Pending(handle)
    }

    pub fn fetch_item(&self, params: impl Into<Params>, options: FetchOptions) -> Dispatch {
        let params = params.into();
        let key = self.definition.item_key(&params);
        let start = Action::FetchItemStart {
            key: key.clone(),
            metadata: options.metadata,
            at: Utc::now(),
        };

        let endpoint = match self.definition.item_endpoint(&params) {
            Ok(endpoint) => endpoint,
            Err(error) => {
                return self.fail_locally(start, error, |failure| Action::FetchItemError {
                    key,
                    failure,
                    at: Utc::now(),
                })
            }
        };

        if !self.store.guard().try_start(Method::Get, &endpoint, options.force) {
            return Dispatch::Suppressed;
        }

        self.apply(start);
        self.send(
            Method::Get,
            endpoint,
            None,
            Target::Item(key.clone()),
            move |outcome, at| match outcome {
                Ok(response) => Action::FetchItemSuccess {
                    key,
                    values: response.item_values(),
                    metadata: response.metadata,
                    http_code: response.http_code,
                    at,
                },
                Err(failure) => Action::FetchItemError { key, failure, at },
            },
        )
    }

    pub fn fetch_list(&self, params: impl Into<Params>, options: FetchOptions) -> Dispatch {
        let params = params.into();
        let list_key = self.definition.list_key(&params);
        let start = Action::FetchListStart {
            list_key: list_key.clone(),
            metadata: options.metadata,
            at: Utc::now(),
        };

        let endpoint = match self.definition.list_endpoint(&params) {
            Ok(endpoint) => endpoint,
            Err(error) => {
                return self.fail_locally(start, error, |failure| Action::FetchListError {
                    list_key,
                    failure,
                    at: Utc::now(),
                })
            }
        };

        if !self.store.guard().try_start(Method::Get, &endpoint, options.force) {
            return Dispatch::Suppressed;
        }

        self.apply(start);

        let key_by = self.definition.key_by.clone();
        let resource = self.definition.name.clone();
        let item_metadata = options.item_metadata;
        self.send(
            Method::Get,
            endpoint,
            None,
            Target::List(list_key.clone()),
            move |outcome, at| match outcome {
                Ok(response) => {
                    let items = response
                        .list_values()
                        .into_iter()
                        .filter_map(|values| match key_from_values(&values, &key_by) {
                            Some(key) => Some((key, values)),
                            None => {
                                tracing::debug!("{}: dropping list entry without identity", resource);
                                None
                            }
                        })
                        .collect();

                    Action::FetchListSuccess {
                        list_key,
                        items,
                        metadata: response.metadata,
                        item_metadata,
                        http_code: response.http_code,
                        at,
                    }
                }
                Err(failure) => Action::FetchListError {
                    list_key,
                    failure,
                    at,
                },
            },
        )
    }

    /// Start a local-only entity. The key comes from `params` when they carry
    /// an identity, otherwise a temporary key is generated.
    pub fn new_item(
        &self,
        params: impl Into<Params>,
        values: Values,
        options: NewItemOptions,
    ) -> Key {
        let key = self.key_or_temporary(&params.into());

        self.apply(Action::NewItem {
            key: key.clone(),
            values,
            lists: options.lists.resolve(&self.definition),
        });
        key
    }

    pub fn edit_new_item(&self, values: Values) {
        self.apply(Action::EditNewItem { values });
    }

    pub fn clear_new_item(&self) {
        self.apply(Action::ClearNewItem);
    }

    pub fn edit_item(&self, params: impl Into<Params>, values: Values) {
        let key = self.item_key(params);
        self.apply(Action::EditItem { key, values });
    }

    pub fn clear_item_edit(&self, params: impl Into<Params>) {
        let key = self.item_key(params);
        self.apply(Action::ClearItemEdit { key });
    }

    /// Remove an entity from the cache without contacting the remote
    pub fn clear_item(&self, params: impl Into<Params>) {
        let key = self.item_key(params);
        self.apply(Action::ClearItem { key });
    }

    pub fn clear_list(&self, params: impl Into<Params>) {
        let list_key = self.list_key(params);
        self.apply(Action::ClearList { list_key });
    }

    /// Create an entity on the remote.
    ///
    /// The entity is stored under the key derived from `params`, or under
    /// the current new item when `params` are empty, or under a fresh
    /// temporary key. Returns that key; it is replaced by the permanent key
    /// when the remote confirms.
    pub fn create_item(
        &self,
        params: impl Into<Params>,
        values: Values,
        options: CreateOptions,
    ) -> (Key, Dispatch) {
        let params = params.into();
        let snapshot = self.snapshot();

        let (key, values) = match snapshot.new_item_key.as_ref() {
            Some(new_key) if self.item_key_of(&params).is_none() => {
                match snapshot.items.get(new_key) {
                    Some(entity) if entity.status.is(StatusType::New) => {
                        (new_key.clone(), merge_values(&entity.values, &values))
                    }
                    _ => (self.key_or_temporary(&params), values),
                }
            }
            _ => (self.key_or_temporary(&params), values),
        };

        let start = Action::CreateItemStart {
            key: key.clone(),
            values: values.clone(),
            metadata: options.metadata,
            lists: options.lists.resolve(&self.definition),
            at: Utc::now(),
        };

        let endpoint = match self.definition.create_endpoint(&params) {
            Ok(endpoint) => endpoint,
            Err(error) => {
                let temporary_key = key.clone();
                let dispatch = self.fail_locally(start, error, |failure| Action::CreateItemError {
                    key: temporary_key,
                    failure,
                    at: Utc::now(),
                });
                return (key, dispatch);
            }
        };

        if !self.store.guard().try_start(Method::Post, &endpoint, options.force) {
            return (key, Dispatch::Suppressed);
        }

        self.apply(start);

        let store = self.store.clone();
        let key_by = self.definition.key_by.clone();
        let resource = self.definition.name.clone();
        let temporary_key = key.clone();
        let dispatch = self.send(
            Method::Post,
            endpoint,
            Some(Value::Object(values)),
            Target::Item(key.clone()),
            move |outcome, at| match outcome {
                Ok(response) => {
                    let values = response.item_values();
                    let key = key_from_values(&values, &key_by).unwrap_or_else(|| {
                        store.warnings().record(Warning::MissingIdentity {
                            resource,
                            temporary_key: temporary_key.clone(),
                        });
                        temporary_key.clone()
                    });

                    Action::CreateItemSuccess {
                        temporary_key,
                        key,
                        values,
                        metadata: response.metadata,
                        http_code: response.http_code,
                        at,
                    }
                }
                Err(failure) => Action::CreateItemError {
                    key: temporary_key,
                    failure,
                    at,
                },
            },
        );

        (key, dispatch)
    }

    pub fn update_item(
        &self,
        params: impl Into<Params>,
        values: Values,
        options: UpdateOptions,
    ) -> Dispatch {
        let params = params.into();
        let key = self.definition.item_key(&params);
        let method = self.definition.update_method;
        let start = Action::UpdateItemStart {
            key: key.clone(),
            values: values.clone(),
            metadata: options.metadata,
            at: Utc::now(),
        };

        let endpoint = match self.definition.item_endpoint(&params) {
            Ok(endpoint) => endpoint,
            Err(error) => {
                return self.fail_locally(start, error, |failure| Action::UpdateItemError {
                    key,
                    failure,
                    at: Utc::now(),
                })
            }
        };

        if !self.store.guard().try_start(method, &endpoint, options.force) {
            return Dispatch::Suppressed;
        }

        self.apply(start);

        let previous_values = options.previous_values;
        self.send(
            method,
            endpoint,
            Some(Value::Object(values)),
            Target::Item(key.clone()),
            move |outcome, at| match outcome {
                Ok(response) => Action::UpdateItemSuccess {
                    key,
                    values: response.item_values(),
                    metadata: response.metadata,
                    previous_values,
                    http_code: response.http_code,
                    at,
                },
                Err(failure) => Action::UpdateItemError { key, failure, at },
            },
        )
    }

    pub fn destroy_item(&self, params: impl Into<Params>, options: DestroyOptions) -> Dispatch {
        let params = params.into();
        let key = self.definition.item_key(&params);
        let restore = self
            .snapshot()
            .items
            .get(&key)
            .map(|entity| entity.values.clone());
        let start = Action::DestroyItemStart {
            key: key.clone(),
            previous_values: options.previous_values.clone(),
            at: Utc::now(),
        };

        let endpoint = match self.definition.item_endpoint(&params) {
            Ok(endpoint) => endpoint,
            Err(error) => {
                return self.fail_locally(start, error, |failure| Action::DestroyItemError {
                    key,
                    restore,
                    failure,
                    at: Utc::now(),
                })
            }
        };

        if !self.store.guard().try_start(Method::Delete, &endpoint, options.force) {
            return Dispatch::Suppressed;
        }

        self.apply(start);

        let previous_values = options.previous_values;
        self.send(
            Method::Delete,
            endpoint,
            None,
            Target::Item(key.clone()),
            move |outcome, at| match outcome {
                Ok(_) => Action::DestroyItemSuccess {
                    key,
                    previous_values,
                },
                Err(failure) => Action::DestroyItemError {
                    key,
                    restore,
                    failure,
                    at,
                },
            },
        )
    }

    /// Make the entity the only selected one. `value` defaults to `true`.
    pub fn select_item(&self, params: impl Into<Params>, value: Option<SelectionValue>) {
        let key = self.item_key(params);
        self.apply(Action::SelectItem {
            key,
            value: value.unwrap_or_else(selected),
        });
    }

    pub fn select_another_item(&self, params: impl Into<Params>, value: Option<SelectionValue>) {
        let key = self.item_key(params);
        self.apply(Action::SelectAnotherItem {
            key,
            value: value.unwrap_or_else(selected),
        });
    }

    pub fn deselect_item(&self, params: impl Into<Params>) {
        let key = self.item_key(params);
        self.apply(Action::DeselectItem { key });
    }

    pub fn clear_selected_items(&self) {
        self.apply(Action::ClearSelectedItems);
    }

    fn item_key_of(&self, params: &Params) -> Option<Key> {
        Some(self.definition.item_key(params)).filter(|key| !key.is_empty())
    }

    fn key_or_temporary(&self, params: &Params) -> Key {
        self.item_key_of(params)
            .unwrap_or_else(|| self.store.temporary_key())
    }
}

fn progress_sink(store: Arc<Store>, resource: String, target: Target) -> ProgressSink {
    ProgressSink::new(move |event| {
        store.dispatch(
            &resource,
            Action::Progress {
                target: target.clone(),
                event,
            },
        );
    })
}
