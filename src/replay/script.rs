use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    association::{AssociationDescriptor, Cardinality},
    client::{ListHints, ListTarget},
    config::SyncConfig,
    definition::ResourceDefinition,
    key::{KeyBy, Params},
    state::{Metadata, Values},
    transport::{Method, ScriptedReply},
};

/// A replay script: resource declarations followed by ordered steps
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub associations: Vec<AssociationSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse script: {:?}", path))
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        let script: Script = serde_yaml::from_str(content)?;
        Ok(script)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub key_by: Option<KeyBy>,
    #[serde(default)]
    pub update_method: Option<Method>,
}

impl ResourceSpec {
    pub fn to_definition(&self, config: &SyncConfig) -> Result<ResourceDefinition> {
        let mut definition = ResourceDefinition::from_config(&self.name, &self.url, config)
            .with_context(|| format!("Invalid resource '{}'", self.name))?;

        if let Some(key_by) = &self.key_by {
            definition = definition.with_key_by(key_by.clone());
        }
        if let Some(method) = self.update_method {
            definition = definition.with_update_method(method);
        }
        Ok(definition)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationSpec {
    pub owner: String,
    pub associated: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub dependent: bool,
}

impl AssociationSpec {
    pub fn to_descriptor(&self) -> AssociationDescriptor {
        let mut descriptor = match self.cardinality {
            Cardinality::One => AssociationDescriptor::has_one(&self.owner, &self.associated),
            Cardinality::Many => AssociationDescriptor::has_many(&self.owner, &self.associated),
        };

        if let Some(key) = &self.key {
            descriptor = descriptor.with_key(key.clone());
        }
        if let Some(foreign_key) = &self.foreign_key {
            descriptor = descriptor.with_foreign_key(foreign_key.clone());
        }
        if self.dependent {
            descriptor = descriptor.dependent();
        }
        descriptor
    }
}

/// One command issued against a resource
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    pub resource: String,
    pub command: Command,
}

/// A step as written: `resource` beside the command's own fields
#[derive(Deserialize)]
struct RawStep {
    resource: String,
    #[serde(flatten)]
    command: serde_yaml::Mapping,
}

impl TryFrom<RawStep> for Step {
    type Error = serde_yaml::Error;

    fn try_from(raw: RawStep) -> std::result::Result<Self, Self::Error> {
        let command = serde_yaml::from_value(serde_yaml::Value::Mapping(raw.command))?;
        Ok(Step {
            resource: raw.resource,
            command,
        })
    }
}

/// List membership hints of new/create steps
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListsSpec {
    #[serde(default)]
    pub push: Vec<Params>,
    #[serde(default)]
    pub unshift: Vec<Params>,
    #[serde(default)]
    pub invalidate: Vec<Params>,
    /// Invalidate every list of the resource
    #[serde(default)]
    pub invalidate_all: bool,
}

impl ListsSpec {
    pub fn to_hints(&self) -> ListHints {
        let mut invalidate: Vec<ListTarget> = self
            .invalidate
            .iter()
            .cloned()
            .map(ListTarget::List)
            .collect();
        if self.invalidate_all {
            invalidate.push(ListTarget::All);
        }

        ListHints {
            push: self.push.clone(),
            unshift: self.unshift.clone(),
            invalidate,
        }
    }
}

fn wait() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", deny_unknown_fields)]
pub enum Command {
    FetchItem {
        #[serde(default)]
        params: Params,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default)]
        reply: Option<ScriptedReply>,
        /// Wait for the completion before the next step
        #[serde(default = "wait")]
        wait: bool,
    },
    FetchList {
        #[serde(default)]
        params: Params,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default)]
        reply: Option<ScriptedReply>,
        #[serde(default = "wait")]
        wait: bool,
    },
    NewItem {
        #[serde(default)]
        params: Params,
        #[serde(default)]
        values: Values,
        #[serde(default)]
        lists: ListsSpec,
    },
    EditNewItem {
        values: Values,
    },
    ClearNewItem,
    EditItem {
        params: Params,
        values: Values,
    },
    ClearItemEdit {
        params: Params,
    },
    ClearItem {
        params: Params,
    },
    ClearList {
        #[serde(default)]
        params: Params,
    },
    CreateItem {
        #[serde(default)]
        params: Params,
        #[serde(default)]
        values: Values,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default)]
        lists: ListsSpec,
        #[serde(default)]
        reply: Option<ScriptedReply>,
        #[serde(default = "wait")]
        wait: bool,
    },
    UpdateItem {
        params: Params,
        values: Values,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        metadata: Metadata,
        #[serde(default)]
        previous_values: Option<Values>,
        #[serde(default)]
        reply: Option<ScriptedReply>,
        #[serde(default = "wait")]
        wait: bool,
    },
    DestroyItem {
        params: Params,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        previous_values: Option<Values>,
        #[serde(default)]
        reply: Option<ScriptedReply>,
        #[serde(default = "wait")]
        wait: bool,
    },
    SelectItem {
        params: Params,
        #[serde(default)]
        value: Option<Value>,
    },
    SelectAnotherItem {
        params: Params,
        #[serde(default)]
        value: Option<Value>,
    },
    DeselectItem {
        params: Params,
    },
    ClearSelectedItems,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::FetchItem { .. } => "fetch_item",
            Command::FetchList { .. } => "fetch_list",
            Command::NewItem { .. } => "new_item",
            Command::EditNewItem { .. } => "edit_new_item",
            Command::ClearNewItem => "clear_new_item",
            Command::EditItem { .. } => "edit_item",
            Command::ClearItemEdit { .. } => "clear_item_edit",
            Command::ClearItem { .. } => "clear_item",
            Command::ClearList { .. } => "clear_list",
            Command::CreateItem { .. } => "create_item",
            Command::UpdateItem { .. } => "update_item",
            Command::DestroyItem { .. } => "destroy_item",
            Command::SelectItem { .. } => "select_item",
            Command::SelectAnotherItem { .. } => "select_another_item",
            Command::DeselectItem { .. } => "deselect_item",
            Command::ClearSelectedItems => "clear_selected_items",
        }
    }

    /// Method and endpoint a remote command sends to. `None` for local
    /// commands; an error when the request cannot be built.
    pub fn target(&self, definition: &ResourceDefinition) -> Option<crate::Result<(Method, String)>> {
        let target = match self {
            Command::FetchItem { params, .. } => {
                definition.item_endpoint(params).map(|endpoint| (Method::Get, endpoint))
            }
            Command::FetchList { params, .. } => {
                definition.list_endpoint(params).map(|endpoint| (Method::Get, endpoint))
            }
            Command::CreateItem { params, .. } => {
                definition.create_endpoint(params).map(|endpoint| (Method::Post, endpoint))
            }
            Command::UpdateItem { params, .. } => definition
                .item_endpoint(params)
                .map(|endpoint| (definition.update_method, endpoint)),
            Command::DestroyItem { params, .. } => {
                definition.item_endpoint(params).map(|endpoint| (Method::Delete, endpoint))
            }
            _ => return None,
        };
        Some(target)
    }

    /// Scripted reply and wait flag of remote commands
    pub fn remote(&self) -> Option<(Option<&ScriptedReply>, bool)> {
        match self {
            Command::FetchItem { reply, wait, .. }
            | Command::FetchList { reply, wait, .. }
            | Command::CreateItem { reply, wait, .. }
            | Command::UpdateItem { reply, wait, .. }
            | Command::DestroyItem { reply, wait, .. } => Some((reply.as_ref(), *wait)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SCRIPT: &str = r#"
resources:
  - name: users
    url: /users/:id
  - name: addresses
    url: /addresses/:id
    update_method: PATCH
associations:
  - owner: users
    associated: addresses
    cardinality: one
steps:
  - resource: users
    command: fetch_list
    params: {page: 1}
    reply:
      response:
        values: [{id: 1, addressId: 4}]
  - resource: addresses
    command: destroy_item
    params: 4
    previous_values: {id: 4, userId: 1}
    reply:
      response: {http_code: 204}
  - resource: users
    command: clear_selected_items
"#;

    #[test]
    fn test_parse_script() {
        let script = Script::parse(SCRIPT).unwrap();

        assert_eq!(script.resources.len(), 2);
        assert_eq!(script.resources[1].update_method, Some(Method::Patch));
        assert_eq!(
            script.associations[0].to_descriptor(),
            AssociationDescriptor::has_one("users", "addresses")
        );

        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[0].command.name(), "fetch_list");
        match &script.steps[1].command {
            Command::DestroyItem {
                params,
                previous_values,
                wait,
                ..
            } => {
                assert_eq!(params, &Params::from(json!(4)));
                assert!(previous_values.is_some());
                assert!(*wait);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(script.steps[2].command.remote().is_none());
    }

    #[test]
    fn test_lists_spec_to_hints() {
        let spec = ListsSpec {
            push: vec![Params::empty()],
            invalidate_all: true,
            ..ListsSpec::default()
        };
        let hints = spec.to_hints();

        assert_eq!(hints.push.len(), 1);
        assert_eq!(hints.invalidate, vec![ListTarget::All]);
    }

    #[test]
    fn test_misspelled_step_field_is_rejected() {
        let script = "steps:\n  - resource: addresses\n    command: destroy_item\n    params: 4\n    previous_value: {id: 4}\n";
        let error = Script::parse(script).unwrap_err();

        assert!(error.to_string().contains("previous_value"));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let script = "steps:\n  - resource: users\n    command: explode\n";
        assert!(Script::parse(script).is_err());
    }
}
