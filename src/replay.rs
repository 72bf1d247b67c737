//! Replays a scripted session against a store backed by [`ScriptedTransport`]

mod script;

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::{
    client::{
        Client, CreateOptions, DestroyOptions, Dispatch, FetchOptions, NewItemOptions, Resource,
        UpdateOptions,
    },
    config::SyncConfig,
    state::ResourceState,
    store::Store,
    transport::{Request, ScriptedTransport},
};

pub use script::{AssociationSpec, Command, ListsSpec, ResourceSpec, Script, Step};

/// Scripts with more steps than this show a progress bar
const PROGRESS_THRESHOLD: usize = 10;

/// Everything observable after a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub resources: BTreeMap<String, ResourceState>,
    pub warnings: Vec<String>,
    pub requests: Vec<Request>,
    pub suppressed: usize,
}

pub async fn run(script: &Script, config: SyncConfig, show_progress: bool) -> Result<ReplayReport> {
    let store = Arc::new(Store::new(config.clone()));
    let transport = Arc::new(ScriptedTransport::new());
    let client = Client::new(store.clone(), transport.clone());

    for resource in &script.resources {
        client.define(resource.to_definition(&config)?);
    }
    for association in &script.associations {
        store.associate(association.to_descriptor());
    }

    let bar = if show_progress && script.steps.len() > PROGRESS_THRESHOLD {
        let bar = ProgressBar::new(script.steps.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {msg} [{bar:40.cyan/blue}] {pos}/{len} steps ({eta})")
                .context("Failed to create progress template")?
                .progress_chars("█▓░"),
        );
        bar.set_message("Replaying");
        Some(bar)
    } else {
        None
    };

    let mut in_flight = Vec::new();
    let mut suppressed = 0;

    for (index, step) in script.steps.iter().enumerate() {
        let resource = client
            .resource(&step.resource)
            .with_context(|| format!("step {} ({})", index + 1, step.command.name()))?;

        tracing::info!(
            "step {}: {} {}",
            index + 1,
            step.resource,
            step.command.name()
        );

        let remote = step.command.remote();
        let target = match (remote, step.command.target(resource.definition())) {
            (Some((Some(reply), _)), Some(Ok((method, endpoint)))) => {
                transport.expect(method, endpoint.clone(), reply.clone());
                Some((method, endpoint))
            }
            _ => None,
        };

        let dispatch = apply(&resource, &step.command);

        if !dispatch.is_pending() {
            if let Some((method, endpoint)) = &target {
                transport.withdraw(*method, endpoint);
            }
        }

        match dispatch {
            Dispatch::Suppressed => {
                suppressed += 1;
                tracing::info!("step {}: suppressed duplicate request", index + 1);
            }
            Dispatch::Pending(_) if remote.is_some_and(|(_, wait)| !wait) => {
                in_flight.push(dispatch);
            }
            dispatch => dispatch.settled().await,
        }

        if let Some(bar) = &bar {
            bar.inc(1);
        }
    }

    for dispatch in in_flight {
        dispatch.settled().await;
    }

    if let Some(bar) = bar {
        bar.finish_with_message("Replay complete");
    }

    Ok(ReplayReport {
        resources: store
            .snapshots()
            .into_iter()
            .map(|(name, state)| (name, state.as_ref().clone()))
            .collect(),
        warnings: store
            .warnings()
            .entries()
            .iter()
            .map(ToString::to_string)
            .collect(),
        requests: transport.requests(),
        suppressed,
    })
}

fn apply(resource: &Resource<ScriptedTransport>, command: &Command) -> Dispatch {
    match command.clone() {
        Command::FetchItem {
            params,
            force,
            metadata,
            ..
        } => resource.fetch_item(
            params,
            FetchOptions {
                force,
                metadata,
                ..FetchOptions::default()
            },
        ),
        Command::FetchList {
            params,
            force,
            metadata,
            ..
        } => resource.fetch_list(
            params,
            FetchOptions {
                force,
                metadata,
                ..FetchOptions::default()
            },
        ),
        Command::NewItem {
            params,
            values,
            lists,
        } => {
            let key = resource.new_item(
                params,
                values,
                NewItemOptions {
                    lists: lists.to_hints(),
                },
            );
            tracing::debug!("{}: new item '{}'", resource.name(), key);
            Dispatch::Applied
        }
        Command::EditNewItem { values } => {
            resource.edit_new_item(values);
            Dispatch::Applied
        }
        Command::ClearNewItem => {
            resource.clear_new_item();
            Dispatch::Applied
        }
        Command::EditItem { params, values } => {
            resource.edit_item(params, values);
            Dispatch::Applied
        }
        Command::ClearItemEdit { params } => {
            resource.clear_item_edit(params);
            Dispatch::Applied
        }
        Command::ClearItem { params } => {
            resource.clear_item(params);
            Dispatch::Applied
        }
        Command::ClearList { params } => {
            resource.clear_list(params);
            Dispatch::Applied
        }
        Command::CreateItem {
            params,
            values,
            force,
            metadata,
            lists,
            ..
        } => {
            let (key, dispatch) = resource.create_item(
                params,
                values,
                CreateOptions {
                    force,
                    metadata,
                    lists: lists.to_hints(),
                },
            );
            tracing::debug!("{}: creating '{}'", resource.name(), key);
            dispatch
        }
        Command::UpdateItem {
            params,
            values,
            force,
            metadata,
            previous_values,
            ..
        } => resource.update_item(
            params,
            values,
            UpdateOptions {
                force,
                metadata,
                previous_values,
            },
        ),
        Command::DestroyItem {
            params,
            force,
            previous_values,
            ..
        } => resource.destroy_item(
            params,
            DestroyOptions {
                force,
                previous_values,
            },
        ),
        Command::SelectItem { params, value } => {
            resource.select_item(params, value);
            Dispatch::Applied
        }
        Command::SelectAnotherItem { params, value } => {
            resource.select_another_item(params, value);
            Dispatch::Applied
        }
        Command::DeselectItem { params } => {
            resource.deselect_item(params);
            Dispatch::Applied
        }
        Command::ClearSelectedItems => {
            resource.clear_selected_items();
            Dispatch::Applied
        }
    }
}

/// Render a report in the requested format
pub fn render(report: &ReplayReport, json: bool) -> Result<String> {
    if json {
        serde_json::to_string_pretty(report).context("Failed to serialize report")
    } else {
        serde_yaml::to_string(report).context("Failed to serialize report")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_replay_destroy_with_association() {
        let script = Script::parse(
            r#"
resources:
  - name: users
    url: /users/:id
  - name: addresses
    url: /addresses/:id
associations:
  - owner: users
    associated: addresses
    cardinality: one
steps:
  - resource: users
    command: fetch_item
    params: 1
    reply:
      response:
        values: {id: 1, addressId: 4}
  - resource: addresses
    command: destroy_item
    params: 4
    previous_values: {id: 4, userId: 1}
    reply:
      response: {http_code: 204}
"#,
        )
        .unwrap();

        let report = run(&script, SyncConfig::default(), false).await.unwrap();

        assert_eq!(report.resources["users"].items["1"].values["addressId"], json!(null));
        assert_eq!(report.requests.len(), 2);
        assert_eq!(report.requests[1].endpoint, "/addresses/4");
        // the address itself was never fetched
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("not in the store"));
    }

    #[tokio::test]
    async fn test_replay_counts_suppressed_requests() {
        let script = Script::parse(
            r#"
resources:
  - name: users
    url: /users/:id
steps:
  - resource: users
    command: fetch_list
    wait: false
    reply:
      delay_ms: 20
      response:
        values: [{id: 1}]
  - resource: users
    command: fetch_list
    reply:
      response:
        values: [{id: 2}]
"#,
        )
        .unwrap();

        let report = run(&script, SyncConfig::default(), false).await.unwrap();

        assert_eq!(report.suppressed, 1);
        assert_eq!(report.requests.len(), 1);
        assert_eq!(report.resources["users"].lists[""].positions, vec!["1"]);
    }

    #[tokio::test]
    async fn test_unsent_request_leaves_no_reply_behind() {
        let script = Script::parse(
            r#"
resources:
  - name: users
    url: /users/:id
  - name: posts
    url: /users/:userId/posts/:id
steps:
  - resource: posts
    command: fetch_item
    params: 3
    reply:
      response:
        values: {id: 3, title: post}
  - resource: users
    command: fetch_item
    params: 1
    reply:
      response:
        values: {id: 1, name: Ada}
"#,
        )
        .unwrap();

        let report = run(&script, SyncConfig::default(), false).await.unwrap();

        assert_eq!(report.requests.len(), 1);
        assert_eq!(
            report.resources["users"].items["1"].values["name"],
            json!("Ada")
        );
        assert!(report.resources["posts"].items["3"].status.error.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_steps_receive_their_own_replies() {
        let mut yaml = String::from("resources:\n  - name: users\n    url: /users/:id\nsteps:\n");
        for id in 1..=8 {
            yaml.push_str(&format!(
                "  - resource: users\n    command: fetch_item\n    params: {id}\n    wait: false\n    reply:\n      delay_ms: {delay}\n      response:\n        values: {{id: {id}, tag: {id}}}\n",
                id = id,
                delay = (9 - id) * 2,
            ));
        }
        let script = Script::parse(&yaml).unwrap();

        for _ in 0..20 {
            let report = run(&script, SyncConfig::default(), false).await.unwrap();
            let users = &report.resources["users"];

            assert_eq!(users.items.len(), 8);
            for (key, entity) in &users.items {
                assert_eq!(&entity.values["tag"].to_string(), key);
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_resource_fails() {
        let script = Script::parse("steps:\n  - resource: ghosts\n    command: clear_new_item\n").unwrap();
        assert!(run(&script, SyncConfig::default(), false).await.is_err());
    }

    #[test]
    fn test_render_formats() {
        let report = ReplayReport {
            resources: BTreeMap::new(),
            warnings: vec!["careful".to_string()],
            requests: Vec::new(),
            suppressed: 0,
        };

        assert!(render(&report, true).unwrap().contains("\"careful\""));
        assert!(render(&report, false).unwrap().contains("- careful"));
    }
}
