use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{state::Values, transport::ProgressEvent};

/// Lifecycle position of an entity or list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusType {
    New,
    Editing,
    Fetching,
    Creating,
    Updating,
    Destroying,
    DestroyError,
    Success,
    Error,
}

/// Status record attached to every entity and list.
///
/// A missing `kind` is the untouched state: never fetched, never edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StatusType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_occurred_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    /// Set together with `original_values` by a local edit
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_values: Option<Values>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_in_last_response: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_up: Option<ProgressEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_down: Option<ProgressEvent>,
}

/// Names of the individual status attributes, for merge policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    Type,
    HttpCode,
    Error,
    Errors,
    ErrorOccurredAt,
    RequestedAt,
    SyncedAt,
    Dirty,
    OriginalValues,
    ItemsInLastResponse,
    ProgressUp,
    ProgressDown,
}

impl StatusField {
    pub const ALL: [StatusField; 12] = [
        StatusField::Type,
        StatusField::HttpCode,
        StatusField::Error,
        StatusField::Errors,
        StatusField::ErrorOccurredAt,
        StatusField::RequestedAt,
        StatusField::SyncedAt,
        StatusField::Dirty,
        StatusField::OriginalValues,
        StatusField::ItemsInLastResponse,
        StatusField::ProgressUp,
        StatusField::ProgressDown,
    ];
}

/// Which attributes survive a status merge
#[derive(Debug, Clone, Default)]
pub struct MergePolicy {
    /// When set, only these attributes carry over from the previous status
    pub only_persist: Option<Vec<StatusField>>,
    /// Attributes dropped from the result regardless of origin
    pub exclude: Vec<StatusField>,
}

impl MergePolicy {
    pub fn only_persist(fields: &[StatusField]) -> Self {
        Self {
            only_persist: Some(fields.to_vec()),
            exclude: Vec::new(),
        }
    }

    pub fn replace() -> Self {
        Self::only_persist(&[])
    }

    pub fn excluding(mut self, fields: &[StatusField]) -> Self {
        self.exclude.extend_from_slice(fields);
        self
    }
}

impl Status {
    pub fn of(kind: StatusType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn requested(kind: StatusType, at: DateTime<Utc>) -> Self {
        Self {
            kind: Some(kind),
            requested_at: Some(at),
            ..Self::default()
        }
    }

    pub fn synced(http_code: Option<u16>, at: DateTime<Utc>) -> Self {
        Self {
            kind: Some(StatusType::Success),
            http_code,
            synced_at: Some(at),
            ..Self::default()
        }
    }

    pub fn is(&self, kind: StatusType) -> bool {
        self.kind == Some(kind)
    }

    fn has(&self, field: StatusField) -> bool {
        match field {
            StatusField::Type => self.kind.is_some(),
            StatusField::HttpCode => self.http_code.is_some(),
            StatusField::Error => self.error.is_some(),
            StatusField::Errors => !self.errors.is_empty(),
            StatusField::ErrorOccurredAt => self.error_occurred_at.is_some(),
            StatusField::RequestedAt => self.requested_at.is_some(),
            StatusField::SyncedAt => self.synced_at.is_some(),
            StatusField::Dirty => self.dirty,
            StatusField::OriginalValues => self.original_values.is_some(),
            StatusField::ItemsInLastResponse => self.items_in_last_response.is_some(),
            StatusField::ProgressUp => self.progress_up.is_some(),
            StatusField::ProgressDown => self.progress_down.is_some(),
        }
    }

    fn copy_field(&mut self, from: &Status, field: StatusField) {
        match field {
            StatusField::Type => self.kind = from.kind,
            StatusField::HttpCode => self.http_code = from.http_code,
            StatusField::Error => self.error = from.error.clone(),
            StatusField::Errors => self.errors = from.errors.clone(),
            StatusField::ErrorOccurredAt => self.error_occurred_at = from.error_occurred_at,
            StatusField::RequestedAt => self.requested_at = from.requested_at,
            StatusField::SyncedAt => self.synced_at = from.synced_at,
            StatusField::Dirty => self.dirty = from.dirty,
            StatusField::OriginalValues => self.original_values = from.original_values.clone(),
            StatusField::ItemsInLastResponse => {
                self.items_in_last_response = from.items_in_last_response
            }
            StatusField::ProgressUp => self.progress_up = from.progress_up.clone(),
            StatusField::ProgressDown => self.progress_down = from.progress_down.clone(),
        }
    }

    fn clear_field(&mut self, field: StatusField) {
        self.copy_field(&Status::default(), field);
    }

    /// Mark local edits: snapshot the confirmed values on the first edit only
    pub fn mark_dirty(&mut self, confirmed: &Values) {
        if !self.dirty {
            self.dirty = true;
            self.original_values = Some(confirmed.clone());
        }
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
        self.original_values = None;
    }
}

/// Combine a previous status with an incoming partial one.
///
/// Incoming attributes always win. Previous attributes fill the gaps, limited
/// to `only_persist` when the policy names it. `exclude` is applied last.
pub fn merge_status(previous: &Status, incoming: Status, policy: &MergePolicy) -> Status {
    let mut merged = incoming;

    for field in StatusField::ALL {
        let carry = match &policy.only_persist {
            Some(fields) => fields.contains(&field),
            None => true,
        };

        if carry && !merged.has(field) && previous.has(field) {
            merged.copy_field(previous, field);
        }
    }

    for field in &policy.exclude {
        merged.clear_field(*field);
    }

    // dirty and original_values travel together
    if merged.dirty != merged.original_values.is_some() {
        merged.clear_dirty();
    }

    merged
}

/// True while a fetch for this status is outstanding
pub fn is_fetching(status: &Status) -> bool {
    status.is(StatusType::Fetching)
}

/// True when the values were confirmed by the remote and not edited since
pub fn is_synced_with_remote(status: &Status) -> bool {
    status.synced_at.is_some() && status.is(StatusType::Success) && !status.dirty
}

/// True when local edits have not been confirmed yet
pub fn is_edited(status: &Status) -> bool {
    status.dirty
}

/// True when previously synced values are still available to display even
/// though the latest request failed or is still running
pub fn can_fall_back_to_stale(status: &Status) -> bool {
    status.synced_at.is_some()
        && matches!(
            status.kind,
            Some(StatusType::Error) | Some(StatusType::Fetching) | Some(StatusType::Success)
        )
}

/// True when the status carries any error detail
pub fn has_error(status: &Status) -> bool {
    matches!(
        status.kind,
        Some(StatusType::Error) | Some(StatusType::DestroyError)
    )
}

/// Time since the latest request for this status was issued
pub fn time_since_fetch_started(status: &Status, now: DateTime<Utc>) -> Option<TimeDelta> {
    status.requested_at.map(|at| now - at)
}

/// Time since the values were last confirmed by the remote
pub fn time_since_last_sync(status: &Status, now: DateTime<Utc>) -> Option<TimeDelta> {
    status.synced_at.map(|at| now - at)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_default_merge_keeps_previous_fields() {
        let previous = Status {
            synced_at: Some(at(10)),
            http_code: Some(200),
            ..Status::of(StatusType::Success)
        };

        let merged = merge_status(
            &previous,
            Status::requested(StatusType::Fetching, at(20)),
            &MergePolicy::default(),
        );

        assert_eq!(merged.kind, Some(StatusType::Fetching));
        assert_eq!(merged.synced_at, Some(at(10)));
        assert_eq!(merged.http_code, Some(200));
        assert_eq!(merged.requested_at, Some(at(20)));
    }

    #[test]
    fn test_only_persist_limits_carry_over() {
        let previous = Status {
            synced_at: Some(at(10)),
            http_code: Some(200),
            ..Status::of(StatusType::Success)
        };

        let incoming = Status {
            http_code: Some(500),
            error: Some(json!("boom")),
            ..Status::of(StatusType::Error)
        };

        let merged = merge_status(
            &previous,
            incoming,
            &MergePolicy::only_persist(&[StatusField::SyncedAt]),
        );

        assert_eq!(merged.kind, Some(StatusType::Error));
        assert_eq!(merged.synced_at, Some(at(10)));
        assert_eq!(merged.http_code, Some(500));
        assert_eq!(merged.error, Some(json!("boom")));
    }

    #[test]
    fn test_exclude_drops_fields_from_both_sides() {
        let previous = Status {
            items_in_last_response: Some(20),
            ..Status::of(StatusType::Fetching)
        };

        let merged = merge_status(
            &previous,
            Status::of(StatusType::Error),
            &MergePolicy::default().excluding(&[StatusField::ItemsInLastResponse]),
        );

        assert_eq!(merged.items_in_last_response, None);
    }

    #[test]
    fn test_dirty_travels_with_original_values() {
        let mut previous = Status::of(StatusType::Editing);
        previous.mark_dirty(&Values::new());

        let merged = merge_status(
            &previous,
            Status::of(StatusType::Updating),
            &MergePolicy::only_persist(&[StatusField::Dirty]),
        );

        assert!(!merged.dirty);
        assert!(merged.original_values.is_none());

        let merged = merge_status(
            &previous,
            Status::of(StatusType::Updating),
            &MergePolicy::only_persist(&[StatusField::Dirty, StatusField::OriginalValues]),
        );

        assert!(merged.dirty);
        assert!(merged.original_values.is_some());
    }

    #[test]
    fn test_mark_dirty_snapshots_once() {
        let mut status = Status::of(StatusType::Success);
        let first: Values = serde_json::from_value(json!({"name": "A"})).unwrap();
        let second: Values = serde_json::from_value(json!({"name": "B"})).unwrap();

        status.mark_dirty(&first);
        status.mark_dirty(&second);

        assert_eq!(status.original_values, Some(first));
    }

    #[test]
    fn test_predicates() {
        let synced = Status::synced(Some(200), at(5));
        assert!(is_synced_with_remote(&synced));
        assert!(can_fall_back_to_stale(&synced));
        assert!(!is_fetching(&synced));

        let failed = Status {
            synced_at: Some(at(5)),
            ..Status::of(StatusType::Error)
        };
        assert!(can_fall_back_to_stale(&failed));
        assert!(!is_synced_with_remote(&failed));
        assert!(has_error(&failed));

        let never_synced = Status::of(StatusType::Error);
        assert!(!can_fall_back_to_stale(&never_synced));
    }

    #[test]
    fn test_timing_helpers() {
        let status = Status {
            requested_at: Some(at(100)),
            synced_at: Some(at(40)),
            ..Status::of(StatusType::Fetching)
        };

        assert_eq!(
            time_since_fetch_started(&status, at(130)),
            Some(TimeDelta::seconds(30))
        );
        assert_eq!(
            time_since_last_sync(&status, at(130)),
            Some(TimeDelta::seconds(90))
        );
        assert_eq!(time_since_last_sync(&Status::default(), at(130)), None);
    }

    #[test]
    fn test_serializes_type_tag() {
        let yaml = serde_yaml::to_string(&Status::of(StatusType::DestroyError)).unwrap();
        assert!(yaml.contains("type: DESTROY_ERROR"));
    }
}
