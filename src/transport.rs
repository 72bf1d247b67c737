//! Boundary to the component that performs the actual remote call.
//!
//! The engine never performs I/O itself. A [`Transport`] receives a fully
//! resolved request and eventually reports a [`Response`] or a [`Failure`],
//! optionally emitting [`ProgressEvent`]s along the way.

mod scripted;

use std::{fmt, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    state::{Metadata, Values},
    status::{Status, StatusType},
};

pub use scripted::{ScriptedReply, ScriptedTransport};

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Upload or download progress reported by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub direction: Direction,
    pub loaded: u64,
    pub total: u64,
    pub length_computable: bool,
}

/// A fully resolved request handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub resource: String,
    pub method: Method,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Reply received with a sub-error HTTP status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "default_http_code")]
    pub http_code: u16,
    /// An object for single entities, an array of objects for lists
    #[serde(default)]
    pub values: Value,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

fn default_http_code() -> u16 {
    200
}

/// Origin of a failure, from request construction to the remote's own report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request could not be built locally
    Client,
    /// No response was received
    Network,
    /// The remote answered with an error status
    Http,
    /// The remote answered with a success status and an error in the body
    Application,
}

/// Error envelope of a request that did not succeed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    #[serde(default)]
    pub http_code: Option<u16>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Failure {
    pub fn client(message: impl fmt::Display) -> Self {
        Self::with_message(FailureKind::Client, None, message)
    }

    pub fn network(message: impl fmt::Display) -> Self {
        Self::with_message(FailureKind::Network, None, message)
    }

    pub fn http(http_code: u16, error: Option<Value>, errors: Vec<Value>) -> Self {
        Self {
            kind: FailureKind::Http,
            http_code: Some(http_code),
            error,
            errors,
            metadata: Metadata::new(),
        }
    }

    fn with_message(kind: FailureKind, http_code: Option<u16>, message: impl fmt::Display) -> Self {
        Self {
            kind,
            http_code,
            error: Some(Value::String(message.to_string())),
            errors: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Normalize into an error status. The canonical `error` falls back to
    /// the first entry of `errors`.
    pub fn to_status(&self, kind: StatusType, at: DateTime<Utc>) -> Status {
        Status {
            kind: Some(kind),
            http_code: self.http_code,
            error: self.error.clone().or_else(|| self.errors.first().cloned()),
            errors: self.errors.clone(),
            error_occurred_at: Some(at),
            ..Status::default()
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} failure", self.kind)?;
        if let Some(code) = self.http_code {
            write!(f, " ({})", code)?;
        }
        if let Some(error) = self.error.as_ref().or(self.errors.first()) {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

impl Response {
    pub fn new(values: Value) -> Self {
        Self {
            http_code: default_http_code(),
            values,
            ..Self::default()
        }
    }

    /// Treat an error reported inside a success body like an error status
    pub fn into_result(self) -> Result<Response, Failure> {
        if self.error.is_some() || !self.errors.is_empty() {
            return Err(Failure {
                kind: FailureKind::Application,
                http_code: Some(self.http_code),
                error: self.error,
                errors: self.errors,
                metadata: self.metadata,
            });
        }
        Ok(self)
    }

    /// Payload as a single entity's values
    pub fn item_values(&self) -> Values {
        match &self.values {
            Value::Object(map) => map.clone(),
            _ => Values::new(),
        }
    }

    /// Payload as a sequence of entity values; non-object entries are skipped
    pub fn list_values(&self) -> Vec<Values> {
        match &self.values {
            Value::Array(entries) => entries
                .iter()
                .filter_map(|entry| entry.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Callback used by a transport to report progress while a request runs
#[derive(Clone)]
pub struct ProgressSink(Arc<dyn Fn(ProgressEvent) + Send + Sync>);

impl ProgressSink {
    pub fn new(report: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(report))
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// Performs remote calls on behalf of the engine
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: Request,
        progress: ProgressSink,
    ) -> impl Future<Output = Result<Response, Failure>> + Send;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_errors_fill_canonical_error() {
        let at = Utc.timestamp_opt(1, 0).unwrap();
        let failure = Failure::http(422, None, vec![json!("name taken"), json!("too short")]);

        let status = failure.to_status(StatusType::Error, at);
        assert_eq!(status.error, Some(json!("name taken")));
        assert_eq!(status.errors.len(), 2);
        assert_eq!(status.http_code, Some(422));
        assert_eq!(status.error_occurred_at, Some(at));
    }

    #[test]
    fn test_legacy_error_field_wins() {
        let at = Utc.timestamp_opt(1, 0).unwrap();
        let failure = Failure::http(500, Some(json!("legacy")), vec![json!("plural")]);

        let status = failure.to_status(StatusType::DestroyError, at);
        assert_eq!(status.kind, Some(StatusType::DestroyError));
        assert_eq!(status.error, Some(json!("legacy")));
    }

    #[test]
    fn test_application_error_in_success_body() {
        let response = Response {
            errors: vec![json!({"code": "quota"})],
            ..Response::new(json!({"id": 1}))
        };

        let failure = response.into_result().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Application);
        assert_eq!(failure.http_code, Some(200));
    }

    #[test]
    fn test_list_values_skip_non_objects() {
        let response = Response::new(json!([{"id": 1}, 3, {"id": 2}]));
        assert_eq!(response.list_values().len(), 2);
        assert!(response.item_values().is_empty());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(serde_yaml::to_string(&Method::Delete).unwrap().trim(), "DELETE");
    }
}
