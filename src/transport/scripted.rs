use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{Failure, Method, ProgressEvent, ProgressSink, Request, Response, Transport};

/// A canned reply served by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// Progress events emitted before the reply is delivered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<ProgressEvent>,
    #[serde(default)]
    pub delay_ms: u64,
}

impl ScriptedReply {
    pub fn ok(response: Response) -> Self {
        Self {
            response: Some(response),
            failure: None,
            progress: Vec::new(),
            delay_ms: 0,
        }
    }

    pub fn fail(failure: Failure) -> Self {
        Self {
            response: None,
            failure: Some(failure),
            progress: Vec::new(),
            delay_ms: 0,
        }
    }

    fn outcome(self) -> Result<Response, Failure> {
        match (self.failure, self.response) {
            (Some(failure), _) => Err(failure),
            (None, Some(response)) => Ok(response),
            (None, None) => Ok(Response::default()),
        }
    }
}

/// Transport that answers requests from prepared replies and records every
/// request it receives. Replies bound to a request target with
/// [`ScriptedTransport::expect`] are served to that target only, in order;
/// anything else takes the next unbound reply.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    expected: Mutex<BTreeMap<(Method, String), VecDeque<ScriptedReply>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, reply: ScriptedReply) {
        self.replies.lock().push_back(reply);
    }

    /// Bind `reply` to the next `method` request on `endpoint`
    pub fn expect(&self, method: Method, endpoint: impl Into<String>, reply: ScriptedReply) {
        self.expected
            .lock()
            .entry((method, endpoint.into()))
            .or_default()
            .push_back(reply);
    }

    /// Withdraw the most recently bound reply for a request target
    pub fn withdraw(&self, method: Method, endpoint: &str) -> Option<ScriptedReply> {
        let mut expected = self.expected.lock();
        let target = (method, endpoint.to_string());
        let queue = expected.get_mut(&target)?;
        let reply = queue.pop_back();
        if queue.is_empty() {
            expected.remove(&target);
        }
        reply
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn pending_replies(&self) -> usize {
        let bound: usize = self.expected.lock().values().map(VecDeque::len).sum();
        self.replies.lock().len() + bound
    }

    fn next_reply(&self, request: &Request) -> Option<ScriptedReply> {
        let mut expected = self.expected.lock();
        let target = (request.method, request.endpoint.clone());
        if let Some(queue) = expected.get_mut(&target) {
            let reply = queue.pop_front();
            if queue.is_empty() {
                expected.remove(&target);
            }
            return reply;
        }
        drop(expected);

        self.replies.lock().pop_front()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: Request, progress: ProgressSink) -> Result<Response, Failure> {
        tracing::debug!("Scripted {} {}", request.method, request.endpoint);
        self.requests.lock().push(request.clone());

        let Some(reply) = self.next_reply(&request) else {
            return Err(Failure::network(format!(
                "no scripted reply for {} {}",
                request.method, request.endpoint
            )));
        };

        for event in &reply.progress {
            progress.emit(event.clone());
        }

        if reply.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(reply.delay_ms)).await;
        }

        reply.outcome()
    }
}
