//! In-process [`DataSource`] serving canned responses for tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crash_stats_dashboard_models::FilterSet;
use tokio::sync::Notify;

use crate::fetch::{DataSource, FetchError, parse_body};

/// A canned response.
#[derive(Clone)]
struct Reply {
    status: u16,
    body: String,
    gate: Option<Arc<Notify>>,
}

/// Serves queued replies per endpoint. The last reply for an endpoint is
/// repeated once the queue is down to one entry. Unknown endpoints answer
/// HTTP 404.
#[derive(Default)]
pub struct StaticSource {
    replies: Mutex<BTreeMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<(String, FilterSet)>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, endpoint: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(endpoint.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn json(self, endpoint: &str, value: serde_json::Value) -> Self {
        self.body(endpoint, 200, &value.to_string())
    }

    pub fn status(self, endpoint: &str, status: u16) -> Self {
        self.body(endpoint, status, "")
    }

    pub fn body(self, endpoint: &str, status: u16, body: &str) -> Self {
        self.push(
            endpoint,
            Reply {
                status,
                body: body.to_string(),
                gate: None,
            },
        )
    }

    /// Queues a JSON reply that is held back until `gate` is notified.
    pub fn gated_json(self, endpoint: &str, value: serde_json::Value, gate: Arc<Notify>) -> Self {
        self.push(
            endpoint,
            Reply {
                status: 200,
                body: value.to_string(),
                gate: Some(gate),
            },
        )
    }

    /// Returns every request issued so far, in order.
    pub fn requests(&self) -> Vec<(String, FilterSet)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the requests issued to `endpoint`.
    pub fn requests_to(&self, endpoint: &str) -> Vec<FilterSet> {
        self.requests()
            .into_iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, filters)| filters)
            .collect()
    }

    fn next_reply(&self, endpoint: &str) -> Option<Reply> {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = replies.get_mut(endpoint)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait::async_trait]
impl DataSource for StaticSource {
    async fn fetch_json(
        &self,
        endpoint: &str,
        filters: &FilterSet,
    ) -> Result<serde_json::Value, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint.to_string(), filters.clone()));

        let Some(reply) = self.next_reply(endpoint) else {
            return parse_body(endpoint, 404, "");
        };
        if let Some(gate) = &reply.gate {
            gate.notified().await;
        }
        parse_body(endpoint, reply.status, &reply.body)
    }
}
