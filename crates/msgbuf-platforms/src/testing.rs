//! Test support: a scripted in-memory bot capability.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use msgbuf_core::{ApiError, ApiResult, Bot, Outgoing, Session};

/// One recorded interaction with the mock bot.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Send(Outgoing),
    Api { action: String, params: Value },
}

/// In-memory bot: records every call, optionally fails leading sends, and
/// answers `call_api` from a scripted action → result map.
pub(crate) struct MockBot {
    adapter: &'static str,
    calls: Mutex<Vec<Call>>,
    fail_sends: AtomicUsize,
    api_results: HashMap<&'static str, Value>,
}

impl MockBot {
    pub(crate) fn new(adapter: &'static str) -> Self {
        Self {
            adapter,
            calls: Mutex::new(Vec::new()),
            fail_sends: AtomicUsize::new(0),
            api_results: HashMap::new(),
        }
    }

    pub(crate) fn shared(adapter: &'static str) -> Arc<Self> {
        Arc::new(Self::new(adapter))
    }

    /// Scripts the result of an API action.
    pub(crate) fn with_api_result(mut self, action: &'static str, result: Value) -> Self {
        self.api_results.insert(action, result);
        self
    }

    /// Makes the next `n` `send` calls fail with an action failure.
    pub(crate) fn fail_next_sends(&self, n: usize) {
        self.fail_sends.store(n, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// The payloads of every recorded `send`, in order.
    pub(crate) fn sends(&self) -> Vec<Outgoing> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send(message) => Some(message),
                Call::Api { .. } => None,
            })
            .collect()
    }

    /// The `(action, params)` of every recorded API call, in order.
    pub(crate) fn api_calls(&self) -> Vec<(String, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Api { action, params } => Some((action, params)),
                Call::Send(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> &str {
        "mock"
    }

    fn adapter_name(&self) -> &str {
        self.adapter
    }

    async fn call_api(&self, action: &str, params: Value) -> ApiResult<Value> {
        self.calls.lock().unwrap().push(Call::Api {
            action: action.to_string(),
            params,
        });
        Ok(self.api_results.get(action).cloned().unwrap_or(json!({})))
    }

    async fn send(&self, _session: &Session, message: Outgoing) -> ApiResult<Value> {
        if self
            .fail_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ApiError::action_failed(100, "scripted failure"));
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::Send(message));
        Ok(json!({ "message_id": calls.len() }))
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
