//! Shared test doubles: a scripted in-memory server and selector.
//!
//! The mock server plays back a queue of scripted replies and records every
//! command document it receives, so tests can assert both wire shapes and
//! exact round-trip counts.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use ironwire_core::{
    ClientSession, DriverError, Result, SelectionCriteria, ServerHandle, ServerSelector,
    TimeoutContext,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Route driver tracing through the test harness; honors RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub enum ScriptedReply {
    Reply(Value),
    NetworkError { message: String, retryable: bool },
}

pub struct MockServer {
    address: String,
    wire_version: i32,
    script: Mutex<VecDeque<ScriptedReply>>,
    commands: Mutex<Vec<Value>>,
}

impl MockServer {
    pub fn new(address: &str) -> Arc<MockServer> {
        Self::with_wire_version(address, 9)
    }

    pub fn with_wire_version(address: &str, wire_version: i32) -> Arc<MockServer> {
        Arc::new(MockServer {
            address: address.to_string(),
            wire_version,
            script: Mutex::new(VecDeque::new()),
            commands: Mutex::new(Vec::new()),
        })
    }

    pub fn enqueue_reply(&self, reply: Value) {
        self.script.lock().push_back(ScriptedReply::Reply(reply));
    }

    pub fn enqueue_network_error(&self, message: &str, retryable: bool) {
        self.script.lock().push_back(ScriptedReply::NetworkError {
            message: message.to_string(),
            retryable,
        });
    }

    /// Every command document received, in order.
    pub fn commands(&self) -> Vec<Value> {
        self.commands.lock().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().len()
    }
}

#[async_trait]
impl ServerHandle for MockServer {
    async fn run_command(
        &self,
        command: &Value,
        _session: Option<&ClientSession>,
        _timeout: &TimeoutContext,
    ) -> Result<Value> {
        self.commands.lock().push(command.clone());
        match self.script.lock().pop_front() {
            // An empty script answers everything with a plain success.
            None => Ok(json!({"ok": 1})),
            Some(ScriptedReply::Reply(reply)) => Ok(reply),
            Some(ScriptedReply::NetworkError { message, retryable }) => {
                Err(DriverError::Network {
                    address: self.address.clone(),
                    message,
                    retryable,
                })
            }
        }
    }

    fn max_wire_version(&self) -> i32 {
        self.wire_version
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// Rotates through its servers on each selection; can be scripted to fail.
pub struct MockSelector {
    servers: Vec<Arc<MockServer>>,
    selections: Mutex<usize>,
    failures: Mutex<VecDeque<String>>,
}

impl MockSelector {
    pub fn single(server: Arc<MockServer>) -> Arc<MockSelector> {
        Self::rotating(vec![server])
    }

    pub fn rotating(servers: Vec<Arc<MockServer>>) -> Arc<MockSelector> {
        Arc::new(MockSelector {
            servers,
            selections: Mutex::new(0),
            failures: Mutex::new(VecDeque::new()),
        })
    }

    /// The next selection attempt fails with NoServerAvailable.
    pub fn enqueue_selection_failure(&self, message: &str) {
        self.failures.lock().push_back(message.to_string());
    }

    pub fn selection_count(&self) -> usize {
        *self.selections.lock()
    }
}

#[async_trait]
impl ServerSelector for MockSelector {
    async fn select(&self, _criteria: &SelectionCriteria) -> Result<Arc<dyn ServerHandle>> {
        let mut selections = self.selections.lock();
        *selections += 1;
        if let Some(message) = self.failures.lock().pop_front() {
            return Err(DriverError::NoServerAvailable(message));
        }
        let server = self.servers[(*selections - 1) % self.servers.len()].clone();
        Ok(server)
    }
}

/// A cursor reply in the shape servers produce for cursor-creating commands.
pub fn cursor_reply(id: i64, ns: &str, batch_field: &str, docs: Vec<Value>) -> Value {
    let mut cursor = serde_json::Map::new();
    cursor.insert("id".to_string(), json!(id));
    cursor.insert("ns".to_string(), json!(ns));
    cursor.insert(batch_field.to_string(), Value::Array(docs));
    json!({"ok": 1, "cursor": cursor})
}
