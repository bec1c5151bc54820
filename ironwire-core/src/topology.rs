// ironwire-core/src/topology.rs
// Consumed collaborator interfaces: server handles and server selection
//
// The execution core never opens sockets itself. Topology monitoring,
// connection pooling, and wire encoding live behind these traits, which
// also makes the whole engine testable against in-memory doubles (same
// approach as an in-memory storage backend behind a narrow trait).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::session::ClientSession;
use crate::timeout::TimeoutContext;

/// How a server should be picked for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// Selection intent handed to the topology collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCriteria {
    /// Read operations carry an explicit preference.
    Read(ReadPreference),
    /// Write operations always go to a primary.
    Write,
}

/// One selected server: "execute a command, get a reply".
///
/// Implementations own connection checkout and wire encoding. The reply is
/// the raw response document; command-level error classification is the
/// caller's job.
#[async_trait]
pub trait ServerHandle: Send + Sync {
    /// Run one command round trip against this server.
    async fn run_command(
        &self,
        command: &Value,
        session: Option<&ClientSession>,
        timeout: &TimeoutContext,
    ) -> Result<Value>;

    /// Highest wire protocol version this server speaks. Used for feature
    /// gating before any network attempt.
    fn max_wire_version(&self) -> i32;

    /// Host:port string, for logging and error messages.
    fn address(&self) -> &str;
}

/// Topology-side server selection.
///
/// Fails with [`crate::DriverError::NoServerAvailable`] when nothing matches
/// within the selector's own short timeout. When the engine retries, it
/// selects again through this trait; picking a different server where
/// possible is the selector's concern.
#[async_trait]
pub trait ServerSelector: Send + Sync {
    async fn select(&self, criteria: &SelectionCriteria) -> Result<Arc<dyn ServerHandle>>;
}
