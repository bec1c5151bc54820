// ironwire-core/src/operation.rs
// Described operations: aspect flags, command assembly, execution

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DriverError, Result};
use crate::index::{IndexModel, MIN_COMMIT_QUORUM_WIRE_VERSION};
use crate::response::CommandResponse;
use crate::session::ClientSession;
use crate::timeout::TimeoutContext;
use crate::topology::{ReadPreference, SelectionCriteria, ServerHandle};

/// Capability flags attached to an operation.
///
/// The execution engine branches on flag membership, never on the operation
/// variant itself, so adding an operation means declaring its flags and its
/// command body and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aspects(u8);

impl Aspects {
    pub const NONE: Aspects = Aspects(0);
    pub const READ: Aspects = Aspects(1);
    pub const WRITE: Aspects = Aspects(1 << 1);
    pub const RETRYABLE: Aspects = Aspects(1 << 2);
    pub const CURSOR_CREATING: Aspects = Aspects(1 << 3);
    pub const MUST_USE_SAME_SERVER: Aspects = Aspects(1 << 4);
    pub const SKIP_COLLATION: Aspects = Aspects(1 << 5);

    pub fn contains(&self, other: Aspects) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Aspects {
    type Output = Aspects;

    fn bitor(self, rhs: Aspects) -> Aspects {
        Aspects(self.0 | rhs.0)
    }
}

/// Fully qualified collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Namespace {
            db: db.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// The operation variants the core knows how to express on the wire.
#[derive(Debug, Clone)]
pub enum OperationKind {
    /// Caller-supplied raw command body, run against `db`.
    RunCommand { db: String, body: Value },
    CreateIndexes {
        ns: Namespace,
        models: Vec<IndexModel>,
        commit_quorum: Option<Value>,
    },
    DropIndexes { ns: Namespace, name: String },
    ListIndexes {
        ns: Namespace,
        batch_size: Option<u32>,
    },
    GetMore {
        ns: Namespace,
        cursor_id: i64,
        batch_size: Option<u32>,
        comment: Option<Value>,
        max_await_time: Option<Duration>,
    },
    KillCursors { ns: Namespace, cursor_ids: Vec<i64> },
}

/// A value object describing one logical command: what to send, how it may
/// be retried, and (after selection) which server it is bound to.
///
/// The server binding outlives a cursor-creating operation: the resulting
/// cursor captures it so every `getMore` targets the same node.
#[derive(Clone)]
pub struct DescribedOperation {
    kind: OperationKind,
    aspects: Aspects,
    read_preference: ReadPreference,
    server: Option<Arc<dyn ServerHandle>>,
}

impl fmt::Debug for DescribedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescribedOperation")
            .field("kind", &self.kind)
            .field("aspects", &self.aspects)
            .field("server", &self.server.as_ref().map(|s| s.address().to_string()))
            .finish()
    }
}

impl DescribedOperation {
    fn new(kind: OperationKind, aspects: Aspects) -> Self {
        DescribedOperation {
            kind,
            aspects,
            read_preference: ReadPreference::Primary,
            server: None,
        }
    }

    /// Raw command, treated as a read. Not retryable: an arbitrary command
    /// body may not be idempotent.
    pub fn run_command(db: impl Into<String>, body: Value) -> Self {
        Self::new(
            OperationKind::RunCommand {
                db: db.into(),
                body,
            },
            Aspects::READ,
        )
    }

    /// Raw command whose reply seeds a cursor.
    pub fn cursor_command(db: impl Into<String>, body: Value) -> Self {
        Self::new(
            OperationKind::RunCommand {
                db: db.into(),
                body,
            },
            Aspects::READ | Aspects::CURSOR_CREATING,
        )
    }

    /// Raw command treated as a write (primary selection, retryable-write
    /// gating when marked retryable).
    pub fn write_command(db: impl Into<String>, body: Value) -> Self {
        Self::new(
            OperationKind::RunCommand {
                db: db.into(),
                body,
            },
            Aspects::WRITE,
        )
    }

    pub fn create_indexes(
        ns: Namespace,
        models: Vec<IndexModel>,
        commit_quorum: Option<Value>,
    ) -> Self {
        Self::new(
            OperationKind::CreateIndexes {
                ns,
                models,
                commit_quorum,
            },
            Aspects::WRITE | Aspects::SKIP_COLLATION,
        )
    }

    pub fn drop_indexes(ns: Namespace, name: impl Into<String>) -> Self {
        Self::new(
            OperationKind::DropIndexes {
                ns,
                name: name.into(),
            },
            Aspects::WRITE | Aspects::SKIP_COLLATION,
        )
    }

    pub fn list_indexes(ns: Namespace, batch_size: Option<u32>) -> Self {
        Self::new(
            OperationKind::ListIndexes { ns, batch_size },
            Aspects::READ | Aspects::RETRYABLE | Aspects::CURSOR_CREATING,
        )
    }

    /// Cursor continuation. Bound to the cursor's server at construction:
    /// server-side cursor state lives on one node only.
    pub fn get_more(
        ns: Namespace,
        cursor_id: i64,
        server: Arc<dyn ServerHandle>,
        batch_size: Option<u32>,
        comment: Option<Value>,
        max_await_time: Option<Duration>,
    ) -> Self {
        let mut op = Self::new(
            OperationKind::GetMore {
                ns,
                cursor_id,
                batch_size,
                comment,
                max_await_time,
            },
            Aspects::READ | Aspects::MUST_USE_SAME_SERVER,
        );
        op.server = Some(server);
        op
    }

    /// Best-effort cursor cleanup notification, bound to the cursor's server.
    pub fn kill_cursors(ns: Namespace, cursor_ids: Vec<i64>, server: Arc<dyn ServerHandle>) -> Self {
        let mut op = Self::new(
            OperationKind::KillCursors { ns, cursor_ids },
            Aspects::MUST_USE_SAME_SERVER,
        );
        op.server = Some(server);
        op
    }

    /// Opt a raw command into the one-retry policy. The caller asserts the
    /// body is idempotent.
    pub fn retryable(mut self) -> Self {
        self.aspects = self.aspects | Aspects::RETRYABLE;
        self
    }

    pub fn with_read_preference(mut self, preference: ReadPreference) -> Self {
        self.read_preference = preference;
        self
    }

    pub fn aspects(&self) -> Aspects {
        self.aspects
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    /// Server bound by a previous selection, if any.
    pub fn pinned_server(&self) -> Option<Arc<dyn ServerHandle>> {
        self.server.clone()
    }

    pub(crate) fn bind_server(&mut self, server: Arc<dyn ServerHandle>) {
        self.server = Some(server);
    }

    pub(crate) fn clear_server(&mut self) {
        self.server = None;
    }

    pub fn selection_criteria(&self) -> SelectionCriteria {
        if self.aspects.contains(Aspects::WRITE) {
            SelectionCriteria::Write
        } else {
            SelectionCriteria::Read(self.read_preference)
        }
    }

    /// Wire name of the command this operation produces.
    pub fn command_name(&self) -> &str {
        match &self.kind {
            OperationKind::RunCommand { body, .. } => body
                .as_object()
                .and_then(|map| map.keys().next())
                .map_or("runCommand", String::as_str),
            OperationKind::CreateIndexes { .. } => "createIndexes",
            OperationKind::DropIndexes { .. } => "dropIndexes",
            OperationKind::ListIndexes { .. } => "listIndexes",
            OperationKind::GetMore { .. } => "getMore",
            OperationKind::KillCursors { .. } => "killCursors",
        }
    }

    /// Assemble the command document.
    ///
    /// Performs input validation and server-version gating, so a request the
    /// selected server cannot honor fails here, before any network traffic.
    /// Field names and their order are part of the wire contract.
    pub fn build_command(
        &self,
        max_wire_version: i32,
        max_time_ms: Option<u64>,
    ) -> Result<Value> {
        let mut doc = Map::new();
        match &self.kind {
            OperationKind::RunCommand { db, body } => {
                let Some(body) = body.as_object() else {
                    return Err(DriverError::InvalidArgument(
                        "raw command body must be an object".to_string(),
                    ));
                };
                if body.is_empty() {
                    return Err(DriverError::InvalidArgument(
                        "raw command body must not be empty".to_string(),
                    ));
                }
                doc.extend(body.clone());
                if let Some(ms) = max_time_ms {
                    // A maxTimeMS embedded in the caller's body is authoritative.
                    doc.entry("maxTimeMS".to_string()).or_insert(Value::from(ms));
                }
                doc.insert("$db".to_string(), Value::from(db.clone()));
            }
            OperationKind::CreateIndexes {
                ns,
                models,
                commit_quorum,
            } => {
                if models.is_empty() {
                    return Err(DriverError::InvalidArgument(
                        "createIndexes requires at least one index model".to_string(),
                    ));
                }
                if commit_quorum.is_some() && max_wire_version < MIN_COMMIT_QUORUM_WIRE_VERSION {
                    return Err(DriverError::Compatibility(format!(
                        "commitQuorum requires wire version {MIN_COMMIT_QUORUM_WIRE_VERSION}, \
                         server speaks {max_wire_version}"
                    )));
                }
                doc.insert(
                    "createIndexes".to_string(),
                    Value::from(ns.collection.clone()),
                );
                doc.insert(
                    "indexes".to_string(),
                    Value::Array(models.iter().map(IndexModel::to_document).collect()),
                );
                if let Some(quorum) = commit_quorum {
                    doc.insert("commitQuorum".to_string(), quorum.clone());
                }
                if let Some(ms) = max_time_ms {
                    doc.insert("maxTimeMS".to_string(), Value::from(ms));
                }
                doc.insert("$db".to_string(), Value::from(ns.db.clone()));
            }
            OperationKind::DropIndexes { ns, name } => {
                if name.is_empty() {
                    return Err(DriverError::InvalidArgument(
                        "dropIndexes requires an index name".to_string(),
                    ));
                }
                doc.insert("dropIndexes".to_string(), Value::from(ns.collection.clone()));
                doc.insert("index".to_string(), Value::from(name.clone()));
                if let Some(ms) = max_time_ms {
                    doc.insert("maxTimeMS".to_string(), Value::from(ms));
                }
                doc.insert("$db".to_string(), Value::from(ns.db.clone()));
            }
            OperationKind::ListIndexes { ns, batch_size } => {
                doc.insert("listIndexes".to_string(), Value::from(ns.collection.clone()));
                let mut cursor = Map::new();
                if let Some(size) = batch_size {
                    cursor.insert("batchSize".to_string(), Value::from(*size));
                }
                doc.insert("cursor".to_string(), Value::Object(cursor));
                if let Some(ms) = max_time_ms {
                    doc.insert("maxTimeMS".to_string(), Value::from(ms));
                }
                doc.insert("$db".to_string(), Value::from(ns.db.clone()));
            }
            OperationKind::GetMore {
                ns,
                cursor_id,
                batch_size,
                comment,
                max_await_time,
            } => {
                doc.insert("getMore".to_string(), Value::from(*cursor_id));
                doc.insert("collection".to_string(), Value::from(ns.collection.clone()));
                if let Some(size) = batch_size {
                    doc.insert("batchSize".to_string(), Value::from(*size));
                }
                // Tailable await-data cursors bound the server-side wait with
                // maxTimeMS = maxAwaitTimeMS; the client deadline still governs
                // the overall call.
                if let Some(await_time) = max_await_time {
                    doc.insert(
                        "maxTimeMS".to_string(),
                        Value::from(await_time.as_millis() as u64),
                    );
                }
                if let Some(comment) = comment {
                    doc.insert("comment".to_string(), comment.clone());
                }
                doc.insert("$db".to_string(), Value::from(ns.db.clone()));
            }
            OperationKind::KillCursors { ns, cursor_ids } => {
                doc.insert("killCursors".to_string(), Value::from(ns.collection.clone()));
                doc.insert(
                    "cursors".to_string(),
                    Value::Array(cursor_ids.iter().map(|id| Value::from(*id)).collect()),
                );
                doc.insert("$db".to_string(), Value::from(ns.db.clone()));
            }
        }
        Ok(Value::Object(doc))
    }

    /// One round trip: derive the per-command budget, assemble the command,
    /// send it, classify the reply.
    pub async fn execute(
        &self,
        server: &Arc<dyn ServerHandle>,
        session: Option<&ClientSession>,
        ctx: &TimeoutContext,
    ) -> Result<CommandResponse> {
        let max_time_ms = ctx.max_time_ms_for_next_command()?;
        let command = self.build_command(server.max_wire_version(), max_time_ms)?;
        debug!(
            command = self.command_name(),
            server = server.address(),
            max_time_ms,
            "executing command"
        );
        let reply = server.run_command(&command, session, ctx).await?;
        CommandResponse::from_reply(reply)
    }
}
