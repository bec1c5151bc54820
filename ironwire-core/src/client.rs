// ironwire-core/src/client.rs
// User-facing entry points: generic operation dispatch, raw-command cursors,
// index management helpers

use std::sync::Arc;

use serde_json::Value;

use crate::cursor::CommandCursor;
use crate::error::{DriverError, Result};
use crate::execution::ExecutionEngine;
use crate::index::IndexModel;
use crate::operation::{DescribedOperation, Namespace};
use crate::response::CommandResponse;
use crate::session::ClientSession;
use crate::timeout::TimeoutContext;
use crate::topology::ServerSelector;

/// Name the server interprets as "every index except `_id`".
const ALL_INDEXES: &str = "*";

/// Thin façade over the execution engine.
///
/// One client serves many concurrent logical calls; each call brings its own
/// [`TimeoutContext`] and, for cursor results, owns its cursor. Only the
/// topology collaborator behind the engine is shared.
pub struct Client {
    engine: Arc<ExecutionEngine>,
    retryable_writes: bool,
}

impl Client {
    pub fn new(selector: Arc<dyn ServerSelector>) -> Self {
        Client {
            engine: Arc::new(ExecutionEngine::new(selector)),
            retryable_writes: false,
        }
    }

    /// Declare that the deployment supports retryable writes. Sessions
    /// started afterwards inherit the capability.
    pub fn with_retryable_writes(mut self, supported: bool) -> Self {
        self.retryable_writes = supported;
        self
    }

    pub fn start_session(&self) -> ClientSession {
        ClientSession::new().with_retryable_writes(self.retryable_writes)
    }

    /// Generic entry point used by the command wrappers below; also the
    /// escape hatch for callers assembling their own described operations.
    pub async fn run_operation(
        &self,
        op: &mut DescribedOperation,
        session: Option<&ClientSession>,
        ctx: &mut TimeoutContext,
    ) -> Result<CommandResponse> {
        self.engine.run_operation(op, session, ctx).await
    }

    /// Run a caller-supplied command whose reply seeds a cursor.
    ///
    /// Nothing is sent until the cursor is first polled. The returned cursor
    /// is the raw-command variant: command-level settings stay in `body`,
    /// and it cannot be cloned.
    pub fn run_cursor_command(
        &self,
        db: impl Into<String>,
        body: Value,
        ctx: TimeoutContext,
        session: Option<ClientSession>,
    ) -> CommandCursor {
        let op = DescribedOperation::cursor_command(db, body);
        CommandCursor::new(self.engine.clone(), op, ctx, session)
    }

    /// Create the given indexes, returning their effective names
    /// (caller-specified or derived).
    pub async fn create_indexes(
        &self,
        ns: &Namespace,
        models: Vec<IndexModel>,
        commit_quorum: Option<Value>,
        session: Option<&ClientSession>,
        ctx: &mut TimeoutContext,
    ) -> Result<Vec<String>> {
        let names: Vec<String> = models.iter().map(IndexModel::name).collect();
        let mut op = DescribedOperation::create_indexes(ns.clone(), models, commit_quorum);
        self.engine.run_operation(&mut op, session, ctx).await?;
        Ok(names)
    }

    pub async fn create_index(
        &self,
        ns: &Namespace,
        model: IndexModel,
        session: Option<&ClientSession>,
        ctx: &mut TimeoutContext,
    ) -> Result<String> {
        let mut names = self
            .create_indexes(ns, vec![model], None, session, ctx)
            .await?;
        Ok(names.remove(0))
    }

    /// Drop one named index. Dropping everything goes through
    /// [`Client::drop_indexes`]; the wildcard is rejected here so the two
    /// cannot be confused.
    pub async fn drop_index(
        &self,
        ns: &Namespace,
        name: &str,
        session: Option<&ClientSession>,
        ctx: &mut TimeoutContext,
    ) -> Result<()> {
        if name.is_empty() || name == ALL_INDEXES {
            return Err(DriverError::InvalidArgument(
                "drop_index requires a single index name; use drop_indexes to drop all"
                    .to_string(),
            ));
        }
        let mut op = DescribedOperation::drop_indexes(ns.clone(), name);
        self.engine.run_operation(&mut op, session, ctx).await?;
        Ok(())
    }

    /// Drop every index on the collection except `_id`.
    pub async fn drop_indexes(
        &self,
        ns: &Namespace,
        session: Option<&ClientSession>,
        ctx: &mut TimeoutContext,
    ) -> Result<()> {
        let mut op = DescribedOperation::drop_indexes(ns.clone(), ALL_INDEXES);
        self.engine.run_operation(&mut op, session, ctx).await?;
        Ok(())
    }

    /// Iterate the collection's index descriptions. Lazy: the `listIndexes`
    /// command runs on first poll.
    pub fn list_indexes(
        &self,
        ns: &Namespace,
        batch_size: Option<u32>,
        ctx: TimeoutContext,
        session: Option<ClientSession>,
    ) -> CommandCursor {
        let op = DescribedOperation::list_indexes(ns.clone(), batch_size);
        CommandCursor::new(self.engine.clone(), op, ctx, session)
    }
}
