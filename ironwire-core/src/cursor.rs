// ironwire-core/src/cursor.rs
// Lazy batch-fetching cursor over a server-side result set

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DriverError, Result};
use crate::execution::ExecutionEngine;
use crate::operation::{DescribedOperation, Namespace, OperationKind};
use crate::session::ClientSession;
use crate::timeout::TimeoutContext;
use crate::topology::ServerHandle;

/// Cursor lifecycle. `Closed` is terminal and reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created, nothing sent yet; configuration is still allowed.
    Uninitialized,
    /// Initial command in flight.
    Initializing,
    /// Server holds an open cursor; more batches may follow.
    Open,
    /// Server reported no further results. Residual documents may still sit
    /// in the buffer, but no further fetch will occur.
    Exhausted,
    Closed,
}

/// Client-side iterator over a potentially unbounded server-side result set.
///
/// The cursor-creating operation runs lazily on the first `next()`. Once the
/// server binding is captured it is immutable for the cursor's lifetime: no
/// failover mid-cursor, every `getMore` hits the same node.
pub struct CommandCursor {
    engine: Arc<ExecutionEngine>,
    /// The cursor-creating operation, consumed by initialization.
    op: Option<DescribedOperation>,
    state: CursorState,
    id: i64,
    namespace: Option<Namespace>,
    buffer: VecDeque<Value>,
    server: Option<Arc<dyn ServerHandle>>,
    session: Option<ClientSession>,
    ctx: TimeoutContext,
    batch_size: Option<u32>,
    comment: Option<Value>,
    max_await_time: Option<Duration>,
    /// Caller supplied the raw command body; command-level settings have a
    /// single source of truth there, and re-running it is not assumed safe.
    raw_command: bool,
}

impl std::fmt::Debug for CommandCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandCursor")
            .field("state", &self.state)
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("buffered", &self.buffer.len())
            .field("batch_size", &self.batch_size)
            .field("comment", &self.comment)
            .field("max_await_time", &self.max_await_time)
            .field("raw_command", &self.raw_command)
            .finish_non_exhaustive()
    }
}

impl CommandCursor {
    pub(crate) fn new(
        engine: Arc<ExecutionEngine>,
        op: DescribedOperation,
        ctx: TimeoutContext,
        session: Option<ClientSession>,
    ) -> Self {
        let raw_command = matches!(op.kind(), OperationKind::RunCommand { .. });
        CommandCursor {
            engine,
            op: Some(op),
            state: CursorState::Uninitialized,
            id: 0,
            namespace: None,
            buffer: VecDeque::new(),
            server: None,
            session,
            ctx,
            batch_size: None,
            comment: None,
            max_await_time: None,
            raw_command,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Server-assigned cursor id; `0` before initialization and after
    /// exhaustion.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// Whether iteration may still produce items.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
            || matches!(self.state, CursorState::Uninitialized | CursorState::Open)
    }

    /// Produce the next document, fetching batches as needed.
    ///
    /// Returns `Ok(None)` at end of stream. Documents already delivered are
    /// final; an error on a later fetch does not retract them.
    pub async fn next(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(doc) = self.buffer.pop_front() {
                return Ok(Some(doc));
            }
            match self.state {
                CursorState::Uninitialized => self.initialize().await?,
                CursorState::Open => self.fetch_more().await?,
                CursorState::Exhausted | CursorState::Closed => return Ok(None),
                CursorState::Initializing => {
                    return Err(DriverError::Internal(
                        "cursor polled while initializing".to_string(),
                    ));
                }
            }
        }
    }

    /// Batch size for subsequent fetches. Only valid before the first fetch.
    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<()> {
        self.ensure_uninitialized("batchSize")?;
        self.batch_size = Some(batch_size);
        Ok(())
    }

    /// Free-form comment attached to every `getMore`.
    pub fn set_comment(&mut self, comment: Value) -> Result<()> {
        self.ensure_uninitialized("comment")?;
        self.comment = Some(comment);
        Ok(())
    }

    /// Maximum server-side wait per continuation, for tailable cursors
    /// awaiting new data.
    pub fn set_max_await_time(&mut self, max_await_time: Duration) -> Result<()> {
        self.ensure_uninitialized("maxAwaitTimeMS")?;
        self.max_await_time = Some(max_await_time);
        Ok(())
    }

    pub fn set_read_concern(&mut self, _read_concern: Value) -> Result<()> {
        self.reject_command_level("readConcern")
    }

    pub fn set_cursor_flags(&mut self, _flags: &[&str]) -> Result<()> {
        self.reject_command_level("cursor flags")
    }

    pub fn set_max_time_ms(&mut self, _max_time_ms: u64) -> Result<()> {
        self.reject_command_level("maxTimeMS")
    }

    /// Build an independent cursor over the same operation, with its own
    /// time budget.
    ///
    /// Rejected for raw-command cursors (re-running an arbitrary command may
    /// not be idempotent) and for anything already initialized (server-side
    /// cursor identity is single-use).
    pub fn try_clone(&self, ctx: TimeoutContext) -> Result<CommandCursor> {
        if self.raw_command {
            return Err(DriverError::UnsupportedCursorOperation(
                "a cursor over a caller-supplied command cannot be cloned; \
                 construct a new cursor instead"
                    .to_string(),
            ));
        }
        if self.state != CursorState::Uninitialized {
            return Err(DriverError::UnsupportedCursorOperation(
                "only an unused cursor can be cloned".to_string(),
            ));
        }
        let op = self.op.clone().ok_or_else(|| {
            DriverError::Internal("uninitialized cursor lost its operation".to_string())
        })?;
        let mut clone = CommandCursor::new(self.engine.clone(), op, ctx, self.session.clone());
        clone.batch_size = self.batch_size;
        clone.comment = self.comment.clone();
        clone.max_await_time = self.max_await_time;
        Ok(clone)
    }

    /// Close the cursor, notifying the server if it still holds state.
    ///
    /// Cleanup is best effort: send failures are logged and swallowed, never
    /// surfaced. Re-entrant close is a no-op.
    pub async fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.state = CursorState::Closed;
        self.buffer.clear();
        let id = self.id;
        self.id = 0;
        if id != 0 {
            self.kill_server_cursor(id).await;
        }
    }

    async fn initialize(&mut self) -> Result<()> {
        self.state = CursorState::Initializing;
        let mut op = self.op.take().ok_or_else(|| {
            DriverError::Internal("cursor operation already consumed".to_string())
        })?;

        let spec = match self
            .engine
            .run_operation(&mut op, self.session.as_ref(), &mut self.ctx)
            .await
            .and_then(|response| response.cursor_spec())
        {
            Ok(spec) => spec,
            Err(err) => {
                // Nothing to kill: no server cursor was handed to us.
                self.state = CursorState::Closed;
                return Err(err);
            }
        };

        self.server = op.pinned_server();
        self.id = spec.id;
        self.namespace = Some(spec.namespace);
        self.buffer.extend(spec.batch);
        self.state = if spec.id == 0 {
            CursorState::Exhausted
        } else {
            CursorState::Open
        };
        debug!(
            cursor_id = self.id,
            buffered = self.buffer.len(),
            state = ?self.state,
            "cursor initialized"
        );
        Ok(())
    }

    async fn fetch_more(&mut self) -> Result<()> {
        let namespace = self.namespace.clone().ok_or_else(|| {
            DriverError::Internal("open cursor is missing its namespace".to_string())
        })?;
        let server = self.server.clone().ok_or_else(|| {
            DriverError::Internal("open cursor is missing its server binding".to_string())
        })?;

        // Tailable await-data cursors get a fresh per-iteration deadline;
        // cursor-lifetime deadlines keep counting down.
        self.ctx.refresh_for_get_more();

        let mut op = DescribedOperation::get_more(
            namespace,
            self.id,
            server,
            self.batch_size,
            self.comment.clone(),
            self.max_await_time,
        );

        let spec = match self
            .engine
            .run_operation(&mut op, self.session.as_ref(), &mut self.ctx)
            .await
            .and_then(|response| response.cursor_spec())
        {
            Ok(spec) => spec,
            Err(err) => {
                let id = self.id;
                self.state = CursorState::Closed;
                self.id = 0;
                if id != 0 {
                    self.kill_server_cursor(id).await;
                }
                return Err(err);
            }
        };

        self.id = spec.id;
        self.buffer.extend(spec.batch);
        if spec.id == 0 {
            self.state = CursorState::Exhausted;
        }
        debug!(
            cursor_id = self.id,
            buffered = self.buffer.len(),
            "getMore batch appended"
        );
        Ok(())
    }

    async fn kill_server_cursor(&self, id: i64) {
        let (Some(namespace), Some(server)) = (self.namespace.as_ref(), self.server.as_ref())
        else {
            return;
        };
        let mut op = DescribedOperation::kill_cursors(namespace.clone(), vec![id], server.clone());
        // Cleanup runs on its own unlimited budget: an exhausted caller
        // deadline must not block the notification.
        let mut ctx = TimeoutContext::unlimited();
        if let Err(err) = self
            .engine
            .run_operation(&mut op, self.session.as_ref(), &mut ctx)
            .await
        {
            warn!(cursor_id = id, error = %err, "best-effort killCursors failed");
        }
    }

    fn ensure_uninitialized(&self, what: &str) -> Result<()> {
        if self.state != CursorState::Uninitialized {
            return Err(DriverError::UnsupportedCursorOperation(format!(
                "{what} can only be set before the first fetch"
            )));
        }
        Ok(())
    }

    fn reject_command_level(&self, what: &str) -> Result<()> {
        if self.raw_command {
            Err(DriverError::UnsupportedCursorOperation(format!(
                "{what} must be supplied in the command document itself"
            )))
        } else {
            Err(DriverError::UnsupportedCursorOperation(format!(
                "{what} is not supported on this cursor"
            )))
        }
    }
}

impl Drop for CommandCursor {
    fn drop(&mut self) {
        // Drop cannot await the kill notification; the server reclaims the
        // cursor via its idle timeout. Explicit close() is the clean path.
        if self.state != CursorState::Closed && self.id != 0 {
            warn!(
                cursor_id = self.id,
                "cursor dropped while open; relying on server-side idle expiry"
            );
        }
    }
}
