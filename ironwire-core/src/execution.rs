// ironwire-core/src/execution.rs
// Operation execution: selection, timeout enforcement, one-retry policy

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DriverError, Result};
use crate::operation::{Aspects, DescribedOperation};
use crate::response::CommandResponse;
use crate::session::ClientSession;
use crate::timeout::TimeoutContext;
use crate::topology::{ServerHandle, ServerSelector};

/// Generic dispatch of a described operation against a selected server.
///
/// The load-bearing rule: exactly one retry per logical call, only after a
/// first-attempt failure classified as retryable, only for operations
/// carrying the RETRYABLE aspect. A second failure is always surfaced. This
/// bounds worst-case latency to two attempts and never compounds retries
/// across a degraded deployment. Selection failures fall under the same
/// single-retry budget as execution failures.
pub struct ExecutionEngine {
    selector: Arc<dyn ServerSelector>,
}

impl ExecutionEngine {
    pub fn new(selector: Arc<dyn ServerSelector>) -> Self {
        ExecutionEngine { selector }
    }

    /// Run one logical operation to completion.
    ///
    /// The timeout context is shared by both attempts: the retry observes
    /// whatever budget the first attempt left behind.
    pub async fn run_operation(
        &self,
        op: &mut DescribedOperation,
        session: Option<&ClientSession>,
        ctx: &mut TimeoutContext,
    ) -> Result<CommandResponse> {
        let mut retried = false;
        loop {
            match self.attempt(op, session, ctx).await {
                Ok(response) => return Ok(response),
                Err(err) if retried => return Err(err),
                Err(err) => {
                    if err.is_timeout() || !self.can_retry(op, session, &err) {
                        return Err(err);
                    }
                    warn!(
                        command = op.command_name(),
                        error = %err,
                        "transient failure, retrying once"
                    );
                    // Force a fresh selection; picking a different server
                    // where possible is the selector's concern.
                    op.clear_server();
                    retried = true;
                }
            }
        }
    }

    async fn attempt(
        &self,
        op: &mut DescribedOperation,
        session: Option<&ClientSession>,
        ctx: &TimeoutContext,
    ) -> Result<CommandResponse> {
        let server = match op.pinned_server() {
            Some(server) => server,
            None => self.select_server(op, ctx).await?,
        };
        op.bind_server(server.clone());
        op.execute(&server, session, ctx).await
    }

    async fn select_server(
        &self,
        op: &DescribedOperation,
        ctx: &TimeoutContext,
    ) -> Result<Arc<dyn ServerHandle>> {
        // An exhausted budget must not cost a selection round.
        if ctx.expired() {
            return Err(DriverError::OperationTimeout);
        }
        let criteria = op.selection_criteria();
        let server = self.selector.select(&criteria).await?;
        debug!(
            command = op.command_name(),
            server = server.address(),
            ?criteria,
            "server selected"
        );
        Ok(server)
    }

    /// Retry gating: error class, RETRYABLE aspect, server stickiness, and
    /// deployment support for retryable writes.
    fn can_retry(
        &self,
        op: &DescribedOperation,
        session: Option<&ClientSession>,
        err: &DriverError,
    ) -> bool {
        if !err.is_retryable() || !op.aspects().contains(Aspects::RETRYABLE) {
            return false;
        }
        // Server-sticky operations must not fail over: the server-side state
        // they target lives on exactly one node.
        if op.aspects().contains(Aspects::MUST_USE_SAME_SERVER) {
            return false;
        }
        if op.aspects().contains(Aspects::WRITE) {
            return session.is_some_and(ClientSession::supports_retryable_writes);
        }
        true
    }
}
