// ironwire-core/src/session.rs
// Session handle borrowed by operations and cursors

use uuid::Uuid;

/// Logical session handle.
///
/// Operations and cursors borrow a session, they never own one: the creator
/// is responsible for its lifecycle and for not reusing it concurrently
/// across overlapping operations (single-session-at-a-time is a caller
/// contract, not enforced here).
#[derive(Debug, Clone)]
pub struct ClientSession {
    id: Uuid,
    retryable_writes: bool,
    retryable_reads: bool,
}

impl ClientSession {
    pub fn new() -> Self {
        ClientSession {
            id: Uuid::new_v4(),
            // Retryable reads need no deployment support; retryable writes do
            // and default off until the deployment advertises them.
            retryable_writes: false,
            retryable_reads: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Mark the deployment as supporting retryable writes.
    pub fn with_retryable_writes(mut self, supported: bool) -> Self {
        self.retryable_writes = supported;
        self
    }

    pub fn supports_retryable_writes(&self) -> bool {
        self.retryable_writes
    }

    pub fn supports_retryable_reads(&self) -> bool {
        self.retryable_reads
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}
