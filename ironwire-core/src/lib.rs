// ironwire-core/src/lib.rs
// Pure Rust client driver core - operation execution, cursors, time budgets

pub mod client;
pub mod cursor;
pub mod error;
pub mod execution;
pub mod index;
pub mod operation;
pub mod response;
pub mod session;
pub mod timeout;
pub mod topology;

// Public exports
pub use client::Client;
pub use cursor::{CommandCursor, CursorState};
pub use error::{DriverError, Result};
pub use execution::ExecutionEngine;
pub use index::{IndexModel, IndexOptions, MIN_COMMIT_QUORUM_WIRE_VERSION};
pub use operation::{Aspects, DescribedOperation, Namespace, OperationKind};
pub use response::{CommandResponse, CursorSpec};
pub use session::ClientSession;
pub use timeout::TimeoutContext;
pub use topology::{ReadPreference, SelectionCriteria, ServerHandle, ServerSelector};
