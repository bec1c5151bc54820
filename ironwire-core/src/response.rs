// ironwire-core/src/response.rs
// Reply inspection: ok/error classification and cursor payload parsing

use serde_json::Value;

use crate::error::{DriverError, Result};
use crate::operation::Namespace;

/// Server code for a command that outlived its server-side `maxTimeMS`.
/// Surfaced as [`DriverError::OperationTimeout`], not as a server error.
const MAX_TIME_MS_EXPIRED: i32 = 50;

/// Server error codes the server considers safe to retry once
/// (stepdowns, shutdown interrupts, stale routing tables).
const RETRYABLE_SERVER_CODES: &[i32] = &[
    6, 7, 89, 91, 189, 262, 9001, 10107, 11600, 11602, 13435, 13436,
];

const RETRYABLE_WRITE_LABEL: &str = "RetryableWriteError";

/// A successful command reply.
///
/// Construction is where error replies are translated into the driver
/// taxonomy; holders of a `CommandResponse` know the command succeeded.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    raw: Value,
}

/// Cursor fields extracted from a cursor-creating or `getMore` reply.
#[derive(Debug)]
pub struct CursorSpec {
    /// Server-assigned cursor handle; `0` means exhausted.
    pub id: i64,
    pub namespace: Namespace,
    /// Documents of this batch, in server order.
    pub batch: Vec<Value>,
}

impl CommandResponse {
    /// Classify a raw reply document.
    ///
    /// `ok: 1` passes through; anything else becomes the matching
    /// [`DriverError`] variant, with retryability derived from the error
    /// labels and the retryable code set.
    pub fn from_reply(reply: Value) -> Result<CommandResponse> {
        let ok = reply.get("ok").and_then(Value::as_f64).unwrap_or(0.0);
        if ok == 1.0 {
            return Ok(CommandResponse { raw: reply });
        }

        let code = reply.get("code").and_then(Value::as_i64).unwrap_or(0) as i32;
        let message = reply
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("command failed")
            .to_string();

        if code == MAX_TIME_MS_EXPIRED {
            return Err(DriverError::OperationTimeout);
        }

        let labeled_retryable = reply
            .get("errorLabels")
            .and_then(Value::as_array)
            .is_some_and(|labels| labels.iter().any(|label| label == RETRYABLE_WRITE_LABEL));
        let retryable = labeled_retryable || RETRYABLE_SERVER_CODES.contains(&code);

        Err(DriverError::Server {
            code,
            message,
            retryable,
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Parse the `cursor` sub-document of this reply.
    ///
    /// Accepts both `firstBatch` (cursor-creating commands) and `nextBatch`
    /// (`getMore`).
    pub fn cursor_spec(&self) -> Result<CursorSpec> {
        let cursor = self
            .raw
            .get("cursor")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                DriverError::Internal("reply is missing the cursor document".to_string())
            })?;

        let id = cursor.get("id").and_then(Value::as_i64).ok_or_else(|| {
            DriverError::Internal("cursor reply is missing a numeric id".to_string())
        })?;

        let ns = cursor
            .get("ns")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Internal("cursor reply is missing ns".to_string()))?;
        let (db, collection) = ns.split_once('.').ok_or_else(|| {
            DriverError::Internal(format!("cursor ns '{ns}' is not db.collection"))
        })?;

        let batch = cursor
            .get("firstBatch")
            .or_else(|| cursor.get("nextBatch"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(CursorSpec {
            id,
            namespace: Namespace::new(db, collection),
            batch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_reply_passes_through() {
        let response = CommandResponse::from_reply(json!({"ok": 1, "n": 3})).unwrap();
        assert_eq!(response.raw().get("n").unwrap(), &json!(3));
    }

    #[test]
    fn test_integer_ok_accepted() {
        // Servers reply with ok as a double, but integers appear in tests
        // and proxies; both must classify as success.
        assert!(CommandResponse::from_reply(json!({"ok": 1.0})).is_ok());
        assert!(CommandResponse::from_reply(json!({"ok": 1})).is_ok());
    }

    #[test]
    fn test_error_reply_becomes_server_error() {
        let err =
            CommandResponse::from_reply(json!({"ok": 0, "code": 13, "errmsg": "unauthorized"}))
                .unwrap_err();
        match err {
            DriverError::Server {
                code,
                message,
                retryable,
            } => {
                assert_eq!(code, 13);
                assert_eq!(message, "unauthorized");
                assert!(!retryable);
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn test_retryable_code_flagged() {
        let err = CommandResponse::from_reply(
            json!({"ok": 0, "code": 11600, "errmsg": "interrupted at shutdown"}),
        )
        .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_write_label_flagged() {
        let err = CommandResponse::from_reply(json!({
            "ok": 0,
            "code": 112,
            "errmsg": "write conflict",
            "errorLabels": ["RetryableWriteError"]
        }))
        .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_max_time_expired_is_timeout() {
        let err = CommandResponse::from_reply(
            json!({"ok": 0, "code": 50, "errmsg": "operation exceeded time limit"}),
        )
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cursor_spec_first_batch() {
        let response = CommandResponse::from_reply(json!({
            "ok": 1,
            "cursor": {
                "id": 42,
                "ns": "app.events",
                "firstBatch": [{"_id": 1}, {"_id": 2}]
            }
        }))
        .unwrap();

        let spec = response.cursor_spec().unwrap();
        assert_eq!(spec.id, 42);
        assert_eq!(spec.namespace.db, "app");
        assert_eq!(spec.namespace.collection, "events");
        assert_eq!(spec.batch.len(), 2);
    }

    #[test]
    fn test_cursor_spec_next_batch() {
        let response = CommandResponse::from_reply(json!({
            "ok": 1,
            "cursor": {"id": 0, "ns": "app.events", "nextBatch": [{"_id": 3}]}
        }))
        .unwrap();

        let spec = response.cursor_spec().unwrap();
        assert_eq!(spec.id, 0);
        assert_eq!(spec.batch.len(), 1);
    }

    #[test]
    fn test_missing_cursor_document_is_internal_error() {
        let response = CommandResponse::from_reply(json!({"ok": 1})).unwrap();
        let err = response.cursor_spec().unwrap_err();
        assert!(matches!(err, DriverError::Internal(_)));
    }
}
