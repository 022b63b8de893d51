use courier_common::types::Channel;
use thiserror::Error;
use uuid::Uuid;

/// A single send attempt failed transiently. The retry executor decides
/// whether another attempt follows; this error never crosses the
/// orchestrator boundary.
#[derive(Debug, Error)]
#[error("send failed: {0}")]
pub struct SendError(pub String);

/// Dispatch-level error taxonomy.
///
/// Only `ConsistencyViolation` is allowed to surface out of
/// `Dispatcher::dispatch` — it signals a broken uniqueness invariant
/// elsewhere in the system. Everything else is handled inside the
/// orchestrator and ends in a terminal status write or a logged abort.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No record for this id. Legitimate (never existed or raced deletion);
    /// logged and the dispatch aborted without side effects.
    #[error("notification {0} not found")]
    NotFound(Uuid),

    /// More than one record shares an id that must be unique. Fatal: the
    /// transaction is rolled back and the violation surfaced to alerting.
    #[error("consistency violation: {count} records for notification {id}")]
    ConsistencyViolation { id: Uuid, count: usize },

    /// No sender registered for the record's channel. Terminal failure with
    /// zero send attempts.
    #[error("no sender registered for channel {0}")]
    UnknownChannel(Channel),

    /// Store unreachable or transaction failure. The record keeps its prior
    /// status; a pending record hit by this is stuck until an out-of-band
    /// sweep picks it up.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}
