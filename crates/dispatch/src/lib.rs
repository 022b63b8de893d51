//! Asynchronous dispatch engine.
//!
//! One dispatch task per accepted notification: load the record, resolve a
//! channel sender from the registry, run it under the bounded retry policy,
//! and reconcile the terminal outcome (`sent` / `failed`) back into Postgres.
//! Tasks are fire-and-forget; the orchestrator is the last line of defense
//! against anything escaping a background job.

pub mod error;
pub mod fault;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod senders;
pub mod store;

pub use error::{DispatchError, SendError};
pub use orchestrator::{DispatchOutcome, Dispatcher};
pub use registry::{Sender, SenderRegistry};
pub use retry::RetryPolicy;
pub use store::{NotificationStore, PgStore};
