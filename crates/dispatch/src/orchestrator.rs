//! Dispatch orchestrator — one invocation per accepted notification.
//!
//! Sequences load → registry resolve → retried send → reconcile, and owns
//! the top-level error taxonomy. Dispatch is fire-and-forget: nothing a
//! sender or the store does may escape the spawned task, and only a data
//! consistency violation escapes `dispatch` itself.

use std::sync::Arc;

use courier_common::types::NotificationStatus;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::registry::SenderRegistry;
use crate::retry::{RetryPolicy, run_with_retry};
use crate::store::NotificationStore;

/// How one dispatch invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Terminal: status durably `sent`.
    Sent,
    /// Terminal: status durably `failed`.
    Failed,
    /// No record to act on (never existed, raced deletion, or already
    /// terminal). Logged, no side effects.
    Aborted,
    /// Storage failure left the record in its prior state. A record stuck
    /// at `pending` needs an out-of-band reconciliation sweep; this engine
    /// only reports the condition.
    Stuck,
}

/// Entry point of the dispatch engine.
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    registry: Arc<SenderRegistry>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        registry: Arc<SenderRegistry>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            policy,
        }
    }

    /// Run one dispatch to completion.
    ///
    /// Every path ends in a terminal status write, a logged abort, or a
    /// reported stuck record. The only `Err` this returns is
    /// `ConsistencyViolation` — external data corruption the caller's
    /// alerting must see.
    pub async fn dispatch(&self, id: Uuid) -> Result<DispatchOutcome, DispatchError> {
        let notification = match self.store.load(id).await {
            Ok(n) => n,
            Err(DispatchError::NotFound(_)) => {
                tracing::warn!(notification_id = %id, "Notification not found, aborting dispatch");
                return Ok(DispatchOutcome::Aborted);
            }
            Err(e @ DispatchError::ConsistencyViolation { .. }) => {
                tracing::error!(notification_id = %id, error = %e, "Data consistency violation");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(notification_id = %id, error = %e, "Store unavailable during load");
                return Ok(DispatchOutcome::Stuck);
            }
        };

        // Intake guarantees one trigger per record, but a redelivered
        // trigger must not re-send an already-reconciled notification.
        if notification.status.is_terminal() {
            tracing::warn!(
                notification_id = %id,
                status = %notification.status,
                "Notification already terminal, nothing to dispatch"
            );
            return Ok(DispatchOutcome::Aborted);
        }

        let Some(sender) = self.registry.resolve(notification.channel) else {
            // Retrying a nonexistent capability cannot succeed: fail
            // immediately with zero send attempts.
            let e = DispatchError::UnknownChannel(notification.channel);
            tracing::warn!(notification_id = %id, error = %e, "Failing dispatch");
            return Ok(self.reconcile(id, NotificationStatus::Failed).await);
        };

        tracing::debug!(
            notification_id = %id,
            user_id = notification.user_id,
            channel = %notification.channel,
            "Dispatching notification"
        );

        let delivered = run_with_retry(&self.policy, || sender.send(&notification)).await;

        let status = if delivered {
            NotificationStatus::Sent
        } else {
            NotificationStatus::Failed
        };

        Ok(self.reconcile(id, status).await)
    }

    /// Spawn a fire-and-forget dispatch task. The caller observes nothing;
    /// outcomes are visible through the persisted status and logs.
    pub fn spawn(self: &Arc<Self>, id: Uuid) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(id).await {
                tracing::error!(
                    notification_id = %id,
                    error = %e,
                    "Dispatch surfaced a consistency violation"
                );
            }
        });
    }

    /// Persist the terminal outcome, downgrading reconciliation failures to
    /// reported (never raised) conditions.
    async fn reconcile(&self, id: Uuid, status: NotificationStatus) -> DispatchOutcome {
        match self.store.set_status(id, status).await {
            Ok(()) => {
                tracing::info!(notification_id = %id, status = %status, "Dispatch complete");
                match status {
                    NotificationStatus::Sent => DispatchOutcome::Sent,
                    _ => DispatchOutcome::Failed,
                }
            }
            Err(DispatchError::NotFound(_)) => {
                tracing::warn!(
                    notification_id = %id,
                    "Notification vanished before reconciliation"
                );
                DispatchOutcome::Aborted
            }
            Err(e) => {
                tracing::error!(
                    notification_id = %id,
                    status = %status,
                    error = %e,
                    "Reconciliation failed, record left in prior state"
                );
                DispatchOutcome::Stuck
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use courier_common::types::{Channel, Notification};

    use super::*;
    use crate::error::SendError;
    use crate::registry::Sender;

    /// In-memory store: a record map plus switches for the failure paths.
    #[derive(Default)]
    struct MemStore {
        records: Mutex<HashMap<Uuid, Notification>>,
        /// Ids reported as duplicated (uniqueness invariant broken upstream).
        duplicated: Mutex<Vec<Uuid>>,
        fail_writes: AtomicBool,
        writes: AtomicU32,
    }

    impl MemStore {
        fn insert_pending(&self, channel: Channel) -> Uuid {
            let id = Uuid::new_v4();
            self.records.lock().unwrap().insert(
                id,
                Notification {
                    id,
                    user_id: 7,
                    message: "Your code: 11111".to_string(),
                    channel,
                    status: NotificationStatus::Pending,
                    created_at: Utc::now(),
                },
            );
            id
        }

        fn status_of(&self, id: Uuid) -> Option<NotificationStatus> {
            self.records.lock().unwrap().get(&id).map(|n| n.status)
        }
    }

    #[async_trait]
    impl NotificationStore for MemStore {
        async fn load(&self, id: Uuid) -> Result<Notification, DispatchError> {
            if self.duplicated.lock().unwrap().contains(&id) {
                return Err(DispatchError::ConsistencyViolation { id, count: 2 });
            }
            self.records
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or(DispatchError::NotFound(id))
        }

        async fn set_status(
            &self,
            id: Uuid,
            status: NotificationStatus,
        ) -> Result<(), DispatchError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(DispatchError::Storage(sqlx::Error::PoolTimedOut));
            }
            let mut records = self.records.lock().unwrap();
            let record = records.get_mut(&id).ok_or(DispatchError::NotFound(id))?;
            if !record.status.is_terminal() {
                record.status = status;
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    /// Sender that counts invocations and plays back a scripted outcome per
    /// attempt; succeeds once the script is exhausted.
    #[derive(Default)]
    struct ScriptedSender {
        calls: AtomicU32,
        script: Mutex<Vec<Result<bool, String>>>,
    }

    impl ScriptedSender {
        fn new(outcomes: impl IntoIterator<Item = Result<bool, String>>) -> Self {
            let mut script: Vec<_> = outcomes.into_iter().collect();
            script.reverse();
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sender for ScriptedSender {
        async fn send(&self, _notification: &Notification) -> Result<bool, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop() {
                Some(Ok(accepted)) => Ok(accepted),
                Some(Err(msg)) => Err(SendError(msg)),
                None => Ok(true),
            }
        }
    }

    fn dispatcher(
        store: Arc<MemStore>,
        channel: Channel,
        sender: Arc<ScriptedSender>,
    ) -> Dispatcher {
        let mut registry = SenderRegistry::new();
        registry.register(channel, sender);
        Dispatcher::new(
            store,
            Arc::new(registry),
            RetryPolicy::new(3, Duration::from_millis(100)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_dispatch_reconciles_to_sent() {
        let store = Arc::new(MemStore::default());
        let id = store.insert_pending(Channel::Email);
        let sender = Arc::new(ScriptedSender::new([Ok(true)]));

        let outcome = dispatcher(store.clone(), Channel::Email, sender.clone())
            .dispatch(id)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(store.status_of(id), Some(NotificationStatus::Sent));
        assert_eq!(sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retry_then_send() {
        let store = Arc::new(MemStore::default());
        let id = store.insert_pending(Channel::Chat);
        let sender = Arc::new(ScriptedSender::new([
            Err("down".to_string()),
            Err("down".to_string()),
            Ok(true),
        ]));

        let outcome = dispatcher(store.clone(), Channel::Chat, sender.clone())
            .dispatch(id)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(store.status_of(id), Some(NotificationStatus::Sent));
        assert_eq!(sender.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_reconcile_to_failed() {
        let store = Arc::new(MemStore::default());
        let id = store.insert_pending(Channel::Email);
        let sender = Arc::new(ScriptedSender::new([
            Err("down".to_string()),
            Err("down".to_string()),
            Err("down".to_string()),
            Ok(true), // never reached: attempt bound is 3
        ]));

        let outcome = dispatcher(store.clone(), Channel::Email, sender.clone())
            .dispatch(id)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(store.status_of(id), Some(NotificationStatus::Failed));
        assert_eq!(sender.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_channel_fails_with_zero_attempts() {
        let store = Arc::new(MemStore::default());
        // Record targets chat, but only an email sender is registered.
        let id = store.insert_pending(Channel::Chat);
        let sender = Arc::new(ScriptedSender::new([Ok(true)]));

        let outcome = dispatcher(store.clone(), Channel::Email, sender.clone())
            .dispatch(id)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(store.status_of(id), Some(NotificationStatus::Failed));
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_record_aborts_without_writes() {
        let store = Arc::new(MemStore::default());
        let sender = Arc::new(ScriptedSender::new([Ok(true)]));

        let outcome = dispatcher(store.clone(), Channel::Email, sender.clone())
            .dispatch(Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Aborted);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_records_surface_consistency_violation() {
        let store = Arc::new(MemStore::default());
        let id = store.insert_pending(Channel::Email);
        store.duplicated.lock().unwrap().push(id);
        let sender = Arc::new(ScriptedSender::new([Ok(true)]));

        let result = dispatcher(store.clone(), Channel::Email, sender.clone())
            .dispatch(id)
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::ConsistencyViolation { count: 2, .. })
        ));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_leaves_record_pending() {
        let store = Arc::new(MemStore::default());
        let id = store.insert_pending(Channel::Email);
        store.fail_writes.store(true, Ordering::SeqCst);
        let sender = Arc::new(ScriptedSender::new([Ok(true)]));

        let outcome = dispatcher(store.clone(), Channel::Email, sender.clone())
            .dispatch(id)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Stuck);
        assert_eq!(store.status_of(id), Some(NotificationStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redelivered_trigger_never_reverts_terminal_status() {
        let store = Arc::new(MemStore::default());
        let id = store.insert_pending(Channel::Email);
        let sender = Arc::new(ScriptedSender::new([
            Ok(true),
            Err("would fail on redispatch".to_string()),
        ]));
        let d = dispatcher(store.clone(), Channel::Email, sender.clone());

        assert_eq!(d.dispatch(id).await.unwrap(), DispatchOutcome::Sent);
        // Second trigger for the same id: no send, no status change.
        assert_eq!(d.dispatch(id).await.unwrap(), DispatchOutcome::Aborted);

        assert_eq!(store.status_of(id), Some(NotificationStatus::Sent));
        assert_eq!(sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_dispatches_all_reach_terminal_status() {
        let store = Arc::new(MemStore::default());
        let sender = Arc::new(ScriptedSender::new([
            Err("down".to_string()),
            Ok(false),
            Ok(true),
        ]));
        let d = Arc::new(dispatcher(store.clone(), Channel::Chat, sender));

        let ids: Vec<Uuid> = (0..8).map(|_| store.insert_pending(Channel::Chat)).collect();
        let mut handles = Vec::new();
        for id in &ids {
            let d = Arc::clone(&d);
            let id = *id;
            handles.push(tokio::spawn(async move { d.dispatch(id).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for id in ids {
            let status = store.status_of(id).unwrap();
            assert!(status.is_terminal(), "dispatch left {} non-terminal", id);
        }
    }
}
