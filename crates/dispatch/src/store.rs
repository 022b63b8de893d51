//! Record loading and status reconciliation against the durable store.
//!
//! Every operation runs in its own transaction; on any exit path the
//! transaction is either committed or rolled back (sqlx also rolls back on
//! drop, but the failure paths roll back explicitly before classifying the
//! error). The trait is the seam the orchestrator tests use to substitute
//! an in-memory store.

use async_trait::async_trait;
use courier_common::types::{Notification, NotificationStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DispatchError;

/// Store operations the dispatch engine needs: one read, one terminal write.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Fetch the single record for `id`.
    ///
    /// Zero rows is `NotFound` (a legitimate race, not a crash); more than
    /// one row is `ConsistencyViolation` — a broken uniqueness invariant
    /// that must be surfaced, never swallowed.
    async fn load(&self, id: Uuid) -> Result<Notification, DispatchError>;

    /// Persist a terminal status (`Sent` or `Failed`) for `id`.
    ///
    /// Read-modify-write under a row lock. Idempotent: re-invoking with the
    /// same terminal status is a no-op. A record that vanished between load
    /// and write maps to `NotFound`; commit failures map to `Storage` and
    /// leave the record in its prior state.
    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), DispatchError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn load(&self, id: Uuid) -> Result<Notification, DispatchError> {
        let mut tx = self.pool.begin().await?;

        // fetch_all instead of fetch_optional: a duplicate id must be
        // detected, not silently resolved to the first row.
        let mut rows: Vec<Notification> = sqlx::query_as(
            r#"
            SELECT id, user_id, message, channel, status, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        match rows.len() {
            0 => {
                tx.rollback().await?;
                Err(DispatchError::NotFound(id))
            }
            1 => {
                tx.commit().await?;
                Ok(rows.remove(0))
            }
            count => {
                tx.rollback().await?;
                Err(DispatchError::ConsistencyViolation { id, count })
            }
        }
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), DispatchError> {
        debug_assert!(status.is_terminal(), "reconciler only writes terminal statuses");

        let mut tx = self.pool.begin().await?;

        let current: Option<Notification> = sqlx::query_as(
            r#"
            SELECT id, user_id, message, channel, status, created_at
            FROM notifications
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Err(DispatchError::NotFound(id));
        };

        if current.status == status {
            // Re-invocation with the same terminal status: nothing to do.
            tx.commit().await?;
            return Ok(());
        }

        if current.status.is_terminal() {
            // Terminal statuses are never overwritten.
            tracing::warn!(
                notification_id = %id,
                current = %current.status,
                requested = %status,
                "Refusing to overwrite terminal status"
            );
            tx.commit().await?;
            return Ok(());
        }

        sqlx::query("UPDATE notifications SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(notification_id = %id, status = %status, "Notification reconciled");
        Ok(())
    }
}
