//! Notification intake and history routes.
//!
//! Intake creates the record with status `pending`, commits, and then fires
//! exactly one dispatch task for the new id. The client gets the created
//! record immediately and never observes the dispatch outcome directly —
//! delivery results are visible through the persisted status.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use courier_common::error::AppError;
use courier_common::types::{Channel, Notification, NotificationStatus};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(create_notification))
        .route("/api/notifications/{user_id}", get(get_user_notifications))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationParams {
    pub user_id: i64,
    pub message: String,
    /// Channel tag (`email`, `chat`).
    #[serde(rename = "type")]
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Filter by delivery status (`pending`, `sent`, `failed`).
    pub status: Option<String>,
    /// Filter by channel tag.
    #[serde(rename = "type")]
    pub channel: Option<String>,
}

/// POST /api/notifications — accept a notification and trigger its dispatch.
async fn create_notification(
    State(state): State<AppState>,
    Json(params): Json<CreateNotificationParams>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    if params.message.is_empty() {
        return Err(AppError::Validation("message must not be empty".into()));
    }
    if params.user_id < 1 {
        return Err(AppError::Validation("user_id must be positive".into()));
    }
    let channel: Channel = params
        .channel
        .parse()
        .map_err(AppError::Validation)?;

    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: params.user_id,
        message: params.message,
        channel,
        status: NotificationStatus::Pending,
        created_at: Utc::now(),
    };

    let mut tx = state.pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, message, channel, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(&notification.message)
    .bind(notification.channel)
    .bind(notification.status)
    .bind(notification.created_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        notification_id = %notification.id,
        user_id = notification.user_id,
        channel = %notification.channel,
        "Notification accepted"
    );

    // Fire-and-forget: triggered once, only after the record is durable.
    state.dispatcher.spawn(notification.id);

    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /api/notifications/:user_id — notification history, newest first.
async fn get_user_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let status = params
        .status
        .map(|s| s.parse::<NotificationStatus>())
        .transpose()
        .map_err(AppError::Validation)?;
    let channel = params
        .channel
        .map(|c| c.parse::<Channel>())
        .transpose()
        .map_err(AppError::Validation)?;

    let notifications: Vec<Notification> = sqlx::query_as(
        r#"
        SELECT id, user_id, message, channel, status, created_at
        FROM notifications
        WHERE user_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR channel = $3)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(status.map(|s| s.to_string()))
    .bind(channel.map(|c| c.to_string()))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(notifications))
}
