//! Simulated channel senders.
//!
//! Each sender models its channel's latency with a timed suspension, then
//! consults the injected fault source to decide the attempt's outcome. No
//! real delivery happens here; swapping in an SMTP or webhook sender is a
//! matter of implementing `Sender` and registering it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_common::types::Notification;

use crate::error::SendError;
use crate::fault::FaultSource;
use crate::registry::Sender;

/// Email delivery (simulated). Slowest channel.
pub struct EmailSender {
    latency: Duration,
    faults: Arc<dyn FaultSource>,
}

impl EmailSender {
    pub fn new(latency: Duration, faults: Arc<dyn FaultSource>) -> Self {
        Self { latency, faults }
    }
}

#[async_trait]
impl Sender for EmailSender {
    async fn send(&self, notification: &Notification) -> Result<bool, SendError> {
        tracing::debug!(
            notification_id = %notification.id,
            user_id = notification.user_id,
            "Sending email notification"
        );
        tokio::time::sleep(self.latency).await;

        if self.faults.roll() {
            return Err(SendError("email gateway rejected the message".into()));
        }
        Ok(true)
    }
}

/// Chat delivery (simulated). Low latency.
pub struct ChatSender {
    latency: Duration,
    faults: Arc<dyn FaultSource>,
}

impl ChatSender {
    pub fn new(latency: Duration, faults: Arc<dyn FaultSource>) -> Self {
        Self { latency, faults }
    }
}

#[async_trait]
impl Sender for ChatSender {
    async fn send(&self, notification: &Notification) -> Result<bool, SendError> {
        tracing::debug!(
            notification_id = %notification.id,
            user_id = notification.user_id,
            "Sending chat notification"
        );
        tokio::time::sleep(self.latency).await;

        if self.faults.roll() {
            return Err(SendError("chat endpoint unavailable".into()));
        }
        Ok(true)
    }
}
