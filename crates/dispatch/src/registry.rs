//! Channel → sender capability lookup.
//!
//! Built once at startup and shared behind `Arc`; after that it is
//! read-only, so concurrent dispatch tasks can resolve senders without any
//! synchronization. The registry holds no notification state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use courier_common::types::{Channel, Notification};

use crate::error::SendError;

/// A capability that attempts delivery over one channel.
///
/// `Ok(true)` means the external side accepted the message, `Ok(false)` or
/// `Err` means it did not — both count as a failed attempt for the retry
/// executor. Implementations must not touch `notification.status`; the
/// orchestrator owns status mutation exclusively.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<bool, SendError>;
}

/// Maps a channel tag to its registered `Sender`.
#[derive(Default)]
pub struct SenderRegistry {
    senders: HashMap<Channel, Arc<dyn Sender>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a sender to a channel, replacing any previous binding.
    /// Registration happens once at process start.
    pub fn register(&mut self, channel: Channel, sender: Arc<dyn Sender>) {
        self.senders.insert(channel, sender);
    }

    /// Look up the sender for a channel. `None` means the channel has no
    /// registered capability and the dispatch must fail deterministically.
    pub fn resolve(&self, channel: Channel) -> Option<Arc<dyn Sender>> {
        self.senders.get(&channel).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk;

    #[async_trait]
    impl Sender for AlwaysOk {
        async fn send(&self, _notification: &Notification) -> Result<bool, SendError> {
            Ok(true)
        }
    }

    #[test]
    fn test_resolve_registered_channel() {
        let mut registry = SenderRegistry::new();
        registry.register(Channel::Email, Arc::new(AlwaysOk));

        assert!(registry.resolve(Channel::Email).is_some());
    }

    #[test]
    fn test_resolve_unregistered_channel_is_none() {
        let mut registry = SenderRegistry::new();
        registry.register(Channel::Email, Arc::new(AlwaysOk));

        assert!(registry.resolve(Channel::Chat).is_none());
    }

    #[test]
    fn test_register_replaces_previous_binding() {
        let mut registry = SenderRegistry::new();
        let first: Arc<dyn Sender> = Arc::new(AlwaysOk);
        let second: Arc<dyn Sender> = Arc::new(AlwaysOk);
        registry.register(Channel::Chat, first.clone());
        registry.register(Channel::Chat, second.clone());

        let resolved = registry.resolve(Channel::Chat).unwrap();
        assert!(Arc::ptr_eq(&resolved, &second));
    }
}
