use async_trait::async_trait;

use askbridge_core::domain::intent::Intent;
use askbridge_core::domain::partition::PartitionId;
use askbridge_relay::supervisor::RelayHandle;

use crate::lifecycle::{Notifier, NotifyError};

/// Pushes outbound notifications through the supervised relay's active
/// instance, so deliveries always ride the currently running configuration.
pub struct RelayNotifier {
    relay: RelayHandle,
}

impl RelayNotifier {
    pub fn new(relay: RelayHandle) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    async fn notify(&self, recipient: &PartitionId, intent: &Intent) -> Result<(), NotifyError> {
        let text = notification_text(intent);
        self.relay
            .push_message(&recipient.0, &text)
            .await
            .map_err(|error| NotifyError(error.to_string()))
    }
}

/// `[<id prefix>] <question>` - enough for a human to reply in the IM thread
/// and for an operator to grep the intent back out of the logs.
pub fn notification_text(intent: &Intent) -> String {
    format!("[{}] {}", intent.id.short(), intent.question)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use askbridge_core::domain::intent::Intent;
    use askbridge_relay::supervisor::RelayHandle;

    use super::{notification_text, RelayNotifier};
    use crate::lifecycle::Notifier;

    #[test]
    fn notification_text_carries_the_id_prefix_and_question() {
        let intent = Intent::new("Need a decision on the rollout", None, None, Utc::now());

        let text = notification_text(&intent);

        assert!(text.starts_with(&format!("[{}]", intent.id.short())));
        assert!(text.ends_with("Need a decision on the rollout"));
    }

    #[tokio::test]
    async fn delivery_fails_cleanly_while_the_relay_is_stopped() {
        let notifier = RelayNotifier::new(RelayHandle::new());
        let intent = Intent::new("Q", None, None, Utc::now());

        let error = notifier
            .notify(&askbridge_core::domain::partition::PartitionId("ou_x".into()), &intent)
            .await
            .expect_err("stopped relay cannot deliver");

        assert!(error.to_string().contains("stopped"));
    }
}
