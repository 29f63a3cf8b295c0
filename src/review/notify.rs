//! Best-effort side channel for messages the user did not directly ask for,
//! such as "time is up" edits driven by the answer timer.
use crate::models::Notification;
use async_trait::async_trait;
use tracing::info;

pub type ChatId = i64;
pub type MessageId = i64;

/// The message a session keeps editing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &MessageRef, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of a chat.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, target: &MessageRef, notification: Notification) -> Result<(), NotifyError> {
        info!(
            chat_id = target.chat_id,
            message_id = target.message_id,
            controls = notification.controls.len(),
            "{}",
            notification.text
        );
        Ok(())
    }
}
