//! Outbound side of the chat transport.

use std::{fmt, sync::Arc, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::state::{question::PresentedQuestion, session::ConversationId};

/// Reference to a delivered message, used to edit it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub struct MessageHandle {
    /// Conversation holding the message.
    pub conversation_id: ConversationId,
    /// Transport-assigned message identifier.
    pub message_id: u64,
}

impl MessageHandle {
    /// Handle for `message_id` in `conversation_id`.
    pub fn new(conversation_id: ConversationId, message_id: u64) -> Self {
        Self {
            conversation_id,
            message_id,
        }
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.conversation_id, self.message_id)
    }
}

/// Delivery failures reported by a [`Messenger`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The platform could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// The platform refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
    /// The message to edit does not exist (anymore).
    #[error("unknown message {0}")]
    UnknownMessage(MessageHandle),
}

/// Convenient alias for transport results.
pub type TransportResult<T> = Result<T, TransportError>;

/// Chat platform seen from the quiz engine.
pub trait Messenger: Send + Sync {
    fn send_question(
        &self,
        conversation_id: ConversationId,
        question: PresentedQuestion,
    ) -> BoxFuture<'static, TransportResult<MessageHandle>>;
    fn edit_message(
        &self,
        handle: MessageHandle,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>>;
    fn send_text(
        &self,
        conversation_id: ConversationId,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>>;
}

/// [`Messenger`] retrying every failed call once after `backoff`.
#[derive(Clone)]
pub struct RetryingMessenger {
    inner: Arc<dyn Messenger>,
    backoff: Duration,
}

impl RetryingMessenger {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn Messenger>, backoff: Duration) -> Self {
        Self { inner, backoff }
    }
}

async fn retry_once<T, F>(
    operation: &'static str,
    backoff: Duration,
    mut call: F,
) -> TransportResult<T>
where
    F: FnMut() -> BoxFuture<'static, TransportResult<T>>,
{
    match call().await {
        Ok(value) => Ok(value),
        Err(TransportError::UnknownMessage(handle)) => Err(TransportError::UnknownMessage(handle)),
        Err(err) => {
            warn!(
                operation,
                error = %err,
                backoff_ms = backoff.as_millis() as u64,
                "delivery failed; retrying once"
            );
            tokio::time::sleep(backoff).await;
            call().await
        }
    }
}

impl Messenger for RetryingMessenger {
    fn send_question(
        &self,
        conversation_id: ConversationId,
        question: PresentedQuestion,
    ) -> BoxFuture<'static, TransportResult<MessageHandle>> {
        let inner = self.inner.clone();
        let backoff = self.backoff;
        async move {
            retry_once("send_question", backoff, || {
                inner.send_question(conversation_id, question.clone())
            })
            .await
        }
        .boxed()
    }

    fn edit_message(
        &self,
        handle: MessageHandle,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let inner = self.inner.clone();
        let backoff = self.backoff;
        async move {
            retry_once("edit_message", backoff, || {
                inner.edit_message(handle, text.clone())
            })
            .await
        }
        .boxed()
    }

    fn send_text(
        &self,
        conversation_id: ConversationId,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let inner = self.inner.clone();
        let backoff = self.backoff;
        async move {
            retry_once("send_text", backoff, || {
                inner.send_text(conversation_id, text.clone())
            })
            .await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::RecordingMessenger;

    use super::*;

    fn retrying(inner: &RecordingMessenger) -> RetryingMessenger {
        RetryingMessenger::new(Arc::new(inner.clone()), Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn success_is_not_retried() {
        let inner = RecordingMessenger::new();
        retrying(&inner).send_text(1, "hi".into()).await.unwrap();
        assert_eq!(inner.calls(), 1);
        assert_eq!(inner.texts(1), vec!["hi".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_is_retried_after_backoff() {
        let inner = RecordingMessenger::new();
        inner.fail_next(1);

        let started = tokio::time::Instant::now();
        retrying(&inner).send_text(1, "hi".into()).await.unwrap();

        assert_eq!(inner.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(inner.texts(1), vec!["hi".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exactly_once() {
        let inner = RecordingMessenger::new();
        inner.fail_next(2);

        let err = retrying(&inner).send_text(1, "hi".into()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
        assert_eq!(inner.calls(), 2);
        assert!(inner.texts(1).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_messages_are_not_retried() {
        let inner = RecordingMessenger::new();
        let handle = MessageHandle::new(1, 999);

        let err = retrying(&inner)
            .edit_message(handle, "edit".into())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownMessage(handle));
        assert_eq!(inner.calls(), 1);
    }
}
