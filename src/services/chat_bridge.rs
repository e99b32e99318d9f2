//! [`Messenger`] publishing outbound messages on per-conversation SSE hubs.
//!
//! A platform adapter subscribes to a conversation stream and relays each
//! event to the real chat.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    dto::sse::{EditMessageEvent, QuestionMessageEvent, ServerEvent, TextMessageEvent},
    services::messenger::{MessageHandle, Messenger, TransportError, TransportResult},
    state::{SseHub, question::PresentedQuestion, session::ConversationId},
};

/// Outbound chat traffic exposed as server-sent events.
pub struct ChatBridge {
    hubs: DashMap<ConversationId, Arc<SseHub>>,
    next_message_id: AtomicU64,
    capacity: usize,
}

impl ChatBridge {
    /// Bridge whose per-conversation channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            next_message_id: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to the messages of a conversation.
    pub fn subscribe(&self, conversation_id: ConversationId) -> broadcast::Receiver<ServerEvent> {
        self.hub(conversation_id).subscribe()
    }

    /// Publish an event on a conversation stream.
    pub fn publish(&self, conversation_id: ConversationId, event: ServerEvent) -> usize {
        match self.hubs.get(&conversation_id) {
            Some(hub) => hub.broadcast(event),
            None => 0,
        }
    }

    /// Forget the hub of a conversation once its last subscriber left.
    pub fn release(&self, conversation_id: ConversationId) {
        self.hubs
            .remove_if(&conversation_id, |_, hub| hub.receiver_count() == 0);
    }

    /// Conversations with at least one connected stream.
    pub fn connected_conversations(&self) -> usize {
        self.hubs
            .iter()
            .filter(|entry| entry.value().receiver_count() > 0)
            .count()
    }

    fn hub(&self, conversation_id: ConversationId) -> Arc<SseHub> {
        self.hubs
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(SseHub::new(self.capacity)))
            .value()
            .clone()
    }

    fn allocate(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit<T: Serialize>(
        &self,
        conversation_id: ConversationId,
        name: &str,
        payload: &T,
    ) -> TransportResult<()> {
        let event = ServerEvent::json(Some(name.to_string()), payload)
            .map_err(|err| TransportError::Rejected(err.to_string()))?;
        let receivers = self.publish(conversation_id, event);
        if receivers == 0 {
            debug!(conversation_id, event = name, "no stream connected; message dropped");
        }
        Ok(())
    }
}

impl Messenger for ChatBridge {
    fn send_question(
        &self,
        conversation_id: ConversationId,
        question: PresentedQuestion,
    ) -> BoxFuture<'static, TransportResult<MessageHandle>> {
        let message_id = self.allocate();
        let result = self
            .emit(
                conversation_id,
                "question",
                &QuestionMessageEvent {
                    message_id,
                    question,
                },
            )
            .map(|()| MessageHandle::new(conversation_id, message_id));
        Box::pin(future::ready(result))
    }

    fn edit_message(
        &self,
        handle: MessageHandle,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let issued = self.next_message_id.load(Ordering::SeqCst);
        let result = if handle.message_id == 0 || handle.message_id > issued {
            Err(TransportError::UnknownMessage(handle))
        } else {
            self.emit(
                handle.conversation_id,
                "edit",
                &EditMessageEvent {
                    message_id: handle.message_id,
                    text,
                },
            )
        };
        Box::pin(future::ready(result))
    }

    fn send_text(
        &self,
        conversation_id: ConversationId,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let message_id = self.allocate();
        let result = self.emit(conversation_id, "text", &TextMessageEvent { message_id, text });
        Box::pin(future::ready(result))
    }
}
