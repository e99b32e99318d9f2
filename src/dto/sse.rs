use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{question::PresentedQuestion, session::ConversationId};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event of a conversation stream.
pub struct Handshake {
    /// Conversation the stream relays.
    pub conversation_id: ConversationId,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// A question to render with one button per option (`question` event).
pub struct QuestionMessageEvent {
    /// Identifier later used by `edit` events.
    pub message_id: u64,
    /// The question as shown to the player.
    pub question: PresentedQuestion,
}

#[derive(Debug, Serialize, ToSchema)]
/// Plain text message (`text` event).
pub struct TextMessageEvent {
    /// Identifier of the message.
    pub message_id: u64,
    /// Message body, Markdown allowed.
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Replacement of an earlier message (`edit` event).
pub struct EditMessageEvent {
    /// Message being replaced.
    pub message_id: u64,
    /// New body.
    pub text: String,
}
