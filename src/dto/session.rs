use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::{
        question::QuestionId,
        session::{ConversationId, PlayerId, SessionSnapshot},
        state_machine::SessionPhase,
    },
};

/// Public view of a running quiz; never reveals the correct answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub session_id: Uuid,
    pub conversation_id: ConversationId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub phase: SessionPhase,
    /// 1-based number of the current question.
    pub question_number: usize,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionId>,
    pub score: u32,
    pub correct_answers: usize,
    /// RFC 3339 timestamp.
    pub started_at: String,
    /// RFC 3339 timestamp.
    pub last_activity_at: String,
}

impl From<SessionSnapshot> for SessionView {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id,
            conversation_id: snapshot.conversation_id,
            player_id: snapshot.player.id,
            player_name: snapshot.player.label(),
            phase: snapshot.phase,
            question_number: snapshot.current_index + 1,
            question_count: snapshot.question_count,
            question_id: snapshot.current_question_id(),
            score: snapshot.score,
            correct_answers: snapshot.correct_answers,
            started_at: format_system_time(snapshot.started_at),
            last_activity_at: format_system_time(snapshot.last_activity_at),
        }
    }
}
