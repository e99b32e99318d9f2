use std::{
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::SystemTime,
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    services::messenger::MessageHandle,
    state::{
        question::{PresentedQuestion, Question, QuestionId},
        state_machine::{InvalidTransition, SessionEvent, SessionPhase, SessionStateMachine},
        timer::{QuestionTimer, TimerKind, TimerToken},
    },
};

/// Identifier of a chat conversation.
pub type ConversationId = i64;
/// Stable identifier of a player on the chat platform.
pub type PlayerId = i64;

/// The person taking a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Player {
    /// Stable platform identifier; the leaderboard key.
    pub id: PlayerId,
    /// Name shown to other players; may change between games.
    pub display_name: String,
    /// Optional platform handle, rendered as `@username`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Player {
    /// Player without a username.
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            username: None,
        }
    }

    /// Attach a platform username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Name used on the leaderboard, e.g. `Ada (@ada)`.
    pub fn label(&self) -> String {
        match self.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => format!("{} (@{username})", self.display_name),
            None => self.display_name.clone(),
        }
    }
}

/// Run-state of one quiz attempt in one conversation.
#[derive(Debug)]
pub struct QuizSession {
    id: Uuid,
    conversation_id: ConversationId,
    player: Player,
    questions: Vec<Question>,
    current_index: usize,
    score: u32,
    correct_answers: usize,
    machine: SessionStateMachine,
    pending_timer: Option<QuestionTimer>,
    started_at: SystemTime,
    last_activity_at: SystemTime,
}

impl QuizSession {
    /// Create a session over an already drawn set of questions.
    pub fn new(conversation_id: ConversationId, player: Player, questions: Vec<Question>) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            player,
            questions,
            current_index: 0,
            score: 0,
            correct_answers: 0,
            machine: SessionStateMachine::new(),
            pending_timer: None,
            started_at: now,
            last_activity_at: now,
        }
    }

    /// Unique identifier of this attempt.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Conversation the session runs in.
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Player taking the quiz.
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Index of the question being played.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Points earned so far.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Questions answered correctly so far.
    pub fn correct_answers(&self) -> usize {
        self.correct_answers
    }

    /// Size of the draw.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Token of the armed timer, if any.
    pub fn pending_timer(&self) -> Option<TimerToken> {
        self.pending_timer.as_ref().map(QuestionTimer::token)
    }

    /// Question at the current index.
    pub fn current_question(&self) -> Option<&Question> {
        debug_assert!(
            self.current_index < self.questions.len(),
            "question index {} out of range ({} questions)",
            self.current_index,
            self.questions.len()
        );
        self.questions.get(self.current_index)
    }

    /// Presentation of the current question.
    pub fn present_current(&self) -> Option<PresentedQuestion> {
        self.current_question().map(|question| PresentedQuestion {
            question_id: question.id(),
            number: self.current_index + 1,
            total: self.questions.len(),
            prompt: question.prompt().to_string(),
            options: question.options().to_vec(),
        })
    }

    /// Whether another question follows the current one.
    pub fn has_next_question(&self) -> bool {
        self.current_index + 1 < self.questions.len()
    }

    /// Present the first question.
    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        self.transition(SessionEvent::Start)
    }

    /// Close the open question with an accepted answer.
    pub fn accept_answer(&mut self, correct: bool, points: u32) -> Result<(), InvalidTransition> {
        self.transition(SessionEvent::AnswerAccepted)?;
        if correct {
            self.score += points;
            self.correct_answers += 1;
        }
        debug_assert!(self.correct_answers <= self.questions.len());
        Ok(())
    }

    /// Close the open question without an answer.
    pub fn time_out(&mut self) -> Result<(), InvalidTransition> {
        self.transition(SessionEvent::TimedOut)
    }

    /// Move to the next question.
    pub fn next_question(&mut self) -> Result<(), InvalidTransition> {
        debug_assert!(self.has_next_question(), "no question left to advance to");
        self.transition(SessionEvent::NextQuestion)?;
        self.current_index += 1;
        Ok(())
    }

    /// Mark the session as played to the end.
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        self.transition(SessionEvent::Complete)
    }

    /// Mark the session as cancelled and disarm its timer.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        self.cancel_timer();
        self.transition(SessionEvent::Cancel)
    }

    /// Install a timer, cancelling any previous one.
    pub fn install_timer(&mut self, timer: QuestionTimer) {
        if let Some(previous) = self.pending_timer.replace(timer) {
            previous.cancel();
        }
    }

    /// Disarm the pending timer.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.cancel();
        }
    }

    /// Consume the pending timer when `token` is still the installed one.
    ///
    /// Returns `None` for a stale token, leaving the installed timer untouched.
    pub fn claim_timer(&mut self, token: TimerToken) -> Option<TimerKind> {
        match self.pending_timer.take() {
            Some(timer) if timer.token() == token => {
                let kind = timer.kind();
                timer.expire();
                Some(kind)
            }
            other => {
                self.pending_timer = other;
                None
            }
        }
    }

    /// Copy of the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            conversation_id: self.conversation_id,
            player: self.player.clone(),
            phase: self.phase(),
            current_index: self.current_index,
            question_count: self.questions.len(),
            current_question: self.questions.get(self.current_index).cloned(),
            score: self.score,
            correct_answers: self.correct_answers,
            pending_timer: self.pending_timer(),
            started_at: self.started_at,
            last_activity_at: self.last_activity_at,
        }
    }

    fn transition(&mut self, event: SessionEvent) -> Result<(), InvalidTransition> {
        self.machine.apply(event)?;
        self.last_activity_at = SystemTime::now();
        Ok(())
    }
}

/// Read-only copy of a session taken under its lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Identifier of the attempt.
    pub session_id: Uuid,
    /// Conversation the session runs in.
    pub conversation_id: ConversationId,
    /// Player taking the quiz.
    pub player: Player,
    /// Phase at the time of the snapshot.
    pub phase: SessionPhase,
    /// Index of the question being played.
    pub current_index: usize,
    /// Size of the draw.
    pub question_count: usize,
    /// Question at the current index, correct answer included.
    pub current_question: Option<Question>,
    /// Points earned so far.
    pub score: u32,
    /// Questions answered correctly so far.
    pub correct_answers: usize,
    /// Token of the armed timer, if any.
    pub pending_timer: Option<TimerToken>,
    /// When the session was created.
    pub started_at: SystemTime,
    /// Last applied transition.
    pub last_activity_at: SystemTime,
}

impl SessionSnapshot {
    /// Identifier of the current question.
    pub fn current_question_id(&self) -> Option<QuestionId> {
        self.current_question.as_ref().map(Question::id)
    }
}

#[derive(Debug, Clone)]
struct QuestionMessage {
    session_id: Uuid,
    index: usize,
    handle: MessageHandle,
}

/// Per-conversation lock pair.
///
/// `session` serializes every mutation. `outbox` is taken before `session` is
/// released so that messages leave in mutation order; it is never held while
/// waiting for `session`.
#[derive(Debug, Default)]
pub struct ConversationSlot {
    session: Mutex<Option<QuizSession>>,
    outbox: Mutex<()>,
    question_message: StdMutex<Option<QuestionMessage>>,
}

impl ConversationSlot {
    /// Lock the session of this conversation.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            inner: self.session.lock().await,
        }
    }

    /// Lock the outbound queue of this conversation.
    pub async fn lock_outbox(&self) -> MutexGuard<'_, ()> {
        self.outbox.lock().await
    }

    /// Remember the message showing question `index` of `session_id`.
    pub fn record_question_message(&self, session_id: Uuid, index: usize, handle: MessageHandle) {
        let mut slot = self
            .question_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(QuestionMessage {
            session_id,
            index,
            handle,
        });
    }

    /// Handle of the message showing question `index` of `session_id`, if delivered.
    pub fn question_message(&self, session_id: Uuid, index: usize) -> Option<MessageHandle> {
        let slot = self
            .question_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|message| message.session_id == session_id && message.index == index)
            .map(|message| message.handle)
    }

    fn is_idle(&self) -> bool {
        self.session
            .try_lock()
            .map(|session| session.is_none())
            .unwrap_or(false)
    }
}

/// Exclusive access to the session of one conversation.
pub struct SessionGuard<'a> {
    inner: MutexGuard<'a, Option<QuizSession>>,
}

impl SessionGuard<'_> {
    /// Active session, if any.
    pub fn session(&self) -> Option<&QuizSession> {
        self.inner.as_ref()
    }

    /// Active session, mutably.
    pub fn session_mut(&mut self) -> Option<&mut QuizSession> {
        self.inner.as_mut()
    }

    /// Install `session`, disarming the timer of the one it replaces first.
    pub fn replace(&mut self, session: QuizSession) -> Option<QuizSession> {
        let previous = self.take();
        *self.inner = Some(session);
        previous
    }

    /// Remove the session, disarming its timer.
    pub fn take(&mut self) -> Option<QuizSession> {
        let mut previous = self.inner.take();
        if let Some(session) = previous.as_mut() {
            session.cancel_timer();
        }
        previous
    }
}

/// Sessions keyed by conversation.
///
/// The quiz engine locks a [`ConversationSlot`] directly so a session change
/// and its outbound messages stay ordered. [`SessionStore::put`] and
/// [`SessionStore::remove`] replace or drop a session without sending anything,
/// for callers that own no messenger.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: DashMap<ConversationId, Arc<ConversationSlot>>,
}

impl SessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of a conversation, created on first use.
    pub fn slot(&self, conversation_id: ConversationId) -> Arc<ConversationSlot> {
        self.slots
            .entry(conversation_id)
            .or_default()
            .value()
            .clone()
    }

    /// Snapshot of the active session of a conversation.
    pub async fn get(&self, conversation_id: ConversationId) -> Option<SessionSnapshot> {
        let slot = self
            .slots
            .get(&conversation_id)
            .map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        guard.session().map(QuizSession::snapshot)
    }

    /// Install a session, returning the one it superseded with its timer disarmed.
    pub async fn put(
        &self,
        conversation_id: ConversationId,
        session: QuizSession,
    ) -> Option<QuizSession> {
        let slot = self.slot(conversation_id);
        let mut guard = slot.lock().await;
        guard.replace(session)
    }

    /// Remove the session of a conversation, disarming its timer.
    pub async fn remove(&self, conversation_id: ConversationId) -> Option<QuizSession> {
        let removed = {
            let slot = self.slot(conversation_id);
            let mut guard = slot.lock().await;
            guard.take()
        };
        self.release(conversation_id);
        removed
    }

    /// Drop the slot of a conversation nobody is using.
    pub fn release(&self, conversation_id: ConversationId) {
        self.slots.remove_if(&conversation_id, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.is_idle()
        });
    }

    /// Number of conversations with a live session.
    pub fn active_sessions(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .session
                    .try_lock()
                    .map(|session| session.is_some())
                    .unwrap_or(true)
            })
            .count()
    }
}
