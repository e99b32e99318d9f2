//! Drives quiz sessions through presentation, answers, timeouts and completion.
//!
//! Every operation follows the same shape: lock the conversation, mutate the
//! session and collect the resulting [`Outbound`] messages, take the outbox,
//! release the session lock, then deliver. Messages of one conversation thus
//! leave in mutation order without holding the session across network calls.

use std::{sync::Arc, time::Duration};

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::QuizError,
    services::{messages, messenger::Messenger},
    state::{
        leaderboard::LeaderboardStore,
        question::{PresentedQuestion, QuestionId, QuestionSet},
        session::{
            ConversationId, ConversationSlot, Player, QuizSession, SessionGuard, SessionSnapshot,
            SessionStore,
        },
        state_machine::SessionPhase,
        timer::{QuestionTimer, TimerKind, TimerToken},
    },
};

/// Tunables of a quiz run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSettings {
    /// Questions drawn per session.
    pub questions_per_quiz: usize,
    /// Points for a correct answer.
    pub point_value: u32,
    /// Time allowed to answer one question.
    pub answer_timeout: Duration,
    /// Pause between feedback and the next question; zero advances at once.
    pub advance_delay: Duration,
    /// Ranking entries posted after a completed quiz; zero posts none.
    pub leaderboard_size: usize,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            questions_per_quiz: 5,
            point_value: 10,
            answer_timeout: Duration::from_secs(15),
            advance_delay: Duration::from_secs(2),
            leaderboard_size: 10,
        }
    }
}

/// An answer submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Text of the chosen option.
    pub option: String,
    /// Question the option was shown for, when the transport knows it.
    pub question_id: Option<QuestionId>,
}

impl Answer {
    /// Answer without question addressing.
    pub fn new(option: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            question_id: None,
        }
    }

    /// Address the answer to `question_id`.
    pub fn for_question(mut self, question_id: QuestionId) -> Self {
        self.question_id = Some(question_id);
        self
    }
}

/// Result of [`QuizEngine::answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The answer closed the open question.
    Accepted {
        /// Whether the option was the correct one.
        correct: bool,
        /// Session score after the answer.
        score: u32,
    },
    /// The option is not one of the current question's options.
    Ignored,
}

/// Result of a fired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The timer was still current and acted.
    Fired(TimerKind),
    /// The timer was superseded; nothing changed.
    Stale,
}

#[derive(Debug)]
struct Completion {
    session_id: Uuid,
    player: Player,
    score: u32,
    correct_answers: usize,
    question_count: usize,
}

impl From<&QuizSession> for Completion {
    fn from(session: &QuizSession) -> Self {
        Self {
            session_id: session.id(),
            player: session.player().clone(),
            score: session.score(),
            correct_answers: session.correct_answers(),
            question_count: session.question_count(),
        }
    }
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Question {
        session_id: Uuid,
        index: usize,
        question: PresentedQuestion,
    },
    /// Replaces the question message when its handle is known.
    Feedback {
        session_id: Uuid,
        index: usize,
        text: String,
    },
    Summary(Completion),
}

/// A question could not be shown; the session must not wait for an answer.
struct Undelivered {
    session_id: Uuid,
}

/// The quiz state machine bound to its collaborators.
#[derive(Clone)]
pub struct QuizEngine {
    sessions: Arc<SessionStore>,
    questions: Arc<RwLock<Arc<QuestionSet>>>,
    leaderboard: Arc<LeaderboardStore>,
    messenger: Arc<dyn Messenger>,
    settings: QuizSettings,
}

impl QuizEngine {
    /// Assemble an engine.
    pub fn new(
        sessions: Arc<SessionStore>,
        questions: QuestionSet,
        leaderboard: Arc<LeaderboardStore>,
        messenger: Arc<dyn Messenger>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            sessions,
            questions: Arc::new(RwLock::new(Arc::new(questions))),
            leaderboard,
            messenger,
            settings,
        }
    }

    /// Settings the engine runs with.
    pub fn settings(&self) -> QuizSettings {
        self.settings
    }

    /// Session store shared with the engine.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Leaderboard completed sessions are committed to.
    pub fn leaderboard(&self) -> &Arc<LeaderboardStore> {
        &self.leaderboard
    }

    /// Size of the current question bank.
    pub async fn question_bank_size(&self) -> usize {
        self.questions.read().await.len()
    }

    /// Swap the question bank; running sessions keep their draw.
    pub async fn reload_questions(&self, questions: QuestionSet) {
        let count = questions.len();
        *self.questions.write().await = Arc::new(questions);
        info!(count, "question bank replaced");
    }

    /// Snapshot of the session running in a conversation.
    pub async fn snapshot(&self, conversation_id: ConversationId) -> Option<SessionSnapshot> {
        self.sessions.get(conversation_id).await
    }

    /// Start a quiz, replacing any session running in the conversation.
    pub async fn start(
        &self,
        conversation_id: ConversationId,
        player: Player,
    ) -> Result<SessionSnapshot, QuizError> {
        let bank = self.questions.read().await.clone();
        let draw = bank.draw(self.settings.questions_per_quiz)?;

        let mut session = QuizSession::new(conversation_id, player, draw);
        session.begin()?;

        let mut outbound = vec![Outbound::Text(messages::welcome(
            session.player(),
            session.question_count(),
        ))];
        self.present(conversation_id, &mut session, &mut outbound);
        let snapshot = session.snapshot();

        let slot = self.sessions.slot(conversation_id);
        {
            let mut guard = slot.lock().await;
            if let Some(previous) = guard.replace(session) {
                info!(
                    conversation_id,
                    replaced_session = %previous.id(),
                    "running quiz replaced by a new one"
                );
            }
            info!(
                conversation_id,
                session_id = %snapshot.session_id,
                player_id = snapshot.player.id,
                questions = snapshot.question_count,
                "quiz started"
            );
            self.flush(conversation_id, &slot, guard, outbound).await;
        }
        self.release(conversation_id, slot);
        Ok(snapshot)
    }

    /// Apply an answer to the open question.
    pub async fn answer(
        &self,
        conversation_id: ConversationId,
        answer: Answer,
    ) -> Result<AnswerOutcome, QuizError> {
        let slot = self.sessions.slot(conversation_id);
        let outcome = {
            let mut guard = slot.lock().await;
            let mut outbound = Vec::new();
            let outcome = self.apply_answer(conversation_id, &mut guard, &answer, &mut outbound);
            if !outbound.is_empty() {
                self.flush(conversation_id, &slot, guard, outbound).await;
            }
            outcome
        };
        self.release(conversation_id, slot);
        outcome
    }

    /// Cancel the running quiz without committing its score.
    pub async fn cancel(&self, conversation_id: ConversationId) -> Result<(), QuizError> {
        let slot = self.sessions.slot(conversation_id);
        let cancelled = {
            let mut guard = slot.lock().await;
            let cancelled = match guard.session_mut() {
                Some(session) if !session.phase().is_terminal() => {
                    info!(
                        conversation_id,
                        session_id = %session.id(),
                        score = session.score(),
                        "quiz cancelled"
                    );
                    session.cancel().map_err(QuizError::from)
                }
                _ => Err(QuizError::NoActiveSession(conversation_id)),
            };
            if cancelled.is_ok() {
                guard.take();
                let outbound = vec![Outbound::Text(messages::cancelled())];
                self.flush(conversation_id, &slot, guard, outbound).await;
            }
            cancelled
        };
        self.release(conversation_id, slot);
        cancelled
    }

    /// Send a standalone text, ordered after pending quiz messages.
    pub async fn notify(&self, conversation_id: ConversationId, text: String) {
        let slot = self.sessions.slot(conversation_id);
        {
            let _outbox = slot.lock_outbox().await;
            if let Err(err) = self.messenger.send_text(conversation_id, text).await {
                warn!(conversation_id, error = %err, "failed to deliver notice");
            }
        }
        self.release(conversation_id, slot);
    }

    /// Act on a fired timer if `token` is still the session's pending timer.
    pub async fn handle_timer(
        &self,
        conversation_id: ConversationId,
        token: TimerToken,
    ) -> Result<TimerOutcome, QuizError> {
        let slot = self.sessions.slot(conversation_id);
        let outcome = {
            let mut guard = slot.lock().await;
            let kind = guard
                .session_mut()
                .and_then(|session| session.claim_timer(token));
            match kind {
                None => {
                    debug!(conversation_id, %token, "stale timer ignored");
                    Ok(TimerOutcome::Stale)
                }
                Some(kind) => {
                    let mut outbound = Vec::new();
                    let applied = match kind {
                        TimerKind::AnswerDeadline => {
                            self.expire_question(conversation_id, &mut guard, &mut outbound)
                        }
                        TimerKind::Advance => {
                            self.advance(conversation_id, &mut guard, &mut outbound)
                        }
                    };
                    self.flush(conversation_id, &slot, guard, outbound).await;
                    applied.map(|()| TimerOutcome::Fired(kind))
                }
            }
        };
        self.release(conversation_id, slot);
        outcome
    }

    fn apply_answer(
        &self,
        conversation_id: ConversationId,
        guard: &mut SessionGuard<'_>,
        answer: &Answer,
        outbound: &mut Vec<Outbound>,
    ) -> Result<AnswerOutcome, QuizError> {
        let point_value = self.settings.point_value;
        let Some(session) = guard.session_mut() else {
            return Err(QuizError::NoActiveSession(conversation_id));
        };
        let Some(question) = session.current_question() else {
            return Err(QuizError::NoActiveSession(conversation_id));
        };

        if let Some(given) = answer.question_id {
            let current = question.id();
            if given != current || session.phase() == SessionPhase::Advancing {
                debug!(conversation_id, given, current, "stale answer dropped");
                return Err(QuizError::StaleAnswer { given, current });
            }
        }
        if session.phase() != SessionPhase::AwaitingAnswer {
            return Err(QuizError::NoActiveSession(conversation_id));
        }
        if !question.has_option(&answer.option) {
            debug!(
                conversation_id,
                option = %answer.option,
                "answer outside the option set ignored"
            );
            return Ok(AnswerOutcome::Ignored);
        }

        let correct = question.is_correct(&answer.option);
        let feedback = if correct {
            messages::correct_answer(session.player())
        } else {
            messages::wrong_answer(question.correct_option())
        };

        session.cancel_timer();
        session.accept_answer(correct, point_value)?;
        debug_assert!(
            point_value == 0 || session.score() % point_value == 0,
            "score {} is not a multiple of {point_value}",
            session.score()
        );
        debug_assert!(
            session.score() as usize <= session.question_count() * point_value as usize,
            "score {} exceeds the maximum",
            session.score()
        );

        let score = session.score();
        debug!(
            conversation_id,
            session_id = %session.id(),
            index = session.current_index(),
            correct,
            score,
            "answer accepted"
        );
        outbound.push(Outbound::Feedback {
            session_id: session.id(),
            index: session.current_index(),
            text: feedback,
        });

        self.proceed(conversation_id, guard, outbound)?;
        Ok(AnswerOutcome::Accepted { correct, score })
    }

    fn expire_question(
        &self,
        conversation_id: ConversationId,
        guard: &mut SessionGuard<'_>,
        outbound: &mut Vec<Outbound>,
    ) -> Result<(), QuizError> {
        let Some(session) = guard.session_mut() else {
            return Ok(());
        };
        let Some(correct_option) = session
            .current_question()
            .map(|question| question.correct_option().to_string())
        else {
            return Ok(());
        };

        session.time_out()?;
        info!(
            conversation_id,
            session_id = %session.id(),
            index = session.current_index(),
            "question timed out"
        );
        outbound.push(Outbound::Feedback {
            session_id: session.id(),
            index: session.current_index(),
            text: messages::timed_out(&correct_option),
        });

        self.proceed(conversation_id, guard, outbound)
    }

    /// Leave `Advancing` now, or after the configured pause.
    fn proceed(
        &self,
        conversation_id: ConversationId,
        guard: &mut SessionGuard<'_>,
        outbound: &mut Vec<Outbound>,
    ) -> Result<(), QuizError> {
        if self.settings.advance_delay.is_zero() {
            return self.advance(conversation_id, guard, outbound);
        }
        if let Some(session) = guard.session_mut() {
            self.arm_timer(
                conversation_id,
                session,
                TimerKind::Advance,
                self.settings.advance_delay,
            );
        }
        Ok(())
    }

    fn advance(
        &self,
        conversation_id: ConversationId,
        guard: &mut SessionGuard<'_>,
        outbound: &mut Vec<Outbound>,
    ) -> Result<(), QuizError> {
        let Some(session) = guard.session_mut() else {
            return Ok(());
        };

        if session.has_next_question() {
            session.next_question()?;
            self.present(conversation_id, session, outbound);
            return Ok(());
        }

        session.complete()?;
        if let Some(finished) = guard.take() {
            info!(
                conversation_id,
                session_id = %finished.id(),
                player_id = finished.player().id,
                score = finished.score(),
                "quiz completed"
            );
            outbound.push(Outbound::Summary(Completion::from(&finished)));
        }
        Ok(())
    }

    fn present(
        &self,
        conversation_id: ConversationId,
        session: &mut QuizSession,
        outbound: &mut Vec<Outbound>,
    ) {
        if let Some(question) = session.present_current() {
            outbound.push(Outbound::Question {
                session_id: session.id(),
                index: session.current_index(),
                question,
            });
        }
        self.arm_timer(
            conversation_id,
            session,
            TimerKind::AnswerDeadline,
            self.settings.answer_timeout,
        );
    }

    fn arm_timer(
        &self,
        conversation_id: ConversationId,
        session: &mut QuizSession,
        kind: TimerKind,
        delay: Duration,
    ) {
        let token = TimerToken::new();
        let engine = self.clone();
        session.install_timer(QuestionTimer::arm(token, kind, delay, async move {
            if let Err(err) = engine.handle_timer(conversation_id, token).await {
                warn!(conversation_id, %token, error = %err, "timer could not be applied");
            }
        }));
    }

    /// Take the outbox, release the session, then deliver.
    async fn flush(
        &self,
        conversation_id: ConversationId,
        slot: &ConversationSlot,
        guard: SessionGuard<'_>,
        outbound: Vec<Outbound>,
    ) {
        let undelivered = {
            let _outbox = slot.lock_outbox().await;
            drop(guard);
            self.deliver(conversation_id, slot, outbound).await
        };

        if let Err(Undelivered { session_id }) = undelivered {
            self.abandon(conversation_id, slot, session_id).await;
        }
    }

    async fn deliver(
        &self,
        conversation_id: ConversationId,
        slot: &ConversationSlot,
        outbound: Vec<Outbound>,
    ) -> Result<(), Undelivered> {
        for message in outbound {
            match message {
                Outbound::Text(text) => self.send_text(conversation_id, text).await,
                Outbound::Question {
                    session_id,
                    index,
                    question,
                } => match self.messenger.send_question(conversation_id, question).await {
                    Ok(handle) => slot.record_question_message(session_id, index, handle),
                    Err(err) => {
                        error!(
                            conversation_id,
                            %session_id,
                            index,
                            error = %err,
                            "question could not be delivered"
                        );
                        return Err(Undelivered { session_id });
                    }
                },
                Outbound::Feedback {
                    session_id,
                    index,
                    text,
                } => match slot.question_message(session_id, index) {
                    Some(handle) => {
                        if let Err(err) = self.messenger.edit_message(handle, text.clone()).await {
                            debug!(
                                conversation_id,
                                %handle,
                                error = %err,
                                "edit failed; sending feedback as text"
                            );
                            self.send_text(conversation_id, text).await;
                        }
                    }
                    None => self.send_text(conversation_id, text).await,
                },
                Outbound::Summary(completion) => {
                    let rank = self.commit(conversation_id, &completion).await;
                    let text = messages::summary(
                        &completion.player,
                        completion.score,
                        completion.correct_answers,
                        completion.question_count,
                        rank,
                    );
                    self.send_text(conversation_id, text).await;

                    if self.settings.leaderboard_size > 0 {
                        let top = self.leaderboard.top(self.settings.leaderboard_size).await;
                        let ranking = messages::leaderboard(&top, self.leaderboard.mode());
                        self.send_text(conversation_id, ranking).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn send_text(&self, conversation_id: ConversationId, text: String) {
        if let Err(err) = self.messenger.send_text(conversation_id, text).await {
            warn!(conversation_id, error = %err, "failed to deliver message");
        }
    }

    /// Merge a finished session into the leaderboard, retrying once.
    async fn commit(
        &self,
        conversation_id: ConversationId,
        completion: &Completion,
    ) -> Option<usize> {
        let player_id = completion.player.id;
        let label = completion.player.label();

        let mut merged = self.leaderboard.merge(player_id, &label, completion.score).await;
        if let Err(err) = &merged {
            warn!(
                conversation_id,
                session_id = %completion.session_id,
                player_id,
                error = %err,
                "leaderboard merge failed; retrying once"
            );
            merged = self.leaderboard.merge(player_id, &label, completion.score).await;
        }

        match merged {
            Ok(_) => self.leaderboard.rank_of(player_id).await,
            Err(err) => {
                error!(
                    conversation_id,
                    session_id = %completion.session_id,
                    player_id,
                    score = completion.score,
                    error = %err,
                    "score could not be committed to the leaderboard"
                );
                None
            }
        }
    }

    /// Cancel a session whose question never reached the player.
    async fn abandon(
        &self,
        conversation_id: ConversationId,
        slot: &ConversationSlot,
        session_id: Uuid,
    ) {
        let mut guard = slot.lock().await;
        let current = guard
            .session()
            .is_some_and(|session| session.id() == session_id);
        if !current {
            return;
        }
        if let Some(Err(err)) = guard.session_mut().map(QuizSession::cancel) {
            debug!(
                conversation_id,
                %session_id,
                error = %err,
                "abandoned session was already closed"
            );
        }
        guard.take();
        warn!(conversation_id, %session_id, "quiz cancelled after failed delivery");
    }

    fn release(&self, conversation_id: ConversationId, slot: Arc<ConversationSlot>) {
        drop(slot);
        self.sessions.release(conversation_id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{
        dao::leaderboard_store::InMemoryLeaderboard,
        services::messenger::RetryingMessenger,
        state::{
            leaderboard::ScoringMode,
            question::{InsufficientQuestions, Question},
        },
        testing::RecordingMessenger,
    };

    use super::*;

    const CONVERSATION: ConversationId = 100;

    struct Harness {
        engine: QuizEngine,
        messenger: RecordingMessenger,
        repository: InMemoryLeaderboard,
        answers: HashMap<QuestionId, String>,
    }

    impl Harness {
        async fn new(bank: Vec<Question>, settings: QuizSettings) -> Self {
            Self::with_messenger(bank, settings, |recording| {
                Arc::new(recording) as Arc<dyn Messenger>
            })
                .await
        }

        async fn with_messenger(
            bank: Vec<Question>,
            settings: QuizSettings,
            wrap: impl FnOnce(RecordingMessenger) -> Arc<dyn Messenger>,
        ) -> Self {
            let messenger = RecordingMessenger::new();
            let repository = InMemoryLeaderboard::new();
            let leaderboard = Arc::new(
                LeaderboardStore::open(Arc::new(repository.clone()), ScoringMode::Best).await,
            );
            let answers = bank
                .iter()
                .map(|q| (q.id(), q.correct_option().to_string()))
                .collect();
            let engine = QuizEngine::new(
                Arc::new(SessionStore::new()),
                QuestionSet::new(bank),
                leaderboard,
                wrap(messenger.clone()),
                settings,
            );
            Self {
                engine,
                messenger,
                repository,
                answers,
            }
        }

        fn current(&self) -> PresentedQuestion {
            self.messenger
                .questions(CONVERSATION)
                .pop()
                .expect("a question was presented")
        }

        fn right(&self, question: &PresentedQuestion) -> Answer {
            Answer::new(self.answers[&question.question_id].clone())
                .for_question(question.question_id)
        }

        fn wrong(&self, question: &PresentedQuestion) -> Answer {
            let correct = &self.answers[&question.question_id];
            let option = question
                .options
                .iter()
                .find(|o| *o != correct)
                .expect("a wrong option exists");
            Answer::new(option.clone()).for_question(question.question_id)
        }
    }

    fn bank() -> Vec<Question> {
        vec![
            Question::new(1, "Q1", vec!["A".into(), "B".into()], 0).unwrap(),
            Question::new(2, "Q2", vec!["A".into(), "B".into()], 1).unwrap(),
        ]
    }

    fn instant(questions_per_quiz: usize) -> QuizSettings {
        QuizSettings {
            questions_per_quiz,
            point_value: 10,
            answer_timeout: Duration::from_secs(15),
            advance_delay: Duration::ZERO,
            leaderboard_size: 10,
        }
    }

    fn ada() -> Player {
        Player::new(7, "Ada").with_username("ada")
    }

    #[tokio::test(start_paused = true)]
    async fn two_question_quiz_scores_and_commits() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();

        let first = h.current();
        let outcome = h.engine.answer(CONVERSATION, h.right(&first)).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Accepted { correct: true, score: 10 });

        let second = h.current();
        assert_ne!(first.question_id, second.question_id);
        assert_eq!(second.number, 2);
        let outcome = h.engine.answer(CONVERSATION, h.wrong(&second)).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Accepted { correct: false, score: 10 });

        let edits: Vec<String> = h.messenger.edits().into_iter().map(|(_, text)| text).collect();
        assert_eq!(edits[0], "✅ Yes, Ada @ada!");
        assert_eq!(
            edits[1],
            format!("❌ The correct answer is *{}*.", h.answers[&second.question_id])
        );

        assert!(h.engine.snapshot(CONVERSATION).await.is_none());
        let entry = h.engine.leaderboard().entry(7).await.unwrap();
        assert_eq!(entry.best_score, 10);
        assert_eq!(entry.games_played, 1);
        assert_eq!(entry.display_name, "Ada (@ada)");

        let texts = h.messenger.texts(CONVERSATION);
        assert!(texts[0].starts_with("Welcome to the quiz, Ada!"));
        let summary = &texts[texts.len() - 2];
        assert!(summary.contains("You scored 10 points (1/2 correct)"));
        assert!(summary.contains("#1"));
        assert_eq!(
            texts.last().unwrap(),
            "🎉 Global ranking\n🥇 1. Ada (@ada)   10 points (games: 1)\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_question_times_out() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();
        let first = h.current();

        tokio::time::sleep(Duration::from_secs(16)).await;

        let (_, text) = h.messenger.edits().pop().unwrap();
        assert_eq!(
            text,
            format!("⌛ Time's up! The correct answer is *{}*.", h.answers[&first.question_id])
        );
        let snapshot = h.engine.snapshot(CONVERSATION).await.unwrap();
        assert_eq!(snapshot.current_index, 1);
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.phase, SessionPhase::AwaitingAnswer);

        let err = h.engine.answer(CONVERSATION, h.right(&first)).await.unwrap_err();
        assert!(matches!(err, QuizError::StaleAnswer { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn last_timeout_completes_the_quiz() {
        let h = Harness::new(bank(), instant(1)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(16)).await;

        assert!(h.engine.snapshot(CONVERSATION).await.is_none());
        assert_eq!(h.engine.leaderboard().entry(7).await.unwrap().best_score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_accepted_answer_is_a_no_op() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();
        let first = h.current();
        let deadline = h.engine.snapshot(CONVERSATION).await.unwrap().pending_timer.unwrap();

        h.engine.answer(CONVERSATION, h.right(&first)).await.unwrap();
        let before = h.engine.snapshot(CONVERSATION).await.unwrap();

        let outcome = h.engine.handle_timer(CONVERSATION, deadline).await.unwrap();
        assert_eq!(outcome, TimerOutcome::Stale);

        let after = h.engine.snapshot(CONVERSATION).await.unwrap();
        assert_eq!(after.score, before.score);
        assert_eq!(after.current_index, before.current_index);
        assert_eq!(after.pending_timer, before.pending_timer);
    }

    #[tokio::test(start_paused = true)]
    async fn racing_answers_apply_once() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();
        let first = h.current();

        let (a, b) = tokio::join!(
            h.engine.answer(CONVERSATION, h.right(&first)),
            h.engine.answer(CONVERSATION, h.right(&first)),
        );

        let accepted = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Ok(AnswerOutcome::Accepted { .. })))
            .count();
        assert_eq!(accepted, 1);
        assert!([a, b].into_iter().any(|r| matches!(r, Err(QuizError::StaleAnswer { .. }))));
        assert_eq!(h.engine.snapshot(CONVERSATION).await.unwrap().score, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_invalidates_the_previous_timer() {
        let h = Harness::new(bank(), instant(2)).await;
        let old = h.engine.start(CONVERSATION, ada()).await.unwrap();
        h.engine.answer(CONVERSATION, h.right(&h.current())).await.unwrap();
        let old_token = h.engine.snapshot(CONVERSATION).await.unwrap().pending_timer.unwrap();

        let new = h.engine.start(CONVERSATION, ada()).await.unwrap();
        assert_ne!(new.session_id, old.session_id);

        let outcome = h.engine.handle_timer(CONVERSATION, old_token).await.unwrap();
        assert_eq!(outcome, TimerOutcome::Stale);

        let snapshot = h.engine.snapshot(CONVERSATION).await.unwrap();
        assert_eq!(snapshot.session_id, new.session_id);
        assert_eq!(snapshot.current_index, 0);
        assert_eq!(snapshot.score, 0);
        assert!(h.engine.leaderboard().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn small_bank_refuses_to_start() {
        let h = Harness::new(bank(), instant(5)).await;

        let err = h.engine.start(CONVERSATION, ada()).await.unwrap_err();
        assert!(matches!(
            err,
            QuizError::InsufficientQuestions(InsufficientQuestions { requested: 5, available: 2 })
        ));
        assert!(h.engine.snapshot(CONVERSATION).await.is_none());
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn answers_without_a_session_are_rejected() {
        let h = Harness::new(bank(), instant(2)).await;
        let err = h.engine.answer(CONVERSATION, Answer::new("A")).await.unwrap_err();
        assert!(matches!(err, QuizError::NoActiveSession(CONVERSATION)));
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_options_are_ignored() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();
        let sent = h.messenger.sent().len();

        let outcome = h.engine.answer(CONVERSATION, Answer::new("Z")).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Ignored);
        assert_eq!(h.messenger.sent().len(), sent);

        let snapshot = h.engine.snapshot(CONVERSATION).await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::AwaitingAnswer);
        assert_eq!(snapshot.score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_waits_for_the_configured_delay() {
        let settings = QuizSettings {
            advance_delay: Duration::from_secs(2),
            ..instant(2)
        };
        let h = Harness::new(bank(), settings).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();
        let option = h.answers[&h.current().question_id].clone();
        h.engine
            .answer(CONVERSATION, Answer::new(option))
            .await
            .unwrap();

        let snapshot = h.engine.snapshot(CONVERSATION).await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::Advancing);
        let err = h.engine.answer(CONVERSATION, Answer::new("A")).await.unwrap_err();
        assert!(matches!(err, QuizError::NoActiveSession(_)));
        assert_eq!(h.messenger.questions(CONVERSATION).len(), 1);

        tokio::time::sleep(Duration::from_millis(2100)).await;

        let snapshot = h.engine.snapshot(CONVERSATION).await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::AwaitingAnswer);
        assert_eq!(snapshot.current_index, 1);
        assert_eq!(h.messenger.questions(CONVERSATION).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_skips_the_leaderboard() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();
        h.engine.answer(CONVERSATION, h.right(&h.current())).await.unwrap();

        h.engine.cancel(CONVERSATION).await.unwrap();
        assert!(h.engine.snapshot(CONVERSATION).await.is_none());
        assert_eq!(h.messenger.texts(CONVERSATION).last().unwrap(), "Quiz cancelled.");
        assert!(h.engine.leaderboard().is_empty().await);

        let err = h.engine.cancel(CONVERSATION).await.unwrap_err();
        assert!(matches!(err, QuizError::NoActiveSession(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_transport_failure_is_retried() {
        let h = Harness::with_messenger(bank(), instant(2), |recording| {
            Arc::new(RetryingMessenger::new(Arc::new(recording), Duration::from_millis(500)))
                as Arc<dyn Messenger>
        })
        .await;
        h.messenger.fail_next(1);

        h.engine.start(CONVERSATION, ada()).await.unwrap();
        assert_eq!(h.messenger.questions(CONVERSATION).len(), 1);
        assert!(h.engine.snapshot(CONVERSATION).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn undeliverable_question_cancels_the_session() {
        let h = Harness::with_messenger(bank(), instant(2), |recording| {
            Arc::new(RetryingMessenger::new(Arc::new(recording), Duration::from_millis(500)))
                as Arc<dyn Messenger>
        })
        .await;
        h.messenger.fail_always(true);

        h.engine.start(CONVERSATION, ada()).await.unwrap();
        assert!(h.engine.snapshot(CONVERSATION).await.is_none());
        assert_eq!(h.engine.sessions().active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_commit_still_delivers_the_summary() {
        let h = Harness::new(bank(), instant(1)).await;
        h.repository.fail_saves(true);

        h.engine.start(CONVERSATION, ada()).await.unwrap();
        h.engine.answer(CONVERSATION, h.right(&h.current())).await.unwrap();

        let mut texts = h.messenger.texts(CONVERSATION);
        assert_eq!(texts.pop().unwrap(), "No high scores yet!");
        let summary = texts.pop().unwrap();
        assert!(summary.contains("You scored 10 points"));
        assert!(summary.contains("could not be saved"));
        assert!(h.engine.leaderboard().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn conversations_run_independently() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(1, Player::new(1, "One")).await.unwrap();
        h.engine.start(2, Player::new(2, "Two")).await.unwrap();

        h.engine.cancel(1).await.unwrap();
        assert!(h.engine.snapshot(1).await.is_none());
        assert_eq!(h.engine.snapshot(2).await.unwrap().player.id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_keeps_running_draws() {
        let h = Harness::new(bank(), instant(2)).await;
        h.engine.start(CONVERSATION, ada()).await.unwrap();

        h.engine.reload_questions(QuestionSet::default()).await;
        assert_eq!(h.engine.question_bank_size().await, 0);

        h.engine.answer(CONVERSATION, h.right(&h.current())).await.unwrap();
        assert_eq!(h.engine.snapshot(CONVERSATION).await.unwrap().current_index, 1);
        assert!(h.engine.start(2, ada()).await.is_err());
    }
}
