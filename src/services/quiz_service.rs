//! Command façade in front of the quiz engine and the leaderboard.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::question_source::QuestionSource,
    error::{QuizError, ServiceError},
    services::{
        messages,
        quiz_engine::{Answer, AnswerOutcome, QuizEngine},
    },
    state::{
        leaderboard::RankedEntry,
        question::{QuestionId, QuestionSet},
        session::{ConversationId, Player},
    },
};

/// Commands understood by the quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a new quiz.
    Start,
    /// Answer the open question.
    Answer(Answer),
    /// Stop the running quiz.
    Cancel,
    /// Show the running score.
    Score,
    /// Show the top of the leaderboard.
    Leaderboard,
    /// Show the command overview.
    Help,
}

impl Command {
    /// Parse chat text such as `/start`, `start@QuizBot` or `answer:Paris`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix('/').unwrap_or(text);

        if let Some((keyword, option)) = text.split_once(':') {
            if keyword.trim().eq_ignore_ascii_case("answer") {
                let option = option.trim();
                return (!option.is_empty()).then(|| Command::Answer(Answer::new(option)));
            }
            return None;
        }

        let keyword = text
            .split_whitespace()
            .next()?
            .split('@')
            .next()?
            .to_ascii_lowercase();
        match keyword.as_str() {
            "start" => Some(Command::Start),
            "cancel" | "end" => Some(Command::Cancel),
            "score" => Some(Command::Score),
            "leaderboard" => Some(Command::Leaderboard),
            "help" => Some(Command::Help),
            _ => None,
        }
    }

    /// Attach the question an answer was given for.
    pub fn addressed_to(self, question_id: Option<QuestionId>) -> Self {
        match (self, question_id) {
            (Command::Answer(answer), Some(id)) => Command::Answer(answer.for_question(id)),
            (command, _) => command,
        }
    }
}

/// What a command did, reported back to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// A quiz started.
    Started {
        /// Identifier of the new session.
        session_id: Uuid,
        /// Questions in the draw.
        question_count: usize,
    },
    /// The answer closed the open question.
    Answered {
        /// Whether it was the correct option.
        correct: bool,
        /// Score after the answer.
        score: u32,
    },
    /// The option does not belong to the open question.
    Ignored,
    /// The answer targeted a question that is already closed.
    Stale,
    /// The running quiz was cancelled.
    Cancelled,
    /// The running score was sent.
    Score {
        /// Points so far.
        score: u32,
        /// 1-based number of the current question.
        question: usize,
        /// Questions in the draw.
        question_count: usize,
    },
    /// The leaderboard was sent.
    Leaderboard {
        /// Entries shown.
        entries: usize,
    },
    /// The help text was sent.
    Help,
    /// The command needs a running quiz.
    NoActiveSession,
    /// The question bank cannot fill a quiz.
    QuizUnavailable,
    /// The text is not a quiz command.
    Unknown,
}

/// Façade translating commands into engine and leaderboard calls.
pub struct QuizService {
    engine: QuizEngine,
    source: Arc<dyn QuestionSource>,
    leaderboard_size: usize,
}

impl QuizService {
    /// Assemble the service.
    pub fn new(
        engine: QuizEngine,
        source: Arc<dyn QuestionSource>,
        leaderboard_size: usize,
    ) -> Self {
        Self {
            engine,
            source,
            leaderboard_size,
        }
    }

    /// Engine behind the service.
    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    /// Parse and run a chat command; text that is not a command is ignored.
    pub async fn dispatch(
        &self,
        conversation_id: ConversationId,
        player: Player,
        text: &str,
        question_id: Option<QuestionId>,
    ) -> Result<CommandOutcome, ServiceError> {
        let Some(command) = Command::parse(text) else {
            debug!(conversation_id, text, "not a quiz command");
            return Ok(CommandOutcome::Unknown);
        };

        match command.addressed_to(question_id) {
            Command::Start => self.start(conversation_id, player).await,
            Command::Answer(answer) => self.answer(conversation_id, answer).await,
            Command::Cancel => self.cancel(conversation_id).await,
            Command::Score => Ok(self.score(conversation_id).await),
            Command::Leaderboard => Ok(self.leaderboard(conversation_id).await),
            Command::Help => Ok(self.help(conversation_id).await),
        }
    }

    /// Start a quiz for `player`.
    pub async fn start(
        &self,
        conversation_id: ConversationId,
        player: Player,
    ) -> Result<CommandOutcome, ServiceError> {
        match self.engine.start(conversation_id, player).await {
            Ok(snapshot) => Ok(CommandOutcome::Started {
                session_id: snapshot.session_id,
                question_count: snapshot.question_count,
            }),
            Err(QuizError::InsufficientQuestions(err)) => {
                warn!(conversation_id, error = %err, "quiz unavailable");
                self.engine
                    .notify(conversation_id, messages::quiz_unavailable())
                    .await;
                Ok(CommandOutcome::QuizUnavailable)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Answer the open question.
    pub async fn answer(
        &self,
        conversation_id: ConversationId,
        answer: Answer,
    ) -> Result<CommandOutcome, ServiceError> {
        match self.engine.answer(conversation_id, answer).await {
            Ok(AnswerOutcome::Accepted { correct, score }) => {
                Ok(CommandOutcome::Answered { correct, score })
            }
            Ok(AnswerOutcome::Ignored) => Ok(CommandOutcome::Ignored),
            Err(QuizError::StaleAnswer { .. }) => Ok(CommandOutcome::Stale),
            Err(QuizError::NoActiveSession(_)) => Ok(self.no_active_session(conversation_id).await),
            Err(err) => Err(err.into()),
        }
    }

    /// Cancel the running quiz.
    pub async fn cancel(
        &self,
        conversation_id: ConversationId,
    ) -> Result<CommandOutcome, ServiceError> {
        match self.engine.cancel(conversation_id).await {
            Ok(()) => Ok(CommandOutcome::Cancelled),
            Err(QuizError::NoActiveSession(_)) => Ok(self.no_active_session(conversation_id).await),
            Err(err) => Err(err.into()),
        }
    }

    /// Send the running score.
    pub async fn score(&self, conversation_id: ConversationId) -> CommandOutcome {
        let Some(snapshot) = self.engine.snapshot(conversation_id).await else {
            return self.no_active_session(conversation_id).await;
        };

        self.engine
            .notify(conversation_id, messages::progress(&snapshot))
            .await;
        CommandOutcome::Score {
            score: snapshot.score,
            question: snapshot.current_index + 1,
            question_count: snapshot.question_count,
        }
    }

    /// Send the top of the leaderboard.
    pub async fn leaderboard(&self, conversation_id: ConversationId) -> CommandOutcome {
        let top = self.top(self.leaderboard_size).await;
        let mode = self.engine.leaderboard().mode();
        self.engine
            .notify(conversation_id, messages::leaderboard(&top, mode))
            .await;
        CommandOutcome::Leaderboard { entries: top.len() }
    }

    /// Send the command overview.
    pub async fn help(&self, conversation_id: ConversationId) -> CommandOutcome {
        self.engine.notify(conversation_id, messages::help()).await;
        CommandOutcome::Help
    }

    /// The `limit` best leaderboard entries.
    pub async fn top(&self, limit: usize) -> Vec<RankedEntry> {
        self.engine.leaderboard().top(limit).await
    }

    /// Default number of leaderboard entries shown.
    pub fn leaderboard_size(&self) -> usize {
        self.leaderboard_size
    }

    /// Reload the question bank, keeping the current one on failure.
    pub async fn reload_questions(&self) -> Result<usize, ServiceError> {
        let questions = self.source.load_all().await.map_err(|err| {
            warn!(error = %err, "question bank reload failed; keeping the current bank");
            ServiceError::from(err)
        })?;

        let count = questions.len();
        self.engine.reload_questions(QuestionSet::new(questions)).await;
        info!(count, "question bank reloaded");
        Ok(count)
    }

    async fn no_active_session(&self, conversation_id: ConversationId) -> CommandOutcome {
        self.engine
            .notify(conversation_id, messages::no_active_session())
            .await;
        CommandOutcome::NoActiveSession
    }
}
