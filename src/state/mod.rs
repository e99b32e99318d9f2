//! Domain state: questions, sessions, timers and the leaderboard.

pub mod leaderboard;
pub mod question;
pub mod session;
mod sse;
pub mod state_machine;
pub mod timer;

use std::sync::Arc;

use tracing::info;

use crate::{
    config::AppConfig,
    dao::{
        leaderboard_store::{InMemoryLeaderboard, JsonFileLeaderboard, LeaderboardRepository},
        question_source::{JsonQuestionSource, QuestionSource, QuestionSourceError},
    },
    services::{
        chat_bridge::ChatBridge, messenger::RetryingMessenger, quiz_engine::QuizEngine,
        quiz_service::QuizService,
    },
    state::{leaderboard::LeaderboardStore, question::QuestionSet, session::SessionStore},
};

pub use self::sse::SseHub;

/// Handle to the application state shared by every handler.
pub type SharedState = Arc<AppState>;

/// Central application state shared by the HTTP handlers.
pub struct AppState {
    quiz: QuizService,
    bridge: Arc<ChatBridge>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(quiz: QuizService, bridge: Arc<ChatBridge>, config: AppConfig) -> SharedState {
        Arc::new(Self {
            quiz,
            bridge,
            config,
        })
    }

    /// Command façade.
    pub fn quiz(&self) -> &QuizService {
        &self.quiz
    }

    /// Quiz engine behind the façade.
    pub fn engine(&self) -> &QuizEngine {
        self.quiz.engine()
    }

    /// Outbound message streams.
    pub fn bridge(&self) -> &Arc<ChatBridge> {
        &self.bridge
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Wire every component described by `config`.
///
/// Fails when the question bank cannot be loaded; an unreadable leaderboard
/// only starts empty.
pub async fn bootstrap(config: AppConfig) -> Result<SharedState, QuestionSourceError> {
    let source: Arc<dyn QuestionSource> = Arc::new(JsonQuestionSource::new(&config.questions_path));
    let questions = source.load_all().await?;

    let repository: Arc<dyn LeaderboardRepository> = match &config.leaderboard_path {
        Some(path) => Arc::new(JsonFileLeaderboard::new(path)),
        None => {
            info!("no leaderboard file configured; scores are kept in memory");
            Arc::new(InMemoryLeaderboard::new())
        }
    };
    let leaderboard = Arc::new(LeaderboardStore::open(repository, config.scoring_mode).await);

    let bridge = Arc::new(ChatBridge::new(config.stream_capacity));
    let messenger = Arc::new(RetryingMessenger::new(
        bridge.clone(),
        config.transport_retry_backoff,
    ));

    let engine = QuizEngine::new(
        Arc::new(SessionStore::new()),
        QuestionSet::new(questions),
        leaderboard,
        messenger,
        config.quiz_settings(),
    );
    let quiz = QuizService::new(engine, source, config.leaderboard_size);

    Ok(AppState::new(quiz, bridge, config))
}
