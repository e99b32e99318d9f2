//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::DurationMilliSeconds;
use tracing::{info, warn};

use crate::{services::quiz_engine::QuizSettings, state::leaderboard::ScoringMode};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CHAT_QUIZ_BACK_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Question bank file.
    pub questions_path: PathBuf,
    /// Leaderboard file; `None` keeps the leaderboard in memory.
    pub leaderboard_path: Option<PathBuf>,
    /// Questions drawn per quiz.
    pub questions_per_quiz: usize,
    /// Points for a correct answer.
    pub point_value: u32,
    /// Time allowed to answer one question.
    #[serde(
        rename = "answer_timeout_ms",
        with = "serde_with::As::<DurationMilliSeconds<u64>>"
    )]
    pub answer_timeout: Duration,
    /// Pause between feedback and the next question.
    #[serde(
        rename = "advance_delay_ms",
        with = "serde_with::As::<DurationMilliSeconds<u64>>"
    )]
    pub advance_delay: Duration,
    /// Entries shown by the leaderboard command.
    pub leaderboard_size: usize,
    /// Score ranking the leaderboard.
    pub scoring_mode: ScoringMode,
    /// Wait before retrying a failed delivery.
    #[serde(
        rename = "transport_retry_backoff_ms",
        with = "serde_with::As::<DurationMilliSeconds<u64>>"
    )]
    pub transport_retry_backoff: Duration,
    /// Events buffered per conversation stream.
    pub stream_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(resolve_config_path())
    }

    /// Load the configuration at `path`, falling back to defaults.
    pub fn load_from(path: PathBuf) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        questions_path = %config.questions_path.display(),
                        scoring_mode = ?config.scoring_mode,
                        "loaded config"
                    );
                    config.sanitized()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Engine tunables derived from this configuration.
    pub fn quiz_settings(&self) -> QuizSettings {
        QuizSettings {
            questions_per_quiz: self.questions_per_quiz,
            point_value: self.point_value,
            answer_timeout: self.answer_timeout,
            advance_delay: self.advance_delay,
            leaderboard_size: self.leaderboard_size,
        }
    }

    /// Replace values the engine cannot run with.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.questions_per_quiz == 0 {
            warn!("questions_per_quiz must be positive; using the default");
            self.questions_per_quiz = defaults.questions_per_quiz;
        }
        if self.answer_timeout.is_zero() {
            warn!("answer_timeout_ms must be positive; using the default");
            self.answer_timeout = defaults.answer_timeout;
        }
        if self.stream_capacity == 0 {
            self.stream_capacity = defaults.stream_capacity;
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            questions_path: PathBuf::from("questions.json"),
            leaderboard_path: Some(PathBuf::from("leaderboard.json")),
            questions_per_quiz: 5,
            point_value: 10,
            answer_timeout: Duration::from_secs(15),
            advance_delay: Duration::from_secs(2),
            leaderboard_size: 10,
            scoring_mode: ScoringMode::Best,
            transport_retry_backoff: Duration::from_millis(500),
            stream_capacity: 32,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
