use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::question_source::QuestionSourceError,
    state::{
        question::{InsufficientQuestions, QuestionId},
        session::ConversationId,
        state_machine::InvalidTransition,
    },
};

/// Errors raised by the quiz engine.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The question bank cannot fill a quiz.
    #[error(transparent)]
    InsufficientQuestions(#[from] InsufficientQuestions),
    /// No session is waiting for this command.
    #[error("no active quiz in conversation {0}")]
    NoActiveSession(ConversationId),
    /// The answer targets a question that is no longer open.
    #[error("answer for question {given} arrived while question {current} is current")]
    StaleAnswer {
        given: QuestionId,
        current: QuestionId,
    },
    /// The session refused the event in its current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The question bank could not be loaded.
    #[error("question bank unavailable")]
    Questions(#[source] QuestionSourceError),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<QuestionSourceError> for ServiceError {
    fn from(err: QuestionSourceError) -> Self {
        ServiceError::Questions(err)
    }
}

impl From<QuizError> for ServiceError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::NoActiveSession(conversation_id) => {
                ServiceError::NotFound(format!("no active quiz in conversation {conversation_id}"))
            }
            other => ServiceError::InvalidState(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Questions(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
