use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{FutureExt, future::BoxFuture};
use thiserror::Error;
use tracing::info;

use crate::{
    dao::models::QuestionEntity,
    state::question::{Question, QuestionError},
};

/// Failures while loading a question bank.
#[derive(Debug, Error)]
pub enum QuestionSourceError {
    /// The bank could not be read.
    #[error("failed to read question bank `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The bank is not valid JSON of the expected shape.
    #[error("failed to parse question bank `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The correct answer is not one of the options.
    #[error("question {id}: correct answer `{answer}` is not among its options")]
    UnknownCorrectAnswer { id: u32, answer: String },
    /// Two questions share an identifier.
    #[error("question id {id} is used more than once")]
    DuplicateId { id: u32 },
    /// A question is malformed.
    #[error(transparent)]
    Invalid(#[from] QuestionError),
}

/// Origin of the question bank.
pub trait QuestionSource: Send + Sync {
    fn load_all(&self) -> BoxFuture<'static, Result<Vec<Question>, QuestionSourceError>>;
}

/// Question bank stored as a JSON array of [`QuestionEntity`].
#[derive(Debug, Clone)]
pub struct JsonQuestionSource {
    path: Arc<Path>,
}

impl JsonQuestionSource {
    /// Source reading the file at `path` on every load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        Self {
            path: Arc::from(path),
        }
    }
}

impl QuestionSource for JsonQuestionSource {
    fn load_all(&self) -> BoxFuture<'static, Result<Vec<Question>, QuestionSourceError>> {
        let path = self.path.clone();
        async move {
            let contents =
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| QuestionSourceError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
            let entities: Vec<QuestionEntity> =
                serde_json::from_slice(&contents).map_err(|source| QuestionSourceError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            let questions = into_questions(entities)?;
            info!(path = %path.display(), count = questions.len(), "loaded question bank");
            Ok(questions)
        }
        .boxed()
    }
}

/// Convert raw bank entries, resolving each correct answer to its index.
pub fn into_questions(entities: Vec<QuestionEntity>) -> Result<Vec<Question>, QuestionSourceError> {
    let mut seen = std::collections::HashSet::new();
    entities
        .into_iter()
        .enumerate()
        .map(|(position, entity)| {
            let id = entity.id.unwrap_or(position as u32 + 1);
            if !seen.insert(id) {
                return Err(QuestionSourceError::DuplicateId { id });
            }

            let correct_index = entity
                .options
                .iter()
                .position(|option| option == &entity.correct_answer)
                .ok_or_else(|| QuestionSourceError::UnknownCorrectAnswer {
                    id,
                    answer: entity.correct_answer.clone(),
                })?;

            Ok(Question::new(
                id,
                entity.question,
                entity.options,
                correct_index,
            )?)
        })
        .collect()
}
