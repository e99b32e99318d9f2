use std::collections::HashSet;

use rand::{Rng, rng, seq::SliceRandom};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Identifier of a question inside its bank.
pub type QuestionId = u32;

/// Reasons a question definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// Prompt text is blank.
    #[error("question {id} has an empty prompt")]
    EmptyPrompt { id: QuestionId },
    /// Fewer than two options were supplied.
    #[error("question {id} needs at least two options (got {count})")]
    TooFewOptions { id: QuestionId, count: usize },
    /// An option is blank.
    #[error("question {id} has an empty option")]
    EmptyOption { id: QuestionId },
    /// The same option text appears twice.
    #[error("question {id} lists option `{option}` more than once")]
    DuplicateOption { id: QuestionId, option: String },
    /// The correct index points outside the options.
    #[error("question {id} marks option {index} as correct but only has {count}")]
    CorrectIndexOutOfRange {
        id: QuestionId,
        index: usize,
        count: usize,
    },
}

/// The bank cannot serve a draw of the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("requested {requested} questions but the bank only holds {available}")]
pub struct InsufficientQuestions {
    /// Draw size asked for.
    pub requested: usize,
    /// Questions in the bank.
    pub available: usize,
}

/// A multiple-choice question.
///
/// Options are unique, so the option text is the answer's identity. Shuffling
/// remaps `correct_index` and never changes which text is correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
}

impl Question {
    /// Build a validated question.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt { id });
        }

        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                id,
                count: options.len(),
            });
        }

        let mut seen = HashSet::new();
        for option in &options {
            if option.trim().is_empty() {
                return Err(QuestionError::EmptyOption { id });
            }
            if !seen.insert(option.as_str()) {
                return Err(QuestionError::DuplicateOption {
                    id,
                    option: option.clone(),
                });
            }
        }

        if correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                id,
                index: correct_index,
                count: options.len(),
            });
        }

        Ok(Self {
            id,
            prompt,
            options,
            correct_index,
        })
    }

    /// Identifier of the question.
    pub fn id(&self) -> QuestionId {
        self.id
    }

    /// Prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Options in presentation order.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Index of the correct option in the current order.
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    /// Text of the correct option.
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    /// Whether `option` is one of this question's options.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|candidate| candidate == option)
    }

    /// Whether `option` is the correct answer.
    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_option() == option
    }

    /// Copy of the question with its options in a fresh random order.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..self.options.len()).collect();
        order.shuffle(rng);

        let options = order.iter().map(|&i| self.options[i].clone()).collect();
        let correct_index = order
            .iter()
            .position(|&i| i == self.correct_index)
            .unwrap_or(self.correct_index);

        Self {
            id: self.id,
            prompt: self.prompt.clone(),
            options,
            correct_index,
        }
    }
}

/// What the messenger shows for one question; never carries the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PresentedQuestion {
    /// Identifier of the question, echoed back by answers.
    pub question_id: QuestionId,
    /// 1-based position inside the session.
    pub number: usize,
    /// Number of questions in the session.
    pub total: usize,
    /// Prompt text.
    pub prompt: String,
    /// Shuffled options, one button each.
    pub options: Vec<String>,
}

/// Immutable question bank.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Wrap a list of already validated questions.
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Number of questions in the bank.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank holds no question.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Draw `n` distinct questions in random order, each with shuffled options.
    pub fn draw(&self, n: usize) -> Result<Vec<Question>, InsufficientQuestions> {
        self.draw_with(n, &mut rng())
    }

    /// [`QuestionSet::draw`] with an explicit random source.
    pub fn draw_with<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Question>, InsufficientQuestions> {
        if n > self.questions.len() {
            return Err(InsufficientQuestions {
                requested: n,
                available: self.questions.len(),
            });
        }

        let mut indices: Vec<usize> = (0..self.questions.len()).collect();
        let (picked, _) = indices.partial_shuffle(rng, n);

        Ok(picked
            .iter()
            .map(|&i| self.questions[i].shuffled(rng))
            .collect())
    }
}
