//! Quiz definition model
//!
//! This module defines the read-only quiz structures the engine consumes
//! from the quiz definition store: the quiz itself, its questions, and the
//! selectable options carrying the truth value for multiple choice. A
//! question with no options is a free-text question whose answers require
//! manual grading.

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::ids::{OptionId, QuestionId, QuizId};

/// A selectable option within a question
///
/// Options carry the truth value for multiple choice: a question is
/// answered correctly when the selected option's `is_correct` flag is
/// set.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionOption {
    /// Unique identifier of the option
    #[garde(skip)]
    pub id: OptionId,
    /// Display text of the option
    #[garde(length(max = crate::constants::options::MAX_TEXT_LENGTH))]
    pub text: String,
    /// Whether selecting this option answers the question correctly
    #[garde(skip)]
    pub is_correct: bool,
    /// Display position of the option within its question
    #[garde(skip)]
    pub order: u32,
}

/// A single question within a quiz
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Question {
    /// Unique identifier of the question
    #[garde(skip)]
    pub id: QuestionId,
    /// The question text shown to participants
    #[garde(length(max = crate::constants::question::MAX_TEXT_LENGTH))]
    pub text: String,
    /// Marks awarded for a correct answer
    #[garde(skip)]
    pub marks: u32,
    /// Display position of the question within its quiz
    #[garde(skip)]
    pub order: u32,
    /// Selectable options; empty for free-text questions
    #[garde(length(max = crate::constants::question::MAX_OPTION_COUNT), dive)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Looks up an option of this question by identifier
    pub fn option(&self, id: OptionId) -> Option<&QuestionOption> {
        self.options.iter().find(|opt| opt.id == id)
    }

    /// Returns the correct option, if the question has one
    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|opt| opt.is_correct)
    }

    /// Whether this question expects a free-text answer
    ///
    /// Free-text answers cannot be scored automatically and stay pending
    /// until a grader acts.
    pub fn is_free_text(&self) -> bool {
        self.options.is_empty()
    }
}

/// A complete quiz definition with all of its questions
///
/// The engine treats this structure as read-only: it is fetched from the
/// quiz definition store at session start and submit time, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Quiz {
    /// Unique identifier of the quiz
    #[garde(skip)]
    pub id: QuizId,
    /// The quiz title
    #[garde(length(max = crate::constants::quiz::MAX_TITLE_LENGTH))]
    pub title: String,
    /// Raw score required to pass; the boundary is inclusive
    #[garde(skip)]
    pub passing_marks: u32,
    /// Maximum number of completed attempts per participant, if limited
    #[garde(skip)]
    pub max_attempts: Option<u32>,
    /// The questions making up the quiz
    #[garde(length(max = crate::constants::quiz::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Returns the number of questions in the quiz
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns whether the quiz has no questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Looks up a question of this quiz by identifier
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Sum of marks over all questions
    pub fn total_marks(&self) -> u32 {
        self.questions.iter().map(|q| q.marks).sum()
    }

    /// Questions sorted by their display order
    pub fn questions_in_order(&self) -> Vec<&Question> {
        self.questions
            .iter()
            .sorted_by_key(|q| q.order)
            .collect_vec()
    }
}
