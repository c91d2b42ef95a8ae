//! Scoring engine
//!
//! A pure, deterministic reduction from a quiz definition plus a session's
//! full answer set to a scorecard. Every question of the quiz participates,
//! not just the answered ones, which is what makes skip detection and
//! the percentage denominator correct. The same function serves the
//! submit path and manual-grading recomputation: re-deriving everything
//! from the whole answer set keeps the persisted result consistent with
//! the answer ledger as the single source of truth.

use std::collections::HashMap;

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    ids::{OptionId, ProfileId, QuestionId, QuizId},
    quiz::Quiz,
    store::{AnswerRecord, ResultDraft},
};

/// Rounds a value to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-question outcome included in the submission payload
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct QuestionEvaluation {
    /// The question being evaluated
    pub question_id: QuestionId,
    /// The question text
    pub question_text: String,
    /// The option the participant selected, if any
    pub selected_option_id: Option<OptionId>,
    /// Display text of the selected option
    pub selected_option_text: Option<String>,
    /// The participant's free-text answer, if any
    pub text_answer: Option<String>,
    /// The correct option of the question, if it has one
    pub correct_option_id: Option<OptionId>,
    /// Display text of the correct option
    pub correct_option_text: Option<String>,
    /// Correctness; `None` for skipped questions and answers pending
    /// manual grading
    pub is_correct: Option<bool>,
    /// Whether the question went unanswered
    pub skipped: bool,
    /// Whether a grader still needs to act on this answer
    pub needs_manual_grading: bool,
    /// Marks awarded for this question
    pub marks_awarded: u32,
    /// Marks the question was worth
    pub total_marks: u32,
}

/// The complete scoring outcome of one answer set against one quiz
#[derive(Debug, Clone, Serialize)]
pub struct Scorecard {
    /// Raw score achieved
    pub score: u32,
    /// Sum of marks over all questions
    pub total_marks: u32,
    /// Score as a percentage of total marks, rounded to 2 decimal
    /// places; zero when the quiz carries no marks
    pub percentage: f64,
    /// Whether the raw score met the quiz passing marks (inclusive)
    pub is_passed: bool,
    /// Number of questions with a non-blank answer
    pub questions_attempted: u32,
    /// Number of questions answered correctly
    pub questions_correct: u32,
    /// Number of questions answered incorrectly
    pub questions_incorrect: u32,
    /// Number of questions without an answer
    pub questions_skipped: u32,
    /// Number of answers awaiting manual grading
    pub questions_pending: u32,
    /// Per-question outcomes in quiz display order
    pub evaluation: Vec<QuestionEvaluation>,
}

impl Scorecard {
    /// Builds the draft the store stamps into a result row
    pub fn draft(&self, quiz_id: QuizId, profile_id: ProfileId) -> ResultDraft {
        ResultDraft {
            quiz_id,
            profile_id,
            score: self.score,
            total_marks: self.total_marks,
            percentage: self.percentage,
            questions_attempted: self.questions_attempted,
            questions_correct: self.questions_correct,
            questions_incorrect: self.questions_incorrect,
            questions_skipped: self.questions_skipped,
            is_passed: self.is_passed,
        }
    }
}

/// Scores a full answer set against a quiz definition
///
/// Walks every question of the quiz in display order. A question with no
/// answer, or a blank answer, is skipped. An option answer is scored
/// from the option's truth flag and the question's marks, never left
/// pending. A free-text answer contributes whatever the ledger row
/// carries: nothing while ungraded, the grader's marks and verdict once
/// graded.
pub fn evaluate(quiz: &Quiz, answers: &[AnswerRecord]) -> Scorecard {
    let by_question: HashMap<QuestionId, &AnswerRecord> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let mut score = 0u32;
    let mut total_marks = 0u32;
    let mut attempted = 0u32;
    let mut correct = 0u32;
    let mut incorrect = 0u32;
    let mut skipped = 0u32;
    let mut pending = 0u32;
    let mut evaluation = Vec::with_capacity(quiz.len());

    for question in quiz.questions_in_order() {
        total_marks += question.marks;

        let correct_option = question.correct_option();
        let answer = by_question
            .get(&question.id)
            .filter(|a| !a.is_blank())
            .copied();

        let Some(answer) = answer else {
            skipped += 1;
            evaluation.push(QuestionEvaluation {
                question_id: question.id,
                question_text: question.text.clone(),
                selected_option_id: None,
                selected_option_text: None,
                text_answer: None,
                correct_option_id: correct_option.map(|opt| opt.id),
                correct_option_text: correct_option.map(|opt| opt.text.clone()),
                is_correct: None,
                skipped: true,
                needs_manual_grading: false,
                marks_awarded: 0,
                total_marks: question.marks,
            });
            continue;
        };

        attempted += 1;

        if let Some(option_id) = answer.option_id {
            // Option answers are re-derived from the definition rather
            // than trusted from the ledger row.
            let selected = question.option(option_id);
            let is_correct = selected.is_some_and(|opt| opt.is_correct);
            let marks_awarded = if is_correct { question.marks } else { 0 };

            score += marks_awarded;
            if is_correct {
                correct += 1;
            } else {
                incorrect += 1;
            }

            evaluation.push(QuestionEvaluation {
                question_id: question.id,
                question_text: question.text.clone(),
                selected_option_id: Some(option_id),
                selected_option_text: selected.map(|opt| opt.text.clone()),
                text_answer: None,
                correct_option_id: correct_option.map(|opt| opt.id),
                correct_option_text: correct_option.map(|opt| opt.text.clone()),
                is_correct: Some(is_correct),
                skipped: false,
                needs_manual_grading: false,
                marks_awarded,
                total_marks: question.marks,
            });
        } else {
            // Free text: the ledger row is authoritative. Ungraded rows
            // carry no verdict and no marks.
            score += answer.marks_awarded;
            match answer.is_correct {
                Some(true) => correct += 1,
                Some(false) => incorrect += 1,
                None => pending += 1,
            }

            evaluation.push(QuestionEvaluation {
                question_id: question.id,
                question_text: question.text.clone(),
                selected_option_id: None,
                selected_option_text: None,
                text_answer: answer.text_answer.clone(),
                correct_option_id: correct_option.map(|opt| opt.id),
                correct_option_text: correct_option.map(|opt| opt.text.clone()),
                is_correct: answer.is_correct,
                skipped: false,
                needs_manual_grading: answer.is_correct.is_none(),
                marks_awarded: answer.marks_awarded,
                total_marks: question.marks,
            });
        }
    }

    let percentage = if total_marks > 0 {
        round2(f64::from(score) / f64::from(total_marks) * 100.0)
    } else {
        0.0
    };

    Scorecard {
        score,
        total_marks,
        percentage,
        is_passed: score >= quiz.passing_marks,
        questions_attempted: attempted,
        questions_correct: correct,
        questions_incorrect: incorrect,
        questions_skipped: skipped,
        questions_pending: pending,
        evaluation,
    }
}
