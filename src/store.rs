//! Durable-state records and collaborator store traits
//!
//! The engine does not own a database. It consumes a quiz definition
//! store, a room store, and an attempt store (sessions, answers, results,
//! profile points) through the traits defined here. [`MemoryStore`] is a
//! process-scoped implementation, created at process start (or per test)
//! and torn down on drop, that backs tests and single-process
//! deployments.
//!
//! The one non-obvious contract is [`AttemptStore::commit_submission`]:
//! it is the single atomic unit of the submit path. The status flip, the
//! result insert, the attempt numbering, and the profile points increment
//! all happen inside one call, and the call fails if the session is not
//! in progress. That guard is what makes a double submit lose cleanly.

use std::collections::HashMap;

use thiserror::Error;
use web_time::SystemTime;

use crate::{
    ids::{OptionId, ProfileId, QuestionId, QuizId, ResultId, RoomId, SessionId, UserId},
    quiz::{Question, Quiz},
    room_code::RoomCode,
    rooms::Room,
};

/// Errors surfaced by the store traits
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested quiz does not exist
    #[error("quiz not found")]
    QuizNotFound,
    /// The requested question does not exist in any quiz
    #[error("question not found")]
    QuestionNotFound,
    /// The requested session does not exist
    #[error("session not found")]
    SessionNotFound,
    /// No result has been persisted for the requested session
    #[error("result not found")]
    ResultNotFound,
    /// No room matches the requested identifier or code
    #[error("room not found")]
    RoomNotFound,
    /// The session is not in progress, so the operation cannot apply
    #[error("session is not in progress")]
    NotInProgress,
    /// The underlying storage is unreachable
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle status of a durable session row
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionStatus {
    /// The attempt is open; answers may still be recorded
    InProgress,
    /// The attempt has been submitted; terminal
    Submitted,
}

/// Durable projection of one participant's attempt at one quiz
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Unique identifier of the session
    pub id: SessionId,
    /// The quiz being attempted
    pub quiz_id: QuizId,
    /// The room the attempt belongs to, for room sessions
    pub room_id: Option<RoomId>,
    /// The user account taking the attempt
    pub user_id: UserId,
    /// The student profile credited with the outcome
    pub profile_id: ProfileId,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// When the attempt started
    pub started_at: SystemTime,
    /// When the attempt was submitted, once terminal
    pub submitted_at: Option<SystemTime>,
    /// Whole seconds between start and submission, once terminal
    pub time_spent: Option<u64>,
}

/// One answer to one question within a session
///
/// The (session, question) pair is unique: recording a second answer for
/// the same question overwrites the first. Free-text answers carry
/// `is_correct: None` and zero marks until a grader acts.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    /// The session the answer belongs to
    pub session_id: SessionId,
    /// The question being answered
    pub question_id: QuestionId,
    /// The selected option, for multiple choice
    pub option_id: Option<OptionId>,
    /// The free-text payload, for text questions
    pub text_answer: Option<String>,
    /// Correctness; `None` means pending manual grading
    pub is_correct: Option<bool>,
    /// Marks awarded at write or grading time
    pub marks_awarded: u32,
    /// When the answer was last recorded
    pub answered_at: SystemTime,
}

impl AnswerRecord {
    /// Whether the answer carries neither an option nor text
    ///
    /// Blank answers are classified as skipped at scoring time.
    pub fn is_blank(&self) -> bool {
        self.option_id.is_none() && self.text_answer.is_none()
    }
}

/// The scoring outcome of a submission before the store stamps it
///
/// The attempt number and result identifier are assigned by the store
/// inside [`AttemptStore::commit_submission`], not by the caller, so two
/// racing submissions cannot claim the same number.
#[derive(Debug, Clone)]
pub struct ResultDraft {
    /// The quiz that was attempted
    pub quiz_id: QuizId,
    /// The student profile credited
    pub profile_id: ProfileId,
    /// Raw score achieved
    pub score: u32,
    /// Sum of marks over all questions
    pub total_marks: u32,
    /// Score as a percentage of total marks, rounded to 2 decimal places
    pub percentage: f64,
    /// Number of questions with a non-blank answer
    pub questions_attempted: u32,
    /// Number of questions answered correctly
    pub questions_correct: u32,
    /// Number of questions answered incorrectly
    pub questions_incorrect: u32,
    /// Number of questions without an answer
    pub questions_skipped: u32,
    /// Whether the raw score met the quiz passing marks
    pub is_passed: bool,
}

/// One immutable row per completed attempt
#[derive(Debug, Clone)]
pub struct ResultRecord {
    /// Unique identifier of the result
    pub id: ResultId,
    /// The session that produced this result
    pub session_id: SessionId,
    /// The quiz that was attempted
    pub quiz_id: QuizId,
    /// The student profile credited
    pub profile_id: ProfileId,
    /// Raw score achieved
    pub score: u32,
    /// Sum of marks over all questions
    pub total_marks: u32,
    /// Score as a percentage of total marks, rounded to 2 decimal places
    pub percentage: f64,
    /// Number of questions with a non-blank answer
    pub questions_attempted: u32,
    /// Number of questions answered correctly
    pub questions_correct: u32,
    /// Number of questions answered incorrectly
    pub questions_incorrect: u32,
    /// Number of questions without an answer
    pub questions_skipped: u32,
    /// Whole seconds the attempt took
    pub time_taken: u64,
    /// Whether the raw score met the quiz passing marks
    pub is_passed: bool,
    /// 1-based count of this profile's completed tries at this quiz
    pub attempt_number: u32,
}

/// Read-only source of quiz definitions
pub trait QuizSource {
    /// Fetches a quiz with all of its questions and options
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QuizNotFound`] if no such quiz exists.
    fn quiz_with_questions(&self, id: QuizId) -> Result<Quiz, StoreError>;

    /// Looks a question up globally, returning it with its owning quiz
    ///
    /// The owning quiz identifier lets callers distinguish an unknown
    /// question from a question that exists but belongs to another quiz.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QuestionNotFound`] if no quiz contains the
    /// question.
    fn question(&self, id: QuestionId) -> Result<(QuizId, Question), StoreError>;
}

/// Read-only source of room definitions
pub trait RoomSource {
    /// Fetches a room by its join code
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RoomNotFound`] if no room carries the code.
    fn room_by_code(&self, code: RoomCode) -> Result<Room, StoreError>;

    /// Fetches a room by identifier
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RoomNotFound`] if no such room exists.
    fn room(&self, id: RoomId) -> Result<Room, StoreError>;
}

/// Durable storage of sessions, answers, results, and profile points
pub trait AttemptStore {
    /// Persists a freshly started session
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage is unreachable.
    fn create_session(&mut self, record: SessionRecord) -> Result<(), StoreError>;

    /// Fetches a durable session row
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if no such session exists.
    fn session(&self, id: SessionId) -> Result<SessionRecord, StoreError>;

    /// Records an answer, overwriting any earlier answer for the same
    /// (session, question) pair
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage is unreachable.
    fn upsert_answer(&mut self, record: AnswerRecord) -> Result<AnswerRecord, StoreError>;

    /// Fetches one answer of a session, if recorded
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage is unreachable.
    fn answer(
        &self,
        session: SessionId,
        question: QuestionId,
    ) -> Result<Option<AnswerRecord>, StoreError>;

    /// Fetches the full answer set of a session
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage is unreachable.
    fn answers(&self, session: SessionId) -> Result<Vec<AnswerRecord>, StoreError>;

    /// Fetches every submitted session belonging to a room
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage is unreachable.
    fn submitted_sessions(&self, room: RoomId) -> Result<Vec<SessionRecord>, StoreError>;

    /// Atomically finalizes a submission
    ///
    /// In one unit this flips the session to [`SessionStatus::Submitted`]
    /// with the given timestamps, assigns the attempt number as
    /// prior-result-count + 1 for the draft's (quiz, profile) pair,
    /// persists the result, and increments the profile's cumulative
    /// points by the draft's correct-question count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session does not
    /// exist, and [`StoreError::NotInProgress`] if it was already
    /// submitted. That failure is the double-submit guard.
    fn commit_submission(
        &mut self,
        session: SessionId,
        submitted_at: SystemTime,
        time_spent: u64,
        draft: ResultDraft,
    ) -> Result<ResultRecord, StoreError>;

    /// Counts the results already persisted for a (quiz, profile) pair
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage is unreachable.
    fn count_prior_results(&self, quiz: QuizId, profile: ProfileId) -> Result<u32, StoreError>;

    /// Fetches the result persisted for a session
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ResultNotFound`] if the session has no
    /// result.
    fn result_for_session(&self, session: SessionId) -> Result<ResultRecord, StoreError>;

    /// Replaces a persisted result after manual grading recomputation
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ResultNotFound`] if no result with the
    /// record's identifier exists.
    fn replace_result(&mut self, record: ResultRecord) -> Result<(), StoreError>;

    /// Fetches a profile's cumulative points
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage is unreachable.
    fn profile_points(&self, profile: ProfileId) -> Result<u64, StoreError>;
}

/// Everything the lifecycle controller needs from durable storage
pub trait Store: QuizSource + RoomSource + AttemptStore {}

impl<T: QuizSource + RoomSource + AttemptStore> Store for T {}

/// In-memory store backing tests and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    quizzes: HashMap<QuizId, Quiz>,
    rooms: HashMap<RoomId, Room>,
    sessions: HashMap<SessionId, SessionRecord>,
    answers: HashMap<(SessionId, QuestionId), AnswerRecord>,
    results: HashMap<ResultId, ResultRecord>,
    result_by_session: HashMap<SessionId, ResultId>,
    points: HashMap<ProfileId, u64>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a quiz definition
    pub fn insert_quiz(&mut self, quiz: Quiz) {
        self.quizzes.insert(quiz.id, quiz);
    }

    /// Seeds a room definition
    pub fn insert_room(&mut self, room: Room) {
        self.rooms.insert(room.id, room);
    }
}

impl QuizSource for MemoryStore {
    fn quiz_with_questions(&self, id: QuizId) -> Result<Quiz, StoreError> {
        self.quizzes.get(&id).cloned().ok_or(StoreError::QuizNotFound)
    }

    fn question(&self, id: QuestionId) -> Result<(QuizId, Question), StoreError> {
        self.quizzes
            .values()
            .find_map(|quiz| quiz.question(id).map(|q| (quiz.id, q.clone())))
            .ok_or(StoreError::QuestionNotFound)
    }
}

impl RoomSource for MemoryStore {
    fn room_by_code(&self, code: RoomCode) -> Result<Room, StoreError> {
        self.rooms
            .values()
            .find(|room| room.code == code)
            .cloned()
            .ok_or(StoreError::RoomNotFound)
    }

    fn room(&self, id: RoomId) -> Result<Room, StoreError> {
        self.rooms.get(&id).cloned().ok_or(StoreError::RoomNotFound)
    }
}

impl AttemptStore for MemoryStore {
    fn create_session(&mut self, record: SessionRecord) -> Result<(), StoreError> {
        self.sessions.insert(record.id, record);
        Ok(())
    }

    fn session(&self, id: SessionId) -> Result<SessionRecord, StoreError> {
        self.sessions
            .get(&id)
            .cloned()
            .ok_or(StoreError::SessionNotFound)
    }

    fn upsert_answer(&mut self, record: AnswerRecord) -> Result<AnswerRecord, StoreError> {
        self.answers
            .insert((record.session_id, record.question_id), record.clone());
        Ok(record)
    }

    fn answer(
        &self,
        session: SessionId,
        question: QuestionId,
    ) -> Result<Option<AnswerRecord>, StoreError> {
        Ok(self.answers.get(&(session, question)).cloned())
    }

    fn answers(&self, session: SessionId) -> Result<Vec<AnswerRecord>, StoreError> {
        Ok(self
            .answers
            .values()
            .filter(|a| a.session_id == session)
            .cloned()
            .collect())
    }

    fn submitted_sessions(&self, room: RoomId) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .values()
            .filter(|s| s.room_id == Some(room) && s.status == SessionStatus::Submitted)
            .cloned()
            .collect())
    }

    fn commit_submission(
        &mut self,
        session: SessionId,
        submitted_at: SystemTime,
        time_spent: u64,
        draft: ResultDraft,
    ) -> Result<ResultRecord, StoreError> {
        let row = self
            .sessions
            .get_mut(&session)
            .ok_or(StoreError::SessionNotFound)?;

        if row.status != SessionStatus::InProgress {
            return Err(StoreError::NotInProgress);
        }

        row.status = SessionStatus::Submitted;
        row.submitted_at = Some(submitted_at);
        row.time_spent = Some(time_spent);

        let attempt_number = self
            .results
            .values()
            .filter(|r| r.quiz_id == draft.quiz_id && r.profile_id == draft.profile_id)
            .count() as u32
            + 1;

        let record = ResultRecord {
            id: ResultId::new(),
            session_id: session,
            quiz_id: draft.quiz_id,
            profile_id: draft.profile_id,
            score: draft.score,
            total_marks: draft.total_marks,
            percentage: draft.percentage,
            questions_attempted: draft.questions_attempted,
            questions_correct: draft.questions_correct,
            questions_incorrect: draft.questions_incorrect,
            questions_skipped: draft.questions_skipped,
            time_taken: time_spent,
            is_passed: draft.is_passed,
            attempt_number,
        };

        self.results.insert(record.id, record.clone());
        self.result_by_session.insert(session, record.id);
        *self.points.entry(draft.profile_id).or_default() += u64::from(draft.questions_correct);

        Ok(record)
    }

    fn count_prior_results(&self, quiz: QuizId, profile: ProfileId) -> Result<u32, StoreError> {
        Ok(self
            .results
            .values()
            .filter(|r| r.quiz_id == quiz && r.profile_id == profile)
            .count() as u32)
    }

    fn result_for_session(&self, session: SessionId) -> Result<ResultRecord, StoreError> {
        self.result_by_session
            .get(&session)
            .and_then(|id| self.results.get(id))
            .cloned()
            .ok_or(StoreError::ResultNotFound)
    }

    fn replace_result(&mut self, record: ResultRecord) -> Result<(), StoreError> {
        if !self.results.contains_key(&record.id) {
            return Err(StoreError::ResultNotFound);
        }
        self.result_by_session.insert(record.session_id, record.id);
        self.results.insert(record.id, record);
        Ok(())
    }

    fn profile_points(&self, profile: ProfileId) -> Result<u64, StoreError> {
        Ok(self.points.get(&profile).copied().unwrap_or_default())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn in_progress_session() -> SessionRecord {
        SessionRecord {
            id: SessionId::new(),
            quiz_id: QuizId::new(),
            room_id: None,
            user_id: UserId::new(),
            profile_id: ProfileId::new(),
            status: SessionStatus::InProgress,
            started_at: SystemTime::now(),
            submitted_at: None,
            time_spent: None,
        }
    }

    fn draft_for(session: &SessionRecord, score: u32, correct: u32) -> ResultDraft {
        ResultDraft {
            quiz_id: session.quiz_id,
            profile_id: session.profile_id,
            score,
            total_marks: 10,
            percentage: f64::from(score) * 10.0,
            questions_attempted: correct,
            questions_correct: correct,
            questions_incorrect: 0,
            questions_skipped: 0,
            is_passed: score >= 5,
        }
    }

    #[test]
    fn test_upsert_answer_keeps_single_row() {
        let mut store = MemoryStore::new();
        let session = SessionId::new();
        let question = QuestionId::new();
        let first = OptionId::new();
        let second = OptionId::new();

        for option in [first, second] {
            store
                .upsert_answer(AnswerRecord {
                    session_id: session,
                    question_id: question,
                    option_id: Some(option),
                    text_answer: None,
                    is_correct: Some(false),
                    marks_awarded: 0,
                    answered_at: SystemTime::now(),
                })
                .unwrap();
        }

        let answers = store.answers(session).unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].option_id, Some(second));
    }

    #[test]
    fn test_commit_flips_status_and_assigns_attempt_number() {
        let mut store = MemoryStore::new();
        let session = in_progress_session();
        store.create_session(session.clone()).unwrap();

        let draft = draft_for(&session, 7, 3);
        let result = store
            .commit_submission(session.id, SystemTime::now(), 42, draft)
            .unwrap();

        assert_eq!(result.attempt_number, 1);
        assert_eq!(result.time_taken, 42);
        assert_eq!(
            store.session(session.id).unwrap().status,
            SessionStatus::Submitted
        );
        assert_eq!(store.profile_points(session.profile_id).unwrap(), 3);
    }

    #[test]
    fn test_commit_rejects_submitted_session() {
        let mut store = MemoryStore::new();
        let session = in_progress_session();
        store.create_session(session.clone()).unwrap();

        store
            .commit_submission(session.id, SystemTime::now(), 1, draft_for(&session, 5, 2))
            .unwrap();

        let again = store
            .commit_submission(session.id, SystemTime::now(), 2, draft_for(&session, 5, 2))
            .unwrap_err();
        assert_eq!(again, StoreError::NotInProgress);
    }

    #[test]
    fn test_attempt_numbers_are_per_profile() {
        let mut store = MemoryStore::new();
        let quiz_id = QuizId::new();

        let mut first = in_progress_session();
        first.quiz_id = quiz_id;
        let mut second = in_progress_session();
        second.quiz_id = quiz_id;

        store.create_session(first.clone()).unwrap();
        store.create_session(second.clone()).unwrap();

        let a = store
            .commit_submission(first.id, SystemTime::now(), 1, draft_for(&first, 5, 2))
            .unwrap();
        let b = store
            .commit_submission(second.id, SystemTime::now(), 1, draft_for(&second, 5, 2))
            .unwrap();

        // Different profiles each start at attempt 1.
        assert_eq!(a.attempt_number, 1);
        assert_eq!(b.attempt_number, 1);
    }

    #[test]
    fn test_replace_result_requires_existing_row() {
        let mut store = MemoryStore::new();
        let session = in_progress_session();
        store.create_session(session.clone()).unwrap();
        let mut result = store
            .commit_submission(session.id, SystemTime::now(), 1, draft_for(&session, 5, 2))
            .unwrap();

        result.score = 9;
        store.replace_result(result.clone()).unwrap();
        assert_eq!(store.result_for_session(session.id).unwrap().score, 9);

        let mut orphan = result;
        orphan.id = ResultId::new();
        assert_eq!(store.replace_result(orphan), Err(StoreError::ResultNotFound));
    }
}
