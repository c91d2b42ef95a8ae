//! Session lifecycle controller
//!
//! This module contains the engine orchestrating a live attempt from start
//! to submission: it owns the session registry and the room aggregator,
//! talks to the quiz/room/attempt stores, and emits events back through
//! the transport tunnels. Per-session transitions are serialized by
//! construction: the engine is driven through `&mut self`, so an answer
//! write can never interleave with the submit path's read of the final
//! answer set, and the store's atomic commit guards the terminal
//! transition itself.
//!
//! State machine per session: NONE → IN_PROGRESS → SUBMITTED (terminal).

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::{debug, info, warn};
use web_time::SystemTime;

use crate::{
    ids::{ConnectionId, OptionId, ProfileId, QuestionId, QuizId, ResultId, RoomId, SessionId, UserId},
    quiz::Quiz,
    registry::{ActiveSession, SessionRegistry},
    room_code::RoomCode,
    rooms::{RoomAggregator, RoomReport, RoomSnapshot, build_report},
    scoring::{QuestionEvaluation, evaluate},
    store::{AnswerRecord, ResultRecord, SessionRecord, SessionStatus, Store, StoreError},
    transport::Tunnel,
};

/// What happens to an in-progress session once its room has closed
///
/// Under [`ExpiryPolicy::Resumable`] nothing happens: the session stays
/// restorable indefinitely. [`ExpiryPolicy::AutoSubmit`] instead
/// finalizes the session with whatever the ledger holds the first time
/// an event touches it after the room's end time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiryPolicy {
    /// Expired sessions remain resumable until explicitly submitted
    #[default]
    Resumable,
    /// Expired sessions are submitted with their current answers on the
    /// next event that touches them
    AutoSubmit,
}

/// Engine configuration options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Options {
    /// Policy for sessions whose room window has elapsed
    pub expiry: ExpiryPolicy,
}

/// Broad classification of engine errors, mirrored by outer transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Missing or malformed fields, unknown question/option references
    Validation,
    /// The session or room is not in a state that allows the operation
    State,
    /// The participant is not allowed to perform the operation
    Authorization,
    /// The payload references entities that do not belong together
    Integrity,
    /// A collaborator store is unreachable
    Infrastructure,
}

impl ErrorKind {
    /// HTTP status code outer REST wrappers use for this kind
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Integrity => 400,
            ErrorKind::Authorization => 403,
            ErrorKind::State => 404,
            ErrorKind::Infrastructure => 500,
        }
    }
}

/// Errors reported back to the submitting connection
///
/// No error here mutates the registry or the aggregator: a rejected
/// event leaves the session exactly as it was, and the client re-syncs
/// through `restore-session` when told the session is invalid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Restore target does not exist or is already terminal
    #[error("session not found or already completed")]
    SessionNotRestorable,
    /// No live registry entry for the session; the client must refresh
    #[error("invalid session, please refresh and try again")]
    SessionInvalid,
    /// The session was already submitted; terminal states never reopen
    #[error("session has already been submitted")]
    AlreadySubmitted,
    /// The referenced quiz does not exist
    #[error("quiz not found")]
    QuizNotFound,
    /// The referenced question does not exist
    #[error("question not found")]
    QuestionNotFound,
    /// The option does not belong to the question
    #[error("invalid option selected")]
    InvalidOption,
    /// The question does not belong to the session's quiz
    #[error("question does not belong to this quiz")]
    ForeignQuestion,
    /// An answer needs either an option or a text payload
    #[error("either an option or a text answer is required")]
    EmptyAnswer,
    /// The text answer exceeds the allowed length
    #[error("text answer exceeds the maximum length")]
    AnswerTooLong,
    /// A text answer was supplied for a multiple-choice question
    #[error("this question expects an option selection")]
    OptionRequired,
    /// Manual grading was requested for an auto-scored question
    #[error("only free-text answers can be graded manually")]
    NotFreeText,
    /// The room code is unknown or the room is outside its time window
    #[error("invalid room code or room not open")]
    RoomUnavailable,
    /// The participant has used all allowed attempts at this quiz
    #[error("maximum number of attempts reached")]
    AttemptsExhausted,
    /// Awarded marks exceed the question's maximum
    #[error("marks awarded cannot exceed the question maximum")]
    MarksOutOfRange,
    /// Grading target answer has not been recorded
    #[error("answer has not been recorded")]
    AnswerMissing,
    /// A collaborator store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Classifies this error for transport-level reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::QuizNotFound
            | EngineError::QuestionNotFound
            | EngineError::InvalidOption
            | EngineError::EmptyAnswer
            | EngineError::AnswerTooLong
            | EngineError::OptionRequired
            | EngineError::NotFreeText
            | EngineError::MarksOutOfRange
            | EngineError::AnswerMissing => ErrorKind::Validation,
            EngineError::SessionNotRestorable
            | EngineError::SessionInvalid
            | EngineError::AlreadySubmitted => ErrorKind::State,
            EngineError::RoomUnavailable | EngineError::AttemptsExhausted => {
                ErrorKind::Authorization
            }
            EngineError::ForeignQuestion => ErrorKind::Integrity,
            EngineError::Store(StoreError::Unavailable(_)) => ErrorKind::Infrastructure,
            EngineError::Store(_) => ErrorKind::State,
        }
    }
}

/// Events received from the realtime transport
///
/// Wire representation is externally tagged with kebab-case event names,
/// e.g. `{"save-answer": {"session_id": "...", ...}}`. Payloads are
/// validated exhaustively before they reach any store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomingEvent {
    /// Resume an in-progress session after a reconnect
    RestoreSession {
        /// The session to resume
        session_id: SessionId,
        /// Room hint from the client; the durable row wins when both
        /// are present
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    /// Start an individual (non-room) attempt
    StartQuiz {
        /// The quiz to attempt
        quiz_id: QuizId,
        /// The user account taking the attempt
        user_id: UserId,
        /// The student profile credited with the outcome
        student_profile_id: ProfileId,
    },
    /// Join a live room and start an attempt at its quiz
    JoinRoom {
        /// The room's join code
        room_code: RoomCode,
        /// The user account taking the attempt
        user_id: UserId,
        /// The student profile credited with the outcome
        student_profile_id: ProfileId,
    },
    /// Record one answer; repeats for the same question overwrite
    SaveAnswer {
        /// The session being answered
        session_id: SessionId,
        /// The question being answered
        question_id: QuestionId,
        /// Selected option, for multiple choice
        #[serde(default)]
        option_id: Option<OptionId>,
        /// Free-text payload, for text questions
        #[serde(default)]
        text_answer: Option<String>,
    },
    /// Finalize the attempt and compute its result
    #[serde(alias = "submit-quiz-room")]
    SubmitQuiz {
        /// The session to submit
        session_id: SessionId,
    },
}

/// The persisted result as presented to the submitting connection
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedResult {
    /// Identifier of the persisted result row
    pub id: ResultId,
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
    /// Per-question outcomes in quiz display order
    pub evaluation: Vec<QuestionEvaluation>,
}

/// Events emitted to connections through the transport tunnels
///
/// Wire representation is externally tagged with kebab-case event names.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, derive_more::From)]
#[serde(rename_all = "kebab-case")]
pub enum OutgoingEvent {
    /// An in-progress session was resumed on this connection
    #[from(ignore)]
    SessionRestored {
        /// The resumed session
        session_id: SessionId,
        /// The session's room, if any
        room_id: Option<RoomId>,
        /// The quiz being attempted
        quiz_id: QuizId,
    },
    /// An attempt started; for room joins the room context is included
    #[from(ignore)]
    QuizStarted {
        /// The new session
        session_id: SessionId,
        /// The joined room, for room attempts
        room_id: Option<RoomId>,
        /// The room's quiz, for room attempts
        quiz_id: Option<QuizId>,
        /// Current room statistics, for room attempts
        room_stats: Option<RoomSnapshot>,
    },
    /// An answer was recorded
    #[from(ignore)]
    AnswerSaved {
        /// The answered question
        question_id: QuestionId,
        /// The selected option, if any
        option_id: Option<OptionId>,
    },
    /// The attempt was finalized; sent to the submitter only
    #[from(ignore)]
    QuizSubmitted {
        /// The persisted result with its per-question evaluation
        result: SubmittedResult,
    },
    /// Live room statistics changed; broadcast to the whole room
    RoomStatsUpdated(RoomSnapshot),
    /// The recomputed room report; broadcast to the whole room
    RoomReportUpdated(RoomReport),
    /// An inbound event was rejected
    #[from(ignore)]
    Error {
        /// Human-readable description of the failure
        message: String,
        /// Broad classification for client handling
        kind: ErrorKind,
    },
}

impl OutgoingEvent {
    /// Converts the event to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// The session lifecycle controller
///
/// Owns the process-scoped session registry and room aggregator, and
/// drives every transition against the injected store. One engine value
/// serves all connections; callers serialize access through `&mut self`.
pub struct Engine<S> {
    store: S,
    registry: SessionRegistry,
    rooms: RoomAggregator,
    options: Options,
}

impl<S: Store> Engine<S> {
    /// Creates an engine over the given store
    pub fn new(store: S, options: Options) -> Self {
        Self {
            store,
            registry: SessionRegistry::new(),
            rooms: RoomAggregator::new(),
            options,
        }
    }

    /// Read access to the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read access to the session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Current live statistics of a room, if tracked
    pub fn room_snapshot(&self, room: RoomId) -> Option<RoomSnapshot> {
        self.rooms.snapshot(room)
    }

    /// Handles one inbound event from a connection
    ///
    /// Failures never propagate: a rejected event is answered with an
    /// [`OutgoingEvent::Error`] on the same connection, leaving session
    /// state untouched.
    pub fn handle<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        event: IncomingEvent,
        tunnel_finder: F,
    ) {
        let outcome = match event {
            IncomingEvent::RestoreSession {
                session_id,
                room_id,
            } => self.restore_session(connection, session_id, room_id, &tunnel_finder),
            IncomingEvent::StartQuiz {
                quiz_id,
                user_id,
                student_profile_id,
            } => self.start_quiz(
                connection,
                quiz_id,
                user_id,
                student_profile_id,
                &tunnel_finder,
            ),
            IncomingEvent::JoinRoom {
                room_code,
                user_id,
                student_profile_id,
            } => self.join_room(
                connection,
                room_code,
                user_id,
                student_profile_id,
                &tunnel_finder,
            ),
            IncomingEvent::SaveAnswer {
                session_id,
                question_id,
                option_id,
                text_answer,
            } => self.save_answer(
                connection,
                session_id,
                question_id,
                option_id,
                text_answer,
                &tunnel_finder,
            ),
            IncomingEvent::SubmitQuiz { session_id } => {
                self.submit_quiz(connection, session_id, &tunnel_finder)
            }
        };

        if let Err(error) = outcome {
            warn!(%connection, %error, "event rejected");
            Self::send(
                &OutgoingEvent::Error {
                    message: error.to_string(),
                    kind: error.kind(),
                },
                connection,
                &tunnel_finder,
            );
        }
    }

    /// Clears a dropped connection's routing state
    ///
    /// The session itself is preserved and stays resumable through
    /// `restore-session`.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        if let Some(session) = self.registry.disconnect(connection) {
            debug!(%connection, %session, "connection dropped, session preserved");
        }
    }

    /// Applies a manual grade to one answer and recomputes the result
    ///
    /// The new score, percentage, verdict counts, and pass flag are all
    /// re-derived from the entire answer set, never patched
    /// incrementally, so the persisted result stays consistent with the
    /// ledger. When `is_correct` is not supplied, non-zero marks count
    /// as correct.
    ///
    /// # Errors
    ///
    /// Rejects unknown questions, answers that were never recorded,
    /// auto-scored (multiple-choice) questions, marks above the question
    /// maximum, and sessions without a persisted result. A rejected call
    /// writes nothing.
    pub fn grade_answer(
        &mut self,
        session: SessionId,
        question: QuestionId,
        marks_awarded: u32,
        is_correct: Option<bool>,
    ) -> Result<ResultRecord, EngineError> {
        let answer = self
            .store
            .answer(session, question)?
            .ok_or(EngineError::AnswerMissing)?;

        let (owning_quiz, definition) = match self.store.question(question) {
            Ok(found) => found,
            Err(StoreError::QuestionNotFound) => return Err(EngineError::QuestionNotFound),
            Err(err) => return Err(err.into()),
        };

        let record = self.store.session(session)?;
        if record.quiz_id != owning_quiz {
            return Err(EngineError::ForeignQuestion);
        }
        if !definition.is_free_text() {
            return Err(EngineError::NotFreeText);
        }
        if marks_awarded > definition.marks {
            return Err(EngineError::MarksOutOfRange);
        }

        // All checks precede the write so a rejected call leaves the
        // ledger untouched.
        let existing = self.store.result_for_session(session)?;

        self.store.upsert_answer(AnswerRecord {
            is_correct: Some(is_correct.unwrap_or(marks_awarded > 0)),
            marks_awarded,
            ..answer
        })?;

        let quiz = self.quiz(record.quiz_id)?;
        let answers = self.store.answers(session)?;
        let card = evaluate(&quiz, &answers);

        let updated = ResultRecord {
            score: card.score,
            total_marks: card.total_marks,
            percentage: card.percentage,
            questions_attempted: card.questions_attempted,
            questions_correct: card.questions_correct,
            questions_incorrect: card.questions_incorrect,
            questions_skipped: card.questions_skipped,
            is_passed: card.is_passed,
            ..existing
        };
        self.store.replace_result(updated.clone())?;

        info!(%session, %question, marks_awarded, "answer graded, result recomputed");
        Ok(updated)
    }

    /// Rebuilds a room's report from the durable stores
    ///
    /// This is the reconciliation path for the volatile aggregator: it
    /// scans the room's submitted sessions and derives submissions,
    /// highest score, average score, and lowest time from them.
    ///
    /// # Errors
    ///
    /// Returns a store error if the sessions or their results cannot be
    /// read. A submitted session without a result row counts as zero; an
    /// unreachable store must not, or the report would be confidently
    /// wrong.
    pub fn recompute_report(&self, room: RoomId) -> Result<RoomReport, EngineError> {
        let sessions = self.store.submitted_sessions(room)?;
        let mut rows = Vec::with_capacity(sessions.len());
        for session in &sessions {
            let score = match self.store.result_for_session(session.id) {
                Ok(result) => result.score,
                Err(StoreError::ResultNotFound) => 0,
                Err(err) => return Err(err.into()),
            };
            rows.push((score, session.time_spent.unwrap_or(0)));
        }
        Ok(build_report(&rows))
    }

    fn restore_session<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        session_id: SessionId,
        room_hint: Option<RoomId>,
        tunnel_finder: &F,
    ) -> Result<(), EngineError> {
        let record = match self.store.session(session_id) {
            Ok(record) => record,
            Err(StoreError::SessionNotFound) => return Err(EngineError::SessionNotRestorable),
            Err(err) => return Err(err.into()),
        };

        if record.status != SessionStatus::InProgress {
            return Err(EngineError::SessionNotRestorable);
        }

        let entry = ActiveSession {
            session_id: record.id,
            quiz_id: record.quiz_id,
            room_id: record.room_id.or(room_hint),
            user_id: record.user_id,
            profile_id: record.profile_id,
            started_at: record.started_at,
            connection,
        };

        if self.auto_submit_due(&entry)? {
            return self.finalize(connection, entry, tunnel_finder);
        }

        let room_id = entry.room_id;
        let quiz_id = entry.quiz_id;
        self.registry.insert(entry);

        debug!(%session_id, %connection, "session restored");
        Self::send(
            &OutgoingEvent::SessionRestored {
                session_id,
                room_id,
                quiz_id,
            },
            connection,
            tunnel_finder,
        );
        Ok(())
    }

    fn start_quiz<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        quiz_id: QuizId,
        user_id: UserId,
        profile_id: ProfileId,
        tunnel_finder: &F,
    ) -> Result<(), EngineError> {
        let quiz = self.quiz(quiz_id)?;
        self.check_attempts(&quiz, profile_id)?;

        let session_id = self.open_session(connection, quiz_id, None, user_id, profile_id)?;

        info!(%session_id, %quiz_id, "quiz started");
        Self::send(
            &OutgoingEvent::QuizStarted {
                session_id,
                room_id: None,
                quiz_id: None,
                room_stats: None,
            },
            connection,
            tunnel_finder,
        );
        Ok(())
    }

    fn join_room<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        room_code: RoomCode,
        user_id: UserId,
        profile_id: ProfileId,
        tunnel_finder: &F,
    ) -> Result<(), EngineError> {
        let room = match self.store.room_by_code(room_code) {
            Ok(room) => room,
            Err(StoreError::RoomNotFound) => return Err(EngineError::RoomUnavailable),
            Err(err) => return Err(err.into()),
        };
        if !room.is_open_at(SystemTime::now()) {
            return Err(EngineError::RoomUnavailable);
        }

        let quiz = self.quiz(room.quiz_id)?;
        self.check_attempts(&quiz, profile_id)?;

        let session_id =
            self.open_session(connection, room.quiz_id, Some(room.id), user_id, profile_id)?;

        let snapshot = self.rooms.join(room.id, profile_id);
        info!(%session_id, room = %room.id, code = %room_code, "room joined");

        self.broadcast_room(room.id, &snapshot.into(), tunnel_finder);
        Self::send(
            &OutgoingEvent::QuizStarted {
                session_id,
                room_id: Some(room.id),
                quiz_id: Some(room.quiz_id),
                room_stats: Some(snapshot),
            },
            connection,
            tunnel_finder,
        );
        Ok(())
    }

    fn save_answer<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        session_id: SessionId,
        question_id: QuestionId,
        option_id: Option<OptionId>,
        text_answer: Option<String>,
        tunnel_finder: &F,
    ) -> Result<(), EngineError> {
        let entry = self
            .registry
            .get(session_id)
            .cloned()
            .ok_or(EngineError::SessionInvalid)?;
        self.rebind_if_moved(connection, &entry);

        if self.auto_submit_due(&entry)? {
            let entry = ActiveSession {
                connection,
                ..entry
            };
            return self.finalize(connection, entry, tunnel_finder);
        }

        if option_id.is_none() && text_answer.is_none() {
            return Err(EngineError::EmptyAnswer);
        }

        let (owning_quiz, question) = match self.store.question(question_id) {
            Ok(found) => found,
            Err(StoreError::QuestionNotFound) => return Err(EngineError::QuestionNotFound),
            Err(err) => return Err(err.into()),
        };
        if owning_quiz != entry.quiz_id {
            return Err(EngineError::ForeignQuestion);
        }
        // A text payload on a multiple-choice question would park it in
        // pending-grading and bypass auto-scoring.
        if !question.is_free_text() && text_answer.is_some() {
            return Err(EngineError::OptionRequired);
        }

        let (is_correct, marks_awarded) = match option_id {
            Some(option_id) => {
                let option = question
                    .option(option_id)
                    .ok_or(EngineError::InvalidOption)?;
                let marks = if option.is_correct { question.marks } else { 0 };
                (Some(option.is_correct), marks)
            }
            // Free text stays pending until a grader acts.
            None => (None, 0),
        };

        let text_answer = text_answer.map(|text| text.trim().to_string());
        if let Some(text) = &text_answer {
            // The limit is in characters, not bytes.
            if text.chars().count() > crate::constants::answer_text::MAX_LENGTH {
                return Err(EngineError::AnswerTooLong);
            }
        }

        self.store.upsert_answer(AnswerRecord {
            session_id,
            question_id,
            option_id,
            text_answer,
            is_correct,
            marks_awarded,
            answered_at: SystemTime::now(),
        })?;

        debug!(%session_id, %question_id, "answer saved");
        Self::send(
            &OutgoingEvent::AnswerSaved {
                question_id,
                option_id,
            },
            connection,
            tunnel_finder,
        );
        Ok(())
    }

    fn submit_quiz<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        session_id: SessionId,
        tunnel_finder: &F,
    ) -> Result<(), EngineError> {
        let entry = self
            .registry
            .get(session_id)
            .cloned()
            .ok_or(EngineError::SessionInvalid)?;
        self.rebind_if_moved(connection, &entry);

        let entry = ActiveSession {
            connection,
            ..entry
        };
        self.finalize(connection, entry, tunnel_finder)
    }

    /// Finalizes an attempt: scores it, commits it atomically, evicts
    /// the registry entry, and fans out the room updates.
    fn finalize<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        entry: ActiveSession,
        tunnel_finder: &F,
    ) -> Result<(), EngineError> {
        let now = SystemTime::now();
        let time_spent = now
            .duration_since(entry.started_at)
            .unwrap_or_default()
            .as_secs();

        let quiz = self.quiz(entry.quiz_id)?;
        let answers = self.store.answers(entry.session_id)?;
        let card = evaluate(&quiz, &answers);
        let draft = card.draft(entry.quiz_id, entry.profile_id);

        let result = match self
            .store
            .commit_submission(entry.session_id, now, time_spent, draft)
        {
            Ok(result) => result,
            Err(StoreError::NotInProgress) => return Err(EngineError::AlreadySubmitted),
            Err(err) => return Err(err.into()),
        };

        self.registry.evict(entry.session_id);
        info!(
            session = %entry.session_id,
            score = result.score,
            attempt = result.attempt_number,
            "session submitted"
        );

        if let Some(room) = entry.room_id {
            let snapshot = self.rooms.record_submission(room, result.score);
            self.broadcast_room(room, &snapshot.into(), tunnel_finder);

            let report = self.recompute_report(room)?;
            self.broadcast_room(room, &report.into(), tunnel_finder);
        }

        Self::send(
            &OutgoingEvent::QuizSubmitted {
                result: SubmittedResult {
                    id: result.id,
                    score: result.score,
                    total_marks: result.total_marks,
                    percentage: result.percentage,
                    questions_attempted: result.questions_attempted,
                    questions_correct: result.questions_correct,
                    questions_incorrect: result.questions_incorrect,
                    questions_skipped: result.questions_skipped,
                    time_taken: result.time_taken,
                    is_passed: result.is_passed,
                    attempt_number: result.attempt_number,
                    evaluation: card.evaluation,
                },
            },
            connection,
            tunnel_finder,
        );
        Ok(())
    }

    fn open_session(
        &mut self,
        connection: ConnectionId,
        quiz_id: QuizId,
        room_id: Option<RoomId>,
        user_id: UserId,
        profile_id: ProfileId,
    ) -> Result<SessionId, EngineError> {
        let session_id = SessionId::new();
        let started_at = SystemTime::now();

        self.store.create_session(SessionRecord {
            id: session_id,
            quiz_id,
            room_id,
            user_id,
            profile_id,
            status: SessionStatus::InProgress,
            started_at,
            submitted_at: None,
            time_spent: None,
        })?;

        self.registry.insert(ActiveSession {
            session_id,
            quiz_id,
            room_id,
            user_id,
            profile_id,
            started_at,
            connection,
        });

        Ok(session_id)
    }

    fn rebind_if_moved(&mut self, connection: ConnectionId, entry: &ActiveSession) {
        if entry.connection != connection {
            debug!(session = %entry.session_id, %connection, "rebinding session to new connection");
            self.registry.rebind(connection, entry.session_id);
        }
    }

    fn quiz(&self, quiz_id: QuizId) -> Result<Quiz, EngineError> {
        match self.store.quiz_with_questions(quiz_id) {
            Ok(quiz) => Ok(quiz),
            Err(StoreError::QuizNotFound) => Err(EngineError::QuizNotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether the expiry policy demands finalizing this session now
    ///
    /// Only room sessions can expire; quiz-only attempts have no time
    /// window.
    fn auto_submit_due(&self, entry: &ActiveSession) -> Result<bool, EngineError> {
        if self.options.expiry != ExpiryPolicy::AutoSubmit {
            return Ok(false);
        }
        let Some(room_id) = entry.room_id else {
            return Ok(false);
        };
        let room = self.store.room(room_id)?;
        Ok(SystemTime::now() >= room.end_time)
    }

    fn check_attempts(&self, quiz: &Quiz, profile: ProfileId) -> Result<(), EngineError> {
        if let Some(limit) = quiz.max_attempts {
            if self.store.count_prior_results(quiz.id, profile)? >= limit {
                return Err(EngineError::AttemptsExhausted);
            }
        }
        Ok(())
    }

    fn broadcast_room<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        room: RoomId,
        event: &OutgoingEvent,
        tunnel_finder: &F,
    ) {
        for connection in self.registry.room_connections(room) {
            Self::send(event, connection, tunnel_finder);
        }
    }

    fn send<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        event: &OutgoingEvent,
        connection: ConnectionId,
        tunnel_finder: &F,
    ) {
        if let Some(tunnel) = tunnel_finder(connection) {
            tunnel.send_event(event);
        }
    }
}
