//! Configuration constants for the quiz-session engine
//!
//! This module contains the validation limits used throughout the engine
//! to ensure data integrity and provide consistent boundaries for quiz
//! definitions and answer payloads.

/// Quiz definition constants
pub mod quiz {
    /// Maximum number of questions allowed in a single quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a quiz title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
}

/// Question definition constants
pub mod question {
    /// Maximum length of a question's text in characters
    pub const MAX_TEXT_LENGTH: usize = 500;
    /// Maximum number of selectable options per question
    pub const MAX_OPTION_COUNT: usize = 8;
}

/// Option definition constants
pub mod options {
    /// Maximum length of an option's text in characters
    pub const MAX_TEXT_LENGTH: usize = 200;
}

/// Free-text answer constants
pub mod answer_text {
    /// Maximum length of a free-text answer in characters
    pub const MAX_LENGTH: usize = 5000;
}
