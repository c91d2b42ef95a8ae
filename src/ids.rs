//! Identifier newtypes used across the engine
//!
//! Every entity the engine touches (sessions, quizzes, questions, options,
//! users, student profiles, rooms, results, and live connections) gets its
//! own UUID-backed identifier type. Keeping the types distinct prevents,
//! for example, a question identifier from being routed where a session
//! identifier is expected. All identifiers serialize as their string form.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            DeserializeFromStr,
            SerializeDisplay,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::from_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// Identifies one participant's attempt at one quiz
    SessionId
}

uuid_id! {
    /// Identifies a quiz definition
    QuizId
}

uuid_id! {
    /// Identifies a question within a quiz
    QuestionId
}

uuid_id! {
    /// Identifies a selectable option within a question
    OptionId
}

uuid_id! {
    /// Identifies a user account
    UserId
}

uuid_id! {
    /// Identifies a student profile (the scoring identity)
    ProfileId
}

uuid_id! {
    /// Identifies a live room event
    RoomId
}

uuid_id! {
    /// Identifies a persisted attempt outcome
    ResultId
}

uuid_id! {
    /// Identifies a live transport connection
    ///
    /// Connection identifiers are ephemeral: a reconnecting client arrives
    /// with a fresh one, which is why the registry keeps an explicit
    /// connection-to-session mapping instead of assuming a static binding.
    ConnectionId
}
