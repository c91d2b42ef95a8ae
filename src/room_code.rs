//! Room code generation and parsing
//!
//! This module provides the short codes students use to join a live room.
//! Codes are generated randomly and displayed in octal format so that they
//! are always five digits and easier to communicate verbally.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Minimum value for generated room codes (in octal: 10000)
const MIN_VALUE: u16 = 0o10_000;
/// Maximum value for generated room codes (in octal: 100000)
const MAX_VALUE: u16 = 0o100_000;

/// A short join code for a live room
///
/// Room codes are generated within a fixed range so they always display
/// as a 5-digit octal number. The octal format reduces confusion when
/// sharing codes verbally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomCode(u16);

impl RoomCode {
    /// Creates a new random room code
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for RoomCode {
    /// Creates a new random room code (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoomCode {
    /// Formats the room code as a 5-digit octal number
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05o}", self.0)
    }
}

impl Serialize for RoomCode {
    /// Serializes the room code as an octal string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    /// Deserializes a room code from an octal string
    fn deserialize<D>(deserializer: D) -> Result<RoomCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RoomCode::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for RoomCode {
    type Err = ParseIntError;

    /// Parses a room code from an octal string representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string cannot be parsed as a valid
    /// octal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u16::from_str_radix(s, 8)?))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_new_in_range() {
        for _ in 0..100 {
            let code = RoomCode::new();
            assert!(code.0 >= MIN_VALUE);
            assert!(code.0 < MAX_VALUE);
        }
    }

    #[test]
    fn test_room_code_display_format() {
        assert_eq!(RoomCode(MIN_VALUE).to_string(), "10000");
        assert_eq!(RoomCode(MIN_VALUE + 1).to_string(), "10001");
        assert_eq!(RoomCode(MAX_VALUE - 1).to_string(), "77777");
    }

    #[test]
    fn test_room_code_from_str() {
        assert_eq!(RoomCode::from_str("10000").unwrap().0, MIN_VALUE);
        assert_eq!(RoomCode::from_str("12345").unwrap().0, 0o12345);
    }

    #[test]
    fn test_room_code_from_str_invalid() {
        assert!(RoomCode::from_str("invalid").is_err());
        assert!(RoomCode::from_str("888").is_err()); // invalid octal digit
        assert!(RoomCode::from_str("").is_err());
    }

    #[test]
    fn test_room_code_serialization() {
        let code = RoomCode(0o12345);
        let serialized = serde_json::to_string(&code).unwrap();
        assert_eq!(serialized, "\"12345\"");

        let deserialized: RoomCode = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn test_room_code_deserialization_error() {
        let result: Result<RoomCode, _> = serde_json::from_str("123");
        assert!(result.is_err());

        let result: Result<RoomCode, _> = serde_json::from_str("\"999\"");
        assert!(result.is_err());
    }
}
