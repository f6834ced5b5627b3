//! Four-digit room codes.
//!
//! Codes are drawn uniformly from 0..=9999 and always rendered zero-padded,
//! so `0042` and `42` never name different rooms.

use std::{fmt, str::FromStr};

use crate::{env::Environment, error::CoreError};

/// Number of distinct room codes.
const CODE_SPACE: u16 = 10_000;

/// A room code such as `0042`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(u16);

impl RoomCode {
    /// Draw a fresh code from the environment's RNG.
    pub fn generate(env: &impl Environment) -> Self {
        Self(env.random_below(usize::from(CODE_SPACE)) as u16)
    }

    /// Build a code from its numeric value.
    pub fn new(value: u16) -> Result<Self, CoreError> {
        if value < CODE_SPACE {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidRoomCode(value.to_string()))
        }
    }

    /// Numeric value of the code.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for RoomCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidRoomCode(s.to_string()));
        }
        s.parse::<u16>().map(Self).map_err(|_| CoreError::InvalidRoomCode(s.to_string()))
    }
}
