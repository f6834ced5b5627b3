//! Control messages exchanged between host and players.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Elapsed time in whole milliseconds, measured from the local arm instant.
pub type Millis = u64;

/// A single control message.
///
/// | type         | payload   | direction     |
/// |--------------|-----------|---------------|
/// | `initButton` | -         | any to all    |
/// | `pushButton` | `time`    | player to host|
/// | `maxTime`    | `time`    | host to all   |
/// | `winner`     | `player`  | host to all   |
/// | `players`    | `players` | host to all   |
/// | `startGame`  | -         | host to all   |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// The round has been armed; the target is now pressable.
    InitButton,

    /// A player's press report.
    PushButton {
        /// Elapsed milliseconds from the player's arm instant to its press.
        time: Millis,
    },

    /// The host tightened the reaction deadline.
    MaxTime {
        /// New deadline in milliseconds.
        time: Millis,
    },

    /// The round was resolved.
    Winner {
        /// Identity of the winning participant.
        player: String,
    },

    /// Ordered roster snapshot, host first.
    Players {
        /// Participant identities in canonical order.
        players: Vec<String>,
    },

    /// The lobby is closed and the game begins.
    StartGame,

    /// Any `type` tag outside this vocabulary. Never encoded.
    #[serde(other)]
    #[doc(hidden)]
    Unknown,
}

impl Message {
    /// Short name of the message type, as it appears in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitButton => "initButton",
            Self::PushButton { .. } => "pushButton",
            Self::MaxTime { .. } => "maxTime",
            Self::Winner { .. } => "winner",
            Self::Players { .. } => "players",
            Self::StartGame => "startGame",
            Self::Unknown => "unknown",
        }
    }

    /// Encode as JSON text for a text channel.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode JSON text received from a channel.
    ///
    /// Returns `Ok(None)` when the `type` tag is not recognized, and an error
    /// when the text is not a well-formed message at all.
    pub fn decode(text: &str) -> Result<Option<Self>> {
        let message: Self = serde_json::from_str(text)?;
        Ok(message.known())
    }

    fn known(self) -> Option<Self> {
        match self {
            Self::Unknown => None,
            other => Some(other),
        }
    }
}
