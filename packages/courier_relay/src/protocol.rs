//! Wire frames exchanged with clients.
//!
//! Everything except the subscribe control frame is JSON tagged by `type`.
//! Unrecognised tags deserialize into an `Unsupported` variant so the relay
//! can ignore them without treating the frame as malformed.

use serde::{Deserialize, Serialize};

use crate::message::{MediaInput, Message, TextInput};

/// Prefix of the plain-text control frame that binds a nickname.
pub const SUBSCRIBE_PREFIX: &str = "subscribe:";

/// Frames sent by clients after subscribing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Ping,
    Message { message: InboundMessage },
    #[serde(other)]
    Unsupported,
}

/// The nested `message` object of a data frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Text(TextInput),
    Image(MediaInput),
    Video(MediaInput),
    #[serde(other)]
    Unsupported,
}

/// Frames sent by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Pong,
    Message { message: Message },
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Returns the nickname carried by a subscribe control frame, verbatim.
pub fn parse_subscribe(text: &str) -> Option<&str> {
    text.strip_prefix(SUBSCRIBE_PREFIX)
}
