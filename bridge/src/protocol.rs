//! Wire Protocol
//!
//! JSON text frames exchanged with the backend. Every frame is an object
//! tagged by its `type` field.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::preview;

/// Messages pushed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Replace the visible text of an element
    UpdateText {
        #[serde(deserialize_with = "scalar_string")]
        id: String,
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
    /// Replace the inner HTML of an element
    Replace {
        #[serde(deserialize_with = "scalar_string")]
        id: String,
        #[serde(deserialize_with = "scalar_string")]
        html: String,
    },
    /// Switch the document theme and remember it
    SetTheme {
        #[serde(deserialize_with = "scalar_string")]
        theme: String,
    },
    /// Overwrite the value of an editable element
    UpdateInput {
        #[serde(deserialize_with = "scalar_string")]
        id: String,
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
    /// Dev server asks clients to reload after a source change
    HotReload {
        #[serde(default, deserialize_with = "scalar_string")]
        message: String,
    },
    /// Dev server failed to compile the app
    HmrError {
        #[serde(default, deserialize_with = "scalar_string")]
        message: String,
    },
}

impl InboundMessage {
    /// Parse a text frame. Malformed JSON and unknown tags yield `None`.
    pub fn decode(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(message) => Some(message),
            Err(e) => {
                log::debug!(
                    "Ignoring inbound frame ({}): {}",
                    e,
                    preview(text)
                );
                None
            }
        }
    }

    /// The element this message targets, if any.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            InboundMessage::UpdateText { id, .. }
            | InboundMessage::Replace { id, .. }
            | InboundMessage::UpdateInput { id, .. } => Some(id),
            InboundMessage::SetTheme { .. }
            | InboundMessage::HotReload { .. }
            | InboundMessage::HmrError { .. } => None,
        }
    }

    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::UpdateText { .. } => "update_text",
            InboundMessage::Replace { .. } => "replace",
            InboundMessage::SetTheme { .. } => "set_theme",
            InboundMessage::UpdateInput { .. } => "update_input",
            InboundMessage::HotReload { .. } => "hot_reload",
            InboundMessage::HmrError { .. } => "hmr_error",
        }
    }
}

/// Messages sent to the backend in response to user interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Click { id: String },
    Input { id: String, value: String },
}

impl OutboundMessage {
    pub fn click(id: impl Into<String>) -> Self {
        OutboundMessage::Click { id: id.into() }
    }

    pub fn input(id: impl Into<String>, value: impl Into<String>) -> Self {
        OutboundMessage::Input {
            id: id.into(),
            value: value.into(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// The backend stringifies most values, but numbers and booleans still show
// up. They render the same way a browser would coerce them (JSON numbers are
// doubles there, so `2.0` reads as `2`); null is empty.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(match n.as_f64() {
            Some(f) => ryu_js::Buffer::new().format(f).to_string(),
            None => n.to_string(),
        }),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {}",
            other
        ))),
    }
}
