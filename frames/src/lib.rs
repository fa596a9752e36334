//! Shared frame model and JSON codec for the terminal multiplexing wire.
//!
//! This crate owns the wire representation exchanged between the browser
//! client and the session server. Every message is one JSON object with a
//! `type` tag and a handful of optional string fields.
//!
//! NORMALIZATION
//! =============
//! Servers in the wild emit identifier fields in either camelCase
//! (`terminalId`, `frontendId`) or snake_case (`terminal_id`, `frontend_id`).
//! [`normalize_frame`] is the single place that knows about both spellings;
//! everything downstream only ever sees the canonical [`Frame`]. Encoding
//! always emits the canonical camelCase shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys accepted for the authoritative terminal identifier.
pub const TERMINAL_ID_KEYS: &[&str] = &["terminalId", "terminal_id"];

/// Keys accepted for the client-issued provisional identifier.
pub const FRONTEND_ID_KEYS: &[&str] = &["frontendId", "frontend_id"];

/// Keys accepted for a failure message, in preference order.
pub const ERROR_KEYS: &[&str] = &["error", "message"];

/// Error returned by [`decode_frame`] and friends.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is not valid JSON (or could not be serialized).
    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),
    /// Binary payloads must carry UTF-8 JSON text.
    #[error("frame payload is not valid utf-8")]
    InvalidUtf8,
    /// The JSON value is not an object.
    #[error("frame is not a json object")]
    NotAnObject,
    /// The object has no string `type` field.
    #[error("frame has no type")]
    MissingType,
    /// The `type` field names a frame kind this client does not understand.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
    /// A field required by this frame kind is absent.
    #[error("{kind} frame is missing `{field}`")]
    MissingField { kind: &'static str, field: &'static str },
}

/// Logical kind of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Client asks the server to spawn a PTY for a provisional terminal.
    CreateTerminal,
    /// Server confirms a terminal and assigns its authoritative id.
    TerminalCreated,
    /// Server rejects a creation request.
    TerminalError,
    /// Keystrokes travelling towards a PTY.
    PtyInput,
    /// Output produced by a PTY.
    PtyOutput,
}

impl FrameType {
    /// Wire spelling of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTerminal => "create_terminal",
            Self::TerminalCreated => "terminal_created",
            Self::TerminalError => "terminal_error",
            Self::PtyInput => "pty_input",
            Self::PtyOutput => "pty_output",
        }
    }

    /// Parse the wire spelling of a kind.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "create_terminal" => Some(Self::CreateTerminal),
            "terminal_created" => Some(Self::TerminalCreated),
            "terminal_error" => Some(Self::TerminalError),
            "pty_input" => Some(Self::PtyInput),
            "pty_output" => Some(Self::PtyOutput),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message on the realtime wire, in canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Frame kind. Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: FrameType,
    /// Text payload (keystrokes or PTY output).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Client that produced the frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Authoritative (server-assigned) terminal id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    /// Provisional (client-issued) terminal id, echoed back for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_id: Option<String>,
    /// Failure text on `terminal_error` frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Frame {
    /// Create an empty frame of the given kind.
    #[must_use]
    pub fn new(kind: FrameType) -> Self {
        Self { kind, content: None, sender: None, terminal_id: None, frontend_id: None, error: None }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    #[must_use]
    pub fn with_terminal_id(mut self, terminal_id: impl Into<String>) -> Self {
        self.terminal_id = Some(terminal_id.into());
        self
    }

    #[must_use]
    pub fn with_frontend_id(mut self, frontend_id: impl Into<String>) -> Self {
        self.frontend_id = Some(frontend_id.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Encode a frame into its canonical JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_frame(frame: &Frame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode JSON text into a canonical frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for unparseable text and the other variants
/// when the value does not describe a complete frame.
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    let value = serde_json::from_str::<Value>(text)?;
    normalize_frame(&value)
}

/// Decode a binary message carrying UTF-8 JSON text.
///
/// # Errors
///
/// Returns [`CodecError::InvalidUtf8`] for non UTF-8 payloads, otherwise the
/// same errors as [`decode_frame`].
pub fn decode_frame_bytes(bytes: &[u8]) -> Result<Frame, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    decode_frame(text)
}

/// Map a parsed JSON value onto the canonical frame shape.
///
/// Pure function: accepts either identifier spelling and rejects frames that
/// lack the fields their kind needs.
///
/// # Errors
///
/// See [`CodecError`].
pub fn normalize_frame(value: &Value) -> Result<Frame, CodecError> {
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }
    let raw_kind = pick_str(value, &["type"]).ok_or(CodecError::MissingType)?;
    let kind = FrameType::parse(raw_kind).ok_or_else(|| CodecError::UnknownType(raw_kind.to_owned()))?;

    let mut frame = Frame {
        kind,
        content: pick_str(value, &["content"]).map(str::to_owned),
        sender: pick_str(value, &["sender"]).map(str::to_owned),
        terminal_id: pick_str(value, TERMINAL_ID_KEYS).map(str::to_owned),
        frontend_id: pick_str(value, FRONTEND_ID_KEYS).map(str::to_owned),
        error: pick_str(value, ERROR_KEYS).map(str::to_owned),
    };
    if kind == FrameType::TerminalError && frame.error.is_none() {
        frame.error.clone_from(&frame.content);
    }
    check_complete(&frame)?;
    Ok(frame)
}

/// First string value found under any of `keys`, in order.
#[must_use]
pub fn pick_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_str))
}

fn check_complete(frame: &Frame) -> Result<(), CodecError> {
    let kind = frame.kind;
    let missing = |field: &'static str| CodecError::MissingField { kind: kind.as_str(), field };
    match kind {
        FrameType::CreateTerminal => {
            frame.frontend_id.as_ref().ok_or_else(|| missing("frontendId"))?;
        }
        FrameType::TerminalCreated => {
            frame.terminal_id.as_ref().ok_or_else(|| missing("terminalId"))?;
            frame.frontend_id.as_ref().ok_or_else(|| missing("frontendId"))?;
        }
        FrameType::TerminalError => {
            frame.frontend_id.as_ref().ok_or_else(|| missing("frontendId"))?;
        }
        FrameType::PtyInput => {
            frame.content.as_ref().ok_or_else(|| missing("content"))?;
        }
        FrameType::PtyOutput => {
            frame.terminal_id.as_ref().ok_or_else(|| missing("terminalId"))?;
            frame.content.as_ref().ok_or_else(|| missing("content"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
