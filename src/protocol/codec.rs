//! `TYPE|PAYLOAD` line framing.
//!
//! One message per line. Only the first `|` separates the type from the
//! payload; anything after it, including further `|`, `,`, `;` or `:`,
//! belongs to the payload and is left to the typed parsers in
//! [`crate::protocol`]. There is no escaping, so payloads must never contain
//! a line terminator.

use alloc::string::String;

/// Separator between the message type and its payload.
pub const SEPARATOR: char = '|';

/// Errors raised while turning a line into a typed message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line has no separator or an empty type.
    #[error("malformed message: {0:?}")]
    MalformedMessage(String),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("invalid {kind} payload {payload:?}: {reason}")]
    InvalidPayload {
        kind: &'static str,
        payload: String,
        reason: &'static str,
    },
}

/// A decoded but not yet interpreted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub kind: &'a str,
    pub payload: &'a str,
}

/// Build the wire form of a message, without the line terminator.
pub fn encode(kind: &str, payload: &str) -> String {
    let mut line = String::with_capacity(kind.len() + payload.len() + 1);
    line.push_str(kind);
    line.push(SEPARATOR);
    line.push_str(payload);
    line
}

/// Split one line into its type and payload.
pub fn decode(line: &str) -> Result<Frame<'_>, ProtocolError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    match line.split_once(SEPARATOR) {
        Some((kind, payload)) if !kind.is_empty() => Ok(Frame { kind, payload }),
        _ => Err(ProtocolError::MalformedMessage(line.into())),
    }
}

impl<'a> Frame<'a> {
    /// Build an [`ProtocolError::InvalidPayload`] for this frame.
    pub(crate) fn invalid(&self, kind: &'static str, reason: &'static str) -> ProtocolError {
        ProtocolError::InvalidPayload {
            kind,
            payload: self.payload.into(),
            reason,
        }
    }
}
